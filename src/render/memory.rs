// ============================================================================
// spark-observable - Memory Host
// An in-memory host tree that records every operation
// ============================================================================
//
// Behaves like a small DOM: inserting a node that already has a parent moves
// it, inserting before a node that is not a child of the container panics,
// and removing a non-child panics. Events are plain JSON values.
// ============================================================================

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::trace;

use crate::core::types::Json;

use super::host::{EventHandler, HostTree};

// =============================================================================
// OPERATION LOG
// =============================================================================

/// One recorded host operation. Nodes are identified by [`MemoryNode::id`].
#[derive(Clone, Debug, PartialEq)]
pub enum HostOp {
    CreateLeaf { node: u64, text: String },
    SetText { node: u64, text: String },
    CreateElement { node: u64, tag: String },
    Insert { container: u64, node: u64, before: Option<u64> },
    Remove { container: u64, node: u64 },
    BindAttribute { node: u64, name: String, value: String },
    BindProperty { node: u64, name: String, value: Json },
    BindStyle { node: u64, property: String, value: String },
    ClearStyle { node: u64 },
    AddListener { node: u64, event: String },
    AttachScope { node: u64, scope: u64 },
}

impl HostOp {
    /// Whether the operation changed the tree structure.
    pub fn is_structural(&self) -> bool {
        matches!(self, HostOp::Insert { .. } | HostOp::Remove { .. })
    }
}

// =============================================================================
// NODES
// =============================================================================

enum Kind {
    Leaf,
    Element { tag: String, namespace: Option<String> },
    Scope,
}

struct MemoryNodeInner {
    id: u64,
    kind: Kind,
    text: RefCell<String>,
    attributes: RefCell<BTreeMap<String, String>>,
    properties: RefCell<BTreeMap<String, Json>>,
    style: RefCell<Vec<(String, String)>>,
    children: RefCell<Vec<MemoryNode>>,
    parent: RefCell<Weak<MemoryNodeInner>>,
    listeners: RefCell<Vec<(String, EventHandler<Json>)>>,
    nested: RefCell<Option<MemoryNode>>,
}

/// Handle to a node of a [`MemoryHost`]. Equality is identity.
#[derive(Clone)]
pub struct MemoryNode(Rc<MemoryNodeInner>);

impl MemoryNode {
    fn new(id: u64, kind: Kind, text: &str) -> Self {
        Self(Rc::new(MemoryNodeInner {
            id,
            kind,
            text: RefCell::new(text.to_string()),
            attributes: RefCell::new(BTreeMap::new()),
            properties: RefCell::new(BTreeMap::new()),
            style: RefCell::new(Vec::new()),
            children: RefCell::new(Vec::new()),
            parent: RefCell::new(Weak::new()),
            listeners: RefCell::new(Vec::new()),
            nested: RefCell::new(None),
        }))
    }

    pub fn id(&self) -> u64 {
        self.0.id
    }

    /// Element tag, `None` for leaves and scopes.
    pub fn tag(&self) -> Option<String> {
        match &self.0.kind {
            Kind::Element { tag, .. } => Some(tag.clone()),
            _ => None,
        }
    }

    pub fn namespace(&self) -> Option<String> {
        match &self.0.kind {
            Kind::Element { namespace, .. } => namespace.clone(),
            _ => None,
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self.0.kind, Kind::Leaf)
    }

    pub fn parent(&self) -> Option<MemoryNode> {
        self.0.parent.borrow().upgrade().map(MemoryNode)
    }

    pub fn children(&self) -> Vec<MemoryNode> {
        self.0.children.borrow().clone()
    }

    /// The nested scope created by `attach_nested_scope`, if any.
    pub fn nested_scope(&self) -> Option<MemoryNode> {
        self.0.nested.borrow().clone()
    }

    /// Concatenated text of this node and its children (nested scopes
    /// excluded).
    pub fn text_content(&self) -> String {
        if self.is_leaf() {
            return self.0.text.borrow().clone();
        }
        self.0
            .children
            .borrow()
            .iter()
            .map(MemoryNode::text_content)
            .collect()
    }

    pub fn attribute(&self, name: &str) -> Option<String> {
        self.0.attributes.borrow().get(name).cloned()
    }

    pub fn property(&self, name: &str) -> Option<Json> {
        self.0.properties.borrow().get(name).cloned()
    }

    pub fn style_value(&self, property: &str) -> Option<String> {
        self.0
            .style
            .borrow()
            .iter()
            .find(|(name, _)| name == property)
            .map(|(_, value)| value.clone())
    }

    /// Call every listener registered for `event`. Returns how many ran.
    pub fn dispatch(&self, event: &str, payload: &Json) -> usize {
        let handlers: Vec<EventHandler<Json>> = self
            .0
            .listeners
            .borrow()
            .iter()
            .filter(|(name, _)| name == event)
            .map(|(_, handler)| handler.clone())
            .collect();
        for handler in &handlers {
            handler(payload);
        }
        handlers.len()
    }

    /// HTML-like serialization of the subtree.
    pub fn markup(&self) -> String {
        let mut out = String::new();
        self.write_markup(&mut out);
        out
    }

    fn write_markup(&self, out: &mut String) {
        match &self.0.kind {
            Kind::Leaf => out.push_str(&self.0.text.borrow()),
            Kind::Scope => {
                out.push_str("<#shadow>");
                self.write_children(out);
                out.push_str("</#shadow>");
            }
            Kind::Element { tag, .. } => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in self.0.attributes.borrow().iter() {
                    out.push_str(&format!(" {name}=\"{value}\""));
                }
                let style = self.0.style.borrow();
                if !style.is_empty() {
                    let declarations: Vec<String> =
                        style.iter().map(|(name, value)| format!("{name}: {value}")).collect();
                    out.push_str(&format!(" style=\"{}\"", declarations.join("; ")));
                }
                out.push('>');
                if let Some(nested) = self.nested_scope() {
                    nested.write_markup(out);
                }
                self.write_children(out);
                out.push_str(&format!("</{tag}>"));
            }
        }
    }

    fn write_children(&self, out: &mut String) {
        for child in self.0.children.borrow().iter() {
            child.write_markup(out);
        }
    }

    fn next_sibling(&self) -> Option<MemoryNode> {
        let parent = self.parent()?;
        let siblings = parent.0.children.borrow();
        let index = siblings.iter().position(|s| s == self)?;
        siblings.get(index + 1).cloned()
    }

    fn detach_from_parent(&self) {
        if let Some(parent) = self.parent() {
            parent.0.children.borrow_mut().retain(|child| child != self);
        }
        *self.0.parent.borrow_mut() = Weak::new();
    }
}

impl PartialEq for MemoryNode {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for MemoryNode {}

impl fmt::Debug for MemoryNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0.kind {
            Kind::Leaf => write!(f, "#{} {:?}", self.0.id, self.0.text.borrow()),
            Kind::Element { tag, .. } => write!(f, "#{} <{tag}>", self.0.id),
            Kind::Scope => write!(f, "#{} <#shadow>", self.0.id),
        }
    }
}

// =============================================================================
// HOST
// =============================================================================

/// In-memory [`HostTree`] implementation.
#[derive(Default)]
pub struct MemoryHost {
    next_id: Cell<u64>,
    log: RefCell<Vec<HostOp>>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate(&self) -> u64 {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        id
    }

    fn record(&self, op: HostOp) {
        trace!(?op, "host op");
        self.log.borrow_mut().push(op);
    }

    /// A detached element to render into. Not recorded.
    pub fn container(&self, tag: &str) -> MemoryNode {
        MemoryNode::new(
            self.allocate(),
            Kind::Element {
                tag: tag.to_string(),
                namespace: None,
            },
            "",
        )
    }

    /// Every operation recorded so far.
    pub fn log(&self) -> Vec<HostOp> {
        self.log.borrow().clone()
    }

    /// Drain the operation log.
    pub fn take_log(&self) -> Vec<HostOp> {
        std::mem::take(&mut *self.log.borrow_mut())
    }
}

impl HostTree for MemoryHost {
    type Node = MemoryNode;
    type Event = Json;

    fn create_leaf(&self, text: &str) -> MemoryNode {
        let node = MemoryNode::new(self.allocate(), Kind::Leaf, text);
        self.record(HostOp::CreateLeaf {
            node: node.id(),
            text: text.to_string(),
        });
        node
    }

    fn set_leaf_text(&self, leaf: &MemoryNode, text: &str) {
        *leaf.0.text.borrow_mut() = text.to_string();
        self.record(HostOp::SetText {
            node: leaf.id(),
            text: text.to_string(),
        });
    }

    fn create_element(&self, tag: &str, namespace: Option<&str>) -> MemoryNode {
        let node = MemoryNode::new(
            self.allocate(),
            Kind::Element {
                tag: tag.to_string(),
                namespace: namespace.map(str::to_string),
            },
            "",
        );
        self.record(HostOp::CreateElement {
            node: node.id(),
            tag: tag.to_string(),
        });
        node
    }

    fn insert_before(&self, container: &MemoryNode, node: &MemoryNode, reference: Option<&MemoryNode>) {
        let reference = match reference {
            Some(reference) if reference == node => node.next_sibling(),
            other => other.cloned(),
        };
        node.detach_from_parent();

        let mut children = container.0.children.borrow_mut();
        let index = match &reference {
            None => children.len(),
            Some(reference) => match children.iter().position(|child| child == reference) {
                Some(index) => index,
                None => panic!("insert_before: {reference:?} is not a child of {container:?}"),
            },
        };
        children.insert(index, node.clone());
        drop(children);
        *node.0.parent.borrow_mut() = Rc::downgrade(&container.0);

        self.record(HostOp::Insert {
            container: container.id(),
            node: node.id(),
            before: reference.map(|r| r.id()),
        });
    }

    fn remove_child(&self, container: &MemoryNode, node: &MemoryNode) {
        let mut children = container.0.children.borrow_mut();
        let Some(index) = children.iter().position(|child| child == node) else {
            panic!("remove_child: {node:?} is not a child of {container:?}");
        };
        children.remove(index);
        drop(children);
        *node.0.parent.borrow_mut() = Weak::new();

        self.record(HostOp::Remove {
            container: container.id(),
            node: node.id(),
        });
    }

    fn parent(&self, node: &MemoryNode) -> Option<MemoryNode> {
        node.parent()
    }

    fn bind_attribute(&self, element: &MemoryNode, name: &str, value: &str) {
        element
            .0
            .attributes
            .borrow_mut()
            .insert(name.to_string(), value.to_string());
        self.record(HostOp::BindAttribute {
            node: element.id(),
            name: name.to_string(),
            value: value.to_string(),
        });
    }

    fn bind_property(&self, element: &MemoryNode, name: &str, value: &Json) {
        element
            .0
            .properties
            .borrow_mut()
            .insert(name.to_string(), value.clone());
        self.record(HostOp::BindProperty {
            node: element.id(),
            name: name.to_string(),
            value: value.clone(),
        });
    }

    fn bind_style(&self, element: &MemoryNode, property: &str, value: &str) {
        {
            let mut style = element.0.style.borrow_mut();
            match style.iter_mut().find(|(name, _)| name == property) {
                Some((_, existing)) => *existing = value.to_string(),
                None => style.push((property.to_string(), value.to_string())),
            }
        }
        self.record(HostOp::BindStyle {
            node: element.id(),
            property: property.to_string(),
            value: value.to_string(),
        });
    }

    fn clear_style(&self, element: &MemoryNode) {
        element.0.style.borrow_mut().clear();
        self.record(HostOp::ClearStyle { node: element.id() });
    }

    fn add_event_listener(&self, element: &MemoryNode, event: &str, handler: EventHandler<Json>) {
        element
            .0
            .listeners
            .borrow_mut()
            .push((event.to_string(), handler));
        self.record(HostOp::AddListener {
            node: element.id(),
            event: event.to_string(),
        });
    }

    fn attach_nested_scope(&self, element: &MemoryNode) -> MemoryNode {
        if let Some(existing) = element.nested_scope() {
            return existing;
        }
        let scope = MemoryNode::new(self.allocate(), Kind::Scope, "");
        *scope.0.parent.borrow_mut() = Rc::downgrade(&element.0);
        *element.0.nested.borrow_mut() = Some(scope.clone());
        self.record(HostOp::AttachScope {
            node: element.id(),
            scope: scope.id(),
        });
        scope
    }
}

// =============================================================================
// TESTS
// =============================================================================
