// ============================================================================
// spark-observable - Reconciler
// Render templates into a host container and keep them up to date
// ============================================================================
//
// Every container gets its own shadow tree. A slot renders once at the
// insertion point it inherits from its parent; afterwards, when its watcher
// fires, it looks up the host node that follows it in the shadow tree and
// renders its new content in front of that node.
//
// Re-rendering keeps host nodes that the new content places again in the
// same relative order. Those nodes stay where they are and the cursor uses
// them as insertion references, so new nodes land between them without the
// kept ones ever leaving the host tree.
// ============================================================================

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::{Rc, Weak};

use tracing::debug;

use crate::core::types::{json_text, Json};
use crate::reactivity::batching::untrack;
use crate::reactivity::watcher::{watch, ReadingValue, Watcher};
use crate::store::Node;

use super::element::render_element;
use super::host::HostTree;
use super::shadow::Shadow;
use super::template::{DynamicSlot, Template};

// =============================================================================
// SCOPE
// =============================================================================

type SharedShadow<N> = Rc<RefCell<Shadow<N>>>;

/// Which shadow tree holds each placed host node. Shared by every scope of
/// one render, so a node moved into another container leaves its old slot.
struct Placements<N> {
    owners: RefCell<Vec<(N, Weak<RefCell<Shadow<N>>>)>>,
}

impl<N: Clone + PartialEq> Placements<N> {
    fn new() -> Rc<Self> {
        Rc::new(Self {
            owners: RefCell::new(Vec::new()),
        })
    }

    /// Record `tree` as the holder of `node`, emptying its slot in the tree
    /// that held it before.
    fn claim(&self, node: &N, tree: &SharedShadow<N>) {
        let previous = {
            let mut owners = self.owners.borrow_mut();
            owners.retain(|(_, owner)| owner.strong_count() > 0);
            let owner = Rc::downgrade(tree);
            match owners.iter().position(|(placed, _)| placed == node) {
                Some(index) => Some(std::mem::replace(&mut owners[index].1, owner)),
                None => {
                    owners.push((node.clone(), owner));
                    None
                }
            }
        };
        if let Some(previous) = previous.and_then(|owner| owner.upgrade()) {
            if !Rc::ptr_eq(&previous, tree) {
                previous.borrow_mut().detach(node);
            }
        }
    }

    /// Forget `node` if `tree` is still its holder.
    fn release(&self, node: &N, tree: &SharedShadow<N>) {
        self.owners
            .borrow_mut()
            .retain(|(placed, owner)| placed != node || !std::ptr::eq(owner.as_ptr(), Rc::as_ptr(tree)));
    }
}

/// A host container and the shadow tree of what was placed into it.
pub(crate) struct Scope<H: HostTree> {
    pub(crate) host: Rc<H>,
    pub(crate) container: H::Node,
    shadow: SharedShadow<H::Node>,
    placements: Rc<Placements<H::Node>>,
}

impl<H: HostTree> Clone for Scope<H> {
    fn clone(&self) -> Self {
        Self {
            host: self.host.clone(),
            container: self.container.clone(),
            shadow: self.shadow.clone(),
            placements: self.placements.clone(),
        }
    }
}

impl<H: HostTree> Scope<H> {
    pub(crate) fn new(host: Rc<H>, container: H::Node) -> Self {
        Self {
            host,
            container,
            shadow: Rc::new(RefCell::new(Shadow::root())),
            placements: Placements::new(),
        }
    }

    /// Scope for a container rendered from inside this one (element
    /// children, nested scopes).
    pub(crate) fn nested(&self, container: H::Node) -> Self {
        Self {
            host: self.host.clone(),
            container,
            shadow: Rc::new(RefCell::new(Shadow::root())),
            placements: self.placements.clone(),
        }
    }

    /// Record `value` at `path`, removing whatever host nodes it replaces.
    fn set_slot(&self, path: &[usize], value: Shadow<H::Node>) {
        let old = self.shadow.borrow_mut().set(path, value);
        self.remove_all(&old);
    }

    fn remove_all(&self, old: &Shadow<H::Node>) {
        for node in old.nodes() {
            self.remove(&node);
        }
    }

    /// Take `node` out of the container. A node the host reports elsewhere
    /// has already been moved and is left alone.
    fn remove(&self, node: &H::Node) {
        self.placements.release(node, &self.shadow);
        if self.host.parent(node).as_ref() == Some(&self.container) {
            self.host.remove_child(&self.container, node);
        }
    }

    /// Put `node` into the slot at `path`, inserting it at the cursor unless
    /// it is the next retained node (already in place).
    pub(crate) fn place(&self, node: H::Node, path: &[usize], cursor: &SharedCursor<H::Node>) {
        let reference = {
            let mut cursor = cursor.borrow_mut();
            if cursor.stable.front() == Some(&node) {
                cursor.stable.pop_front();
                None
            } else {
                Some(cursor.reference())
            }
        };

        match reference {
            None => self.set_slot(path, Shadow::Leaf(node)),
            Some(reference) => {
                // a node placed twice moves, leaving its old slot empty
                self.placements.claim(&node, &self.shadow);
                self.shadow.borrow_mut().detach(&node);
                self.set_slot(path, Shadow::Leaf(node.clone()));
                self.host.insert_before(&self.container, &node, reference.as_ref());
            }
        }
    }

    fn leaf_at(&self, path: &[usize]) -> Option<H::Node> {
        match self.shadow.borrow().get(path) {
            Some(Shadow::Leaf(node)) => Some(node.clone()),
            _ => None,
        }
    }

    fn holds_leaf(&self, path: &[usize], leaf: &H::Node) -> bool {
        matches!(self.shadow.borrow().get(path), Some(Shadow::Leaf(node)) if node == leaf)
    }

    /// Host nodes currently rendered at the top level of this scope.
    fn nodes(&self) -> Vec<H::Node> {
        self.shadow.borrow().nodes()
    }
}

// =============================================================================
// CURSOR
// =============================================================================

/// Insertion state shared by everything rendered in one pass.
pub(crate) struct Cursor<N> {
    /// Retained nodes not yet reached, in host order.
    stable: VecDeque<N>,
    /// Node that follows the slot being rendered (`None`: append).
    end: Option<N>,
}

pub(crate) type SharedCursor<N> = Rc<RefCell<Cursor<N>>>;

impl<N: Clone> Cursor<N> {
    /// Cursor that appends to the container.
    pub(crate) fn append() -> SharedCursor<N> {
        Self::shared(Vec::new(), None)
    }

    fn shared(stable: Vec<N>, end: Option<N>) -> SharedCursor<N> {
        Rc::new(RefCell::new(Cursor {
            stable: stable.into(),
            end,
        }))
    }

    fn reference(&self) -> Option<N> {
        self.stable.front().or(self.end.as_ref()).cloned()
    }
}

// =============================================================================
// RENDER
// =============================================================================

/// Render `template` into the slot at `path` of `scope`.
pub(crate) fn render_at<H: HostTree>(
    scope: &Scope<H>,
    template: Template<H>,
    path: &[usize],
    cursor: &SharedCursor<H::Node>,
) {
    match template {
        Template::Empty => scope.set_slot(path, Shadow::Empty),
        Template::Text(text) => {
            let leaf = scope.host.create_leaf(&text);
            scope.place(leaf, path, cursor);
        }
        Template::HostNode(node) => scope.place(node, path, cursor),
        Template::Source(node) => render_source(scope, node, path, cursor),
        Template::Sequence(items) => {
            scope.set_slot(path, Shadow::Seq(Vec::with_capacity(items.len())));
            let mut child_path = path.to_vec();
            child_path.push(0);
            for (index, item) in items.into_iter().enumerate() {
                if let Some(last) = child_path.last_mut() {
                    *last = index;
                }
                render_at(scope, item, &child_path, cursor);
            }
        }
        Template::Dynamic(slot) => render_dynamic(scope, slot, path, cursor),
        Template::Element(element) => render_element(scope, *element, path, cursor),
    }
}

/// Replace the content of an already rendered slot.
fn rerender<H: HostTree>(scope: &Scope<H>, template: Template<H>, path: &[usize]) {
    let end = scope.shadow.borrow().find_next_node(path);
    let old = scope.shadow.borrow_mut().set(path, Shadow::Empty);
    let old_nodes = old.nodes();
    let retained = retained_nodes(&old_nodes, &template);

    let mut removed = 0usize;
    for node in &old_nodes {
        if !retained.contains(node) {
            scope.remove(node);
            removed += 1;
        }
    }
    debug!(path = ?path, removed, retained = retained.len(), "re-render slot");

    let cursor = Cursor::shared(retained, end);
    render_at(scope, template, path, &cursor);
}

/// Old host nodes that the new template places again, kept in old order.
///
/// Greedy: walk the template's host nodes in render order and keep each one
/// that appears in `old` after the previously kept one.
fn retained_nodes<H: HostTree>(old: &[H::Node], template: &Template<H>) -> Vec<H::Node> {
    let mut wanted = Vec::new();
    collect_host_nodes(template, &mut wanted);

    let mut retained = Vec::new();
    let mut last: Option<usize> = None;
    for node in wanted {
        let Some(position) = old.iter().position(|candidate| candidate == node) else {
            continue;
        };
        if last.is_none_or(|last| position > last) {
            retained.push(node.clone());
            last = Some(position);
        }
    }
    retained
}

fn collect_host_nodes<'a, H: HostTree>(template: &'a Template<H>, out: &mut Vec<&'a H::Node>) {
    match template {
        Template::HostNode(node) => out.push(node),
        Template::Sequence(items) => items.iter().for_each(|item| collect_host_nodes(item, out)),
        _ => {}
    }
}

fn render_dynamic<H: HostTree>(
    scope: &Scope<H>,
    slot: DynamicSlot<H>,
    path: &[usize],
    cursor: &SharedCursor<H::Node>,
) {
    let scope = scope.clone();
    let path = path.to_vec();
    let mut initial = Some(cursor.clone());
    slot.bind(Box::new(move |template, _run_count| match initial.take() {
        Some(cursor) => render_at(&scope, template, &path, &cursor),
        None => rerender(&scope, template, &path),
    }));
}

fn is_text_value(value: &Json) -> bool {
    matches!(value, Json::String(_) | Json::Number(_))
}

/// Text binding: primitives update their leaf in place, anything else
/// re-renders the slot.
fn render_source<H: HostTree>(
    scope: &Scope<H>,
    node: Node,
    path: &[usize],
    cursor: &SharedCursor<H::Node>,
) {
    let scope = scope.clone();
    let path = path.to_vec();
    let mut initial = Some(cursor.clone());
    let mut leaf: Option<H::Node> = None;

    watch(ReadingValue::node(&node), move |value, _run_count| {
        if let Some(current) = &leaf {
            if is_text_value(&value) && scope.holds_leaf(&path, current) {
                scope.host.set_leaf_text(current, &json_text(&value));
                return;
            }
        }

        let text = is_text_value(&value);
        let template = match Template::try_from_json(value) {
            Ok(template) => template,
            Err(err) => panic!("{err}"),
        };
        match initial.take() {
            Some(cursor) => render_at(&scope, template, &path, &cursor),
            None => rerender(&scope, template, &path),
        }
        leaf = if text { scope.leaf_at(&path) } else { None };
    });
}

// =============================================================================
// MOUNT
// =============================================================================

/// A rendered template.
///
/// Every watcher created while rendering is a descendant of the mount's own
/// watcher, so [`Mount::unmount`] stops all of them at once.
pub struct Mount<H: HostTree> {
    watcher: Watcher,
    scope: Scope<H>,
}

impl<H: HostTree> Mount<H> {
    /// The container rendered into.
    pub fn container(&self) -> &H::Node {
        &self.scope.container
    }

    /// Host nodes currently placed directly into the container.
    pub fn nodes(&self) -> Vec<H::Node> {
        self.scope.nodes()
    }

    /// Stop every watcher of this render and remove its host nodes.
    pub fn unmount(self) {
        self.watcher.clear();
        let old = self.scope.shadow.borrow_mut().set(&[0], Shadow::Empty);
        self.scope.remove_all(&old);
        debug!("unmount");
    }
}

/// Render `template` into `container`, appending after existing content.
///
/// # Example
///
/// ```
/// use spark_observable::render::{render, MemoryHost, Template};
/// use spark_observable::{flush_now, write, Node};
/// use serde_json::json;
/// use std::rc::Rc;
///
/// let host = Rc::new(MemoryHost::new());
/// let body = host.container("body");
/// let state = Node::root(json!({ "name": "Ada" }));
///
/// let mount = render(&host, &body, vec![
///     Template::text("Hello, "),
///     Template::Source(state.child("name")),
/// ]);
/// assert_eq!(body.text_content(), "Hello, Ada");
///
/// write(&state.child("name"), "Grace");
/// flush_now();
/// assert_eq!(body.text_content(), "Hello, Grace");
///
/// mount.unmount();
/// assert_eq!(body.text_content(), "");
/// ```
pub fn render<H: HostTree>(host: &Rc<H>, container: &H::Node, template: impl Into<Template<H>>) -> Mount<H> {
    let scope = Scope::new(host.clone(), container.clone());
    let root_scope = scope.clone();
    let mut pending = Some(template.into());
    debug!(container = ?container, "render");

    let watcher = watch(ReadingValue::getter(|| ()), move |(), _run_count| {
        if let Some(template) = pending.take() {
            untrack(|| render_at(&root_scope, template, &[0], &Cursor::append()));
        }
    });

    Mount { watcher, scope }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactivity::scheduling::flush_now;
    use crate::render::memory::{HostOp, MemoryHost};
    use crate::store::{mutate, write};
    use serde_json::json;

    fn host() -> (Rc<MemoryHost>, <MemoryHost as HostTree>::Node) {
        let host = Rc::new(MemoryHost::new());
        let body = host.container("body");
        (host, body)
    }

    #[test]
    fn static_templates_render_in_order() {
        let (host, body) = host();
        let _mount = render(
            &host,
            &body,
            vec![Template::text("a"), Template::Empty, vec![Template::text("b"), Template::text("c")].into()],
        );
        assert_eq!(body.text_content(), "abc");
    }

    #[test]
    fn source_updates_text_in_place() {
        let (host, body) = host();
        let state = Node::root(json!({ "n": 1 }));
        let _mount = render(&host, &body, Template::Source(state.child("n")));
        let leaf = body.children()[0].clone();
        host.take_log();

        write(&state.child("n"), 2);
        flush_now();
        assert_eq!(body.text_content(), "2");
        assert_eq!(body.children()[0], leaf);
        assert_eq!(host.take_log(), vec![HostOp::SetText { node: leaf.id(), text: "2".into() }]);
    }

    #[test]
    fn source_switches_between_shapes() {
        let (host, body) = host();
        let state = Node::root(json!({ "v": "x" }));
        let v = state.child("v");
        let _mount = render(&host, &body, vec![Template::Source(v.clone()), Template::text("|")]);

        write(&v, json!(["a", "b"]));
        flush_now();
        assert_eq!(body.text_content(), "ab|");

        write(&v, Json::Null);
        flush_now();
        assert_eq!(body.text_content(), "|");

        write(&v, 7);
        flush_now();
        assert_eq!(body.text_content(), "7|");
    }

    #[test]
    fn dynamic_slot_reinserts_before_next_sibling() {
        let (host, body) = host();
        let state = Node::root(json!({ "word": "one" }));
        let _mount = render(
            &host,
            &body,
            vec![
                Template::text("["),
                Template::dynamic(&state.child("word"), |v: Json| {
                    Template::text(format!("<{}>", json_text(&v)))
                }),
                Template::text("]"),
            ],
        );
        assert_eq!(body.text_content(), "[<one>]");

        write(&state.child("word"), "two");
        flush_now();
        assert_eq!(body.text_content(), "[<two>]");
    }

    #[test]
    fn retained_host_nodes_are_not_touched() {
        let (host, body) = host();
        let [a, b, c, d] = ["a", "b", "c", "d"].map(|t| host.create_leaf(t));
        let nodes = vec![a.clone(), b.clone(), c.clone(), d.clone()];
        let state = Node::root(json!([0, 1, 2]));

        let pool = nodes.clone();
        let _mount = render(
            &host,
            &body,
            Template::dynamic(&state, move |value: Json| {
                let picks: Vec<usize> = value
                    .as_array()
                    .map(|items| items.iter().filter_map(|i| i.as_u64()).map(|i| i as usize).collect())
                    .unwrap_or_default();
                Template::sequence(picks.into_iter().map(|i| Template::HostNode(pool[i].clone())))
            }),
        );
        assert_eq!(body.text_content(), "abc");
        host.take_log();

        write(&state, json!([0, 1, 3, 2]));
        flush_now();
        assert_eq!(body.text_content(), "abdc");
        assert_eq!(
            host.take_log(),
            vec![HostOp::Insert {
                container: body.id(),
                node: d.id(),
                before: Some(c.id()),
            }]
        );
    }

    #[test]
    fn moved_host_node_leaves_old_slot_empty() {
        let (host, body) = host();
        let shared = host.create_leaf("x");
        let _mount = render(
            &host,
            &body,
            vec![Template::HostNode(shared.clone()), Template::text("-"), Template::HostNode(shared.clone())],
        );
        assert_eq!(body.text_content(), "-x");
    }

    #[test]
    fn unmount_removes_everything_and_stops_watchers() {
        let (host, body) = host();
        let state = Node::root(json!({ "n": 1 }));
        let mount = render(&host, &body, vec![Template::text("n="), Template::Source(state.child("n"))]);
        assert_eq!(state.child("n").watcher_count(), 1);

        mount.unmount();
        assert_eq!(body.text_content(), "");
        assert_eq!(state.child("n").watcher_count(), 0);

        write(&state.child("n"), 2);
        assert!(!flush_now());
    }

    #[test]
    fn mutate_rerenders_array_source() {
        let (host, body) = host();
        let state = Node::root(json!({ "items": ["a"] }));
        let items = state.child("items");
        let _mount = render(&host, &body, Template::Source(items.clone()));
        mutate(&items, |value| {
            if let Some(list) = value.as_array_mut() {
                list.push(json!("b"));
            }
        });
        flush_now();
        assert_eq!(body.text_content(), "ab");
    }

    #[test]
    #[should_panic(expected = "cannot be rendered")]
    fn boolean_source_is_rejected() {
        let (host, body) = host();
        let state = Node::root(json!({ "flag": true }));
        let _mount = render(&host, &body, Template::Source(state.child("flag")));
    }
}
