// ============================================================================
// spark-observable - Templates
// Declarative description of what to place into a host container
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::core::error::RenderError;
use crate::core::types::{json_kind, json_text, json_truthy, Json};
use crate::reactivity::watcher::{watch, ReadingValue, Watcher};
use crate::store::Node;

use super::element::ElementTemplate;
use super::host::HostTree;

// =============================================================================
// TEMPLATE
// =============================================================================

/// A renderable description.
///
/// Templates are consumed by rendering. Reactive parts (`Source`, `Dynamic`
/// and the bindings inside `Element`) keep watchers alive that re-render
/// their own slot when what they read changes.
pub enum Template<H: HostTree> {
    /// Renders nothing.
    Empty,
    /// A text leaf.
    Text(String),
    /// An existing host node, moved into place.
    HostNode(H::Node),
    /// A text binding to a node.
    Source(Node),
    /// Children rendered in order.
    Sequence(Vec<Template<H>>),
    /// A slot re-rendered whenever its source changes.
    Dynamic(DynamicSlot<H>),
    /// A host element.
    Element(Box<ElementTemplate<H>>),
}

impl<H: HostTree> Template<H> {
    /// Text leaf.
    pub fn text(text: impl Into<String>) -> Self {
        Template::Text(text.into())
    }

    /// Text leaf holding a number (or any JSON primitive).
    pub fn number(value: impl Into<Json>) -> Self {
        Template::Text(json_text(&value.into()))
    }

    /// Ordered children.
    pub fn sequence(items: impl IntoIterator<Item = Template<H>>) -> Self {
        Template::Sequence(items.into_iter().collect())
    }

    /// A slot that maps each value of `source` to a template.
    ///
    /// `to_template` runs inside the slot's watcher, so nodes it reads are
    /// dependencies of the slot too.
    pub fn dynamic<T: 'static>(
        source: impl Into<ReadingValue<T>>,
        to_template: impl FnMut(T) -> Template<H> + 'static,
    ) -> Self {
        Template::Dynamic(DynamicSlot::new(source, to_template))
    }

    /// A slot whose template is produced by a reader function.
    pub fn computed(reader: impl FnMut() -> Template<H> + 'static) -> Self {
        Template::dynamic(ReadingValue::getter(reader), |template| template)
    }

    /// Convert a plain value.
    ///
    /// `null` renders nothing, strings and numbers become text and arrays
    /// become sequences. Booleans and objects have no rendering.
    pub fn try_from_json(value: Json) -> Result<Self, RenderError> {
        match value {
            Json::Null => Ok(Template::Empty),
            Json::String(text) => Ok(Template::Text(text)),
            Json::Number(_) => Ok(Template::Text(json_text(&value))),
            Json::Array(items) => items
                .into_iter()
                .map(Template::try_from_json)
                .collect::<Result<Vec<_>, _>>()
                .map(Template::Sequence),
            other => Err(RenderError::Unrenderable {
                kind: json_kind(&other),
            }),
        }
    }
}

impl<H: HostTree> fmt::Debug for Template<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Template::Empty => f.write_str("Empty"),
            Template::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Template::HostNode(node) => f.debug_tuple("HostNode").field(node).finish(),
            Template::Source(node) => f.debug_tuple("Source").field(node).finish(),
            Template::Sequence(items) => f.debug_tuple("Sequence").field(items).finish(),
            Template::Dynamic(_) => f.write_str("Dynamic"),
            Template::Element(element) => f.debug_tuple("Element").field(&element.tag).finish(),
        }
    }
}

impl<H: HostTree> Default for Template<H> {
    fn default() -> Self {
        Template::Empty
    }
}

impl<H: HostTree> From<&str> for Template<H> {
    fn from(text: &str) -> Self {
        Template::Text(text.to_string())
    }
}

impl<H: HostTree> From<String> for Template<H> {
    fn from(text: String) -> Self {
        Template::Text(text)
    }
}

impl<H: HostTree> From<Node> for Template<H> {
    fn from(node: Node) -> Self {
        Template::Source(node)
    }
}

impl<H: HostTree> From<&Node> for Template<H> {
    fn from(node: &Node) -> Self {
        Template::Source(node.clone())
    }
}

impl<H: HostTree> From<Vec<Template<H>>> for Template<H> {
    fn from(items: Vec<Template<H>>) -> Self {
        Template::Sequence(items)
    }
}

impl<H: HostTree> From<ElementTemplate<H>> for Template<H> {
    fn from(element: ElementTemplate<H>) -> Self {
        Template::Element(Box::new(element))
    }
}

impl<H: HostTree> From<DynamicSlot<H>> for Template<H> {
    fn from(slot: DynamicSlot<H>) -> Self {
        Template::Dynamic(slot)
    }
}

// =============================================================================
// DYNAMIC SLOT
// =============================================================================

/// Receives each template a dynamic slot produces, with the run count.
pub(crate) type SlotRenderer<H> = Box<dyn FnMut(Template<H>, u32)>;

/// A source paired with a template mapping, bound to a renderer at render
/// time.
pub struct DynamicSlot<H: HostTree> {
    bind: Box<dyn FnOnce(SlotRenderer<H>) -> Watcher>,
}

impl<H: HostTree> DynamicSlot<H> {
    pub fn new<T: 'static>(
        source: impl Into<ReadingValue<T>>,
        mut to_template: impl FnMut(T) -> Template<H> + 'static,
    ) -> Self {
        let source = source.into();
        Self {
            bind: Box::new(move |mut render| {
                watch(source, move |value, run_count| {
                    let template = to_template(value);
                    render(template, run_count);
                })
            }),
        }
    }

    /// Start watching, handing every produced template to `render`.
    pub(crate) fn bind(self, render: SlotRenderer<H>) -> Watcher {
        (self.bind)(render)
    }
}

// =============================================================================
// CONTROL FLOW
// =============================================================================

/// Factory for a branch template. Branches are rebuilt every time they are
/// selected.
pub type TemplateFn<H> = Rc<dyn Fn() -> Template<H>>;

/// Render `then` while `source` is truthy, nothing otherwise.
///
/// # Example
///
/// ```
/// use spark_observable::render::{conditional, render, MemoryHost, Template};
/// use spark_observable::{flush_now, write, Node};
/// use serde_json::json;
/// use std::rc::Rc;
///
/// let host = Rc::new(MemoryHost::new());
/// let body = host.container("body");
/// let state = Node::root(json!({ "open": false }));
///
/// let _mount = render(&host, &body, conditional(&state.child("open"), || Template::text("menu")));
/// assert_eq!(body.text_content(), "");
///
/// write(&state.child("open"), true);
/// flush_now();
/// assert_eq!(body.text_content(), "menu");
/// ```
pub fn conditional<H: HostTree>(
    source: impl Into<ReadingValue<Json>>,
    then: impl Fn() -> Template<H> + 'static,
) -> Template<H> {
    let source: ReadingValue<Json> = source.into();
    Template::dynamic(source, move |value: Json| {
        if json_truthy(&value) { then() } else { Template::Empty }
    })
}

/// Render `then` while `source` is truthy, `otherwise` when it is not.
pub fn conditional_else<H: HostTree>(
    source: impl Into<ReadingValue<Json>>,
    then: impl Fn() -> Template<H> + 'static,
    otherwise: impl Fn() -> Template<H> + 'static,
) -> Template<H> {
    let source: ReadingValue<Json> = source.into();
    Template::dynamic(source, move |value: Json| {
        if json_truthy(&value) { then() } else { otherwise() }
    })
}

/// Named branches for [`switch`].
pub struct Branches<H: HostTree> {
    cases: BTreeMap<String, TemplateFn<H>>,
}

impl<H: HostTree> Branches<H> {
    pub fn new() -> Self {
        Self {
            cases: BTreeMap::new(),
        }
    }

    /// Add the branch selected when the source's text form equals `key`.
    pub fn case(mut self, key: impl Into<String>, template: impl Fn() -> Template<H> + 'static) -> Self {
        self.cases.insert(key.into(), Rc::new(template));
        self
    }

    fn select(&self, value: &Json) -> Template<H> {
        self.cases
            .get(&json_text(value))
            .map_or(Template::Empty, |branch| branch())
    }
}

impl<H: HostTree> Default for Branches<H> {
    fn default() -> Self {
        Self::new()
    }
}

/// Render the branch named by the current value of `source`, or nothing
/// when no branch matches.
pub fn switch<H: HostTree>(source: impl Into<ReadingValue<Json>>, branches: Branches<H>) -> Template<H> {
    let source: ReadingValue<Json> = source.into();
    Template::dynamic(source, move |value: Json| branches.select(&value))
}

// =============================================================================
// LISTS
// =============================================================================

fn array_len(value: &Json) -> usize {
    value.as_array().map_or(0, Vec::len)
}

/// One template per element of the array at `list`, rebuilt when the array
/// itself is written.
///
/// `item` receives the element's child node, so bindings inside the item
/// update on their own without rebuilding the list.
pub fn map_sequence<H: HostTree>(
    list: &Node,
    mut item: impl FnMut(Node, usize) -> Template<H> + 'static,
) -> Template<H> {
    let items = list.clone();
    Template::dynamic(ReadingValue::node(list), move |value| {
        Template::sequence((0..array_len(&value)).map(|index| item(items.child(index), index)))
    })
}

/// Like [`map_sequence`], but each item is itself a dynamic slot over the
/// element's value, so `item` sees values instead of nodes.
pub fn map_sequence_reactive<H: HostTree>(
    list: &Node,
    item: impl Fn(Json, usize) -> Template<H> + 'static,
) -> Template<H> {
    let items = list.clone();
    let item: Rc<dyn Fn(Json, usize) -> Template<H>> = Rc::new(item);
    Template::dynamic(ReadingValue::node(list), move |value| {
        Template::sequence((0..array_len(&value)).map(|index| {
            let item = item.clone();
            Template::dynamic(ReadingValue::node(&items.child(index)), move |element| {
                item(element, index)
            })
        }))
    })
}

// =============================================================================
// TESTS
// =============================================================================
