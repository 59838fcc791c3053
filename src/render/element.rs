// ============================================================================
// spark-observable - Element Templates
// Host elements with reactive bindings, events, shadow content and children
// ============================================================================

use std::rc::Rc;

use crate::core::types::{json_text, Json};
use crate::reactivity::watcher::{watch, ReadingValue};

use super::host::{EventHandler, HostTree};
use super::reconciler::{render_at, Cursor, Scope, SharedCursor};
use super::template::Template;

/// Inline style declarations: property name and value.
pub type StyleMap = Vec<(String, ReadingValue<Json>)>;

type AttachFn<N> = Box<dyn FnOnce(&N)>;

// =============================================================================
// ELEMENT TEMPLATE
// =============================================================================

/// Builder for a host element.
///
/// Every binding takes a `ReadingValue<Json>`: a plain value, a node or a
/// getter. Bound values are applied as text except properties, which get
/// the raw JSON.
///
/// # Example
///
/// ```
/// use spark_observable::render::{el, render, MemoryHost};
/// use spark_observable::{flush_now, write, Node};
/// use serde_json::json;
/// use std::rc::Rc;
///
/// let host = Rc::new(MemoryHost::new());
/// let body = host.container("body");
/// let state = Node::root(json!({ "theme": "dark" }));
///
/// let _mount = render(&host, &body, el("p")
///     .class(&state.child("theme"))
///     .attr("title", "greeting")
///     .style("color", "red")
///     .children("hi"));
/// assert_eq!(body.markup(), r#"<body><p class="dark" title="greeting" style="color: red">hi</p></body>"#);
///
/// write(&state.child("theme"), "light");
/// flush_now();
/// assert_eq!(body.markup(), r#"<body><p class="light" title="greeting" style="color: red">hi</p></body>"#);
/// ```
pub struct ElementTemplate<H: HostTree> {
    pub(crate) tag: String,
    namespace: Option<String>,
    class: Option<ReadingValue<Json>>,
    style: StyleMap,
    dynamic_style: Option<Box<dyn FnMut() -> StyleMap>>,
    attributes: Vec<(String, ReadingValue<Json>)>,
    properties: Vec<(String, ReadingValue<Json>)>,
    events: Vec<(String, EventHandler<H::Event>)>,
    shadow: Option<Template<H>>,
    children: Option<Template<H>>,
    on_attach: Option<AttachFn<H::Node>>,
}

/// Start an element template.
pub fn el<H: HostTree>(tag: impl Into<String>) -> ElementTemplate<H> {
    ElementTemplate::new(tag)
}

impl<H: HostTree> ElementTemplate<H> {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            namespace: None,
            class: None,
            style: Vec::new(),
            dynamic_style: None,
            attributes: Vec::new(),
            properties: Vec::new(),
            events: Vec::new(),
            shadow: None,
            children: None,
            on_attach: None,
        }
    }

    /// Create the element in a namespace (e.g. SVG).
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn class(mut self, class: impl Into<ReadingValue<Json>>) -> Self {
        self.class = Some(class.into());
        self
    }

    /// Add one inline style declaration.
    pub fn style(mut self, property: impl Into<String>, value: impl Into<ReadingValue<Json>>) -> Self {
        self.style.push((property.into(), value.into()));
        self
    }

    /// Compute the whole declaration list reactively. Replaces any
    /// declarations added with [`ElementTemplate::style`].
    pub fn style_with(mut self, styles: impl FnMut() -> StyleMap + 'static) -> Self {
        self.dynamic_style = Some(Box::new(styles));
        self
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<ReadingValue<Json>>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    /// Bind a host property (anything that is not an attribute).
    pub fn prop(mut self, name: impl Into<String>, value: impl Into<ReadingValue<Json>>) -> Self {
        self.properties.push((name.into(), value.into()));
        self
    }

    pub fn on(mut self, event: impl Into<String>, handler: impl Fn(&H::Event) + 'static) -> Self {
        self.events.push((event.into(), Rc::new(handler)));
        self
    }

    /// Content rendered into the element's nested scope.
    pub fn shadow(mut self, content: impl Into<Template<H>>) -> Self {
        self.shadow = Some(content.into());
        self
    }

    pub fn children(mut self, content: impl Into<Template<H>>) -> Self {
        self.children = Some(content.into());
        self
    }

    /// Called with the element right after it is inserted.
    pub fn on_attach(mut self, callback: impl FnOnce(&H::Node) + 'static) -> Self {
        self.on_attach = Some(Box::new(callback));
        self
    }
}

// =============================================================================
// RENDER
// =============================================================================

pub(crate) fn render_element<H: HostTree>(
    scope: &Scope<H>,
    template: ElementTemplate<H>,
    path: &[usize],
    cursor: &SharedCursor<H::Node>,
) {
    let host = scope.host.clone();
    let element = host.create_element(&template.tag, template.namespace.as_deref());

    if let Some(class) = template.class {
        let (host, element) = (host.clone(), element.clone());
        watch(class, move |value, _| host.bind_attribute(&element, "class", &json_text(&value)));
    }

    let style: ReadingValue<StyleMap> = match template.dynamic_style {
        Some(styles) => ReadingValue::Getter(styles),
        None => ReadingValue::Static(template.style),
    };
    bind_styles(&host, &element, style);

    for (name, value) in template.attributes {
        let (host, element) = (host.clone(), element.clone());
        watch(value, move |value, _| host.bind_attribute(&element, &name, &json_text(&value)));
    }

    for (name, handler) in template.events {
        host.add_event_listener(&element, &name, handler);
    }

    for (name, value) in template.properties {
        let (host, element) = (host.clone(), element.clone());
        watch(value, move |value, _| host.bind_property(&element, &name, &value));
    }

    if let Some(content) = template.shadow {
        let nested = host.attach_nested_scope(&element);
        let nested_scope = scope.nested(nested);
        render_at(&nested_scope, content, &[0], &Cursor::append());
    }

    if let Some(content) = template.children {
        let child_scope = scope.nested(element.clone());
        render_at(&child_scope, content, &[0], &Cursor::append());
    }

    scope.place(element.clone(), path, cursor);

    if let Some(callback) = template.on_attach {
        callback(&element);
    }
}

fn bind_styles<H: HostTree>(host: &Rc<H>, element: &H::Node, styles: ReadingValue<StyleMap>) {
    if matches!(&styles, ReadingValue::Static(map) if map.is_empty()) {
        return;
    }
    let (host, element) = (host.clone(), element.clone());
    watch(styles, move |declarations: StyleMap, _| {
        host.clear_style(&element);
        for (property, value) in declarations {
            let (host, element) = (host.clone(), element.clone());
            watch(value, move |value, _| host.bind_style(&element, &property, &json_text(&value)));
        }
    });
}

// =============================================================================
// TESTS
// =============================================================================
