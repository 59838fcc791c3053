// ============================================================================
// spark-observable - Components
// A view template bundled with the store root it renders from
// ============================================================================

use crate::core::types::Json;
use crate::store::{create_root, Node};

use super::host::HostTree;
use super::template::Template;

/// A model root and the view built over it.
///
/// The model is a fresh document owned by the component. Rendering the
/// component renders its view; the model stays reachable through
/// [`Component::model`] for code outside the view.
///
/// # Example
///
/// ```
/// use spark_observable::render::{el, render, Component, MemoryHost};
/// use spark_observable::{flush_now, write};
/// use serde_json::json;
/// use std::rc::Rc;
///
/// let host = Rc::new(MemoryHost::new());
/// let body = host.container("body");
/// let greeting = Component::new(json!({ "name": "Ada" }), |model| {
///     el("h1").children(model.child("name")).into()
/// });
/// let name = greeting.model().child("name");
///
/// let _mount = render(&host, &body, greeting);
/// write(&name, "Grace");
/// flush_now();
/// assert_eq!(body.markup(), "<body><h1>Grace</h1></body>");
/// ```
pub struct Component<H: HostTree> {
    model: Node,
    view: Template<H>,
}

impl<H: HostTree> Component<H> {
    pub fn new(model: impl Into<Json>, view: impl FnOnce(&Node) -> Template<H>) -> Self {
        let model = create_root(model);
        let view = view(&model);
        Self { model, view }
    }

    /// Wrap a view over a model root that already exists.
    pub fn with_model(model: &Node, view: impl FnOnce(&Node) -> Template<H>) -> Self {
        Self {
            model: model.clone(),
            view: view(model),
        }
    }

    pub fn model(&self) -> &Node {
        &self.model
    }

    pub fn into_view(self) -> Template<H> {
        self.view
    }
}

impl<H: HostTree> From<Component<H>> for Template<H> {
    fn from(component: Component<H>) -> Self {
        component.view
    }
}

// =============================================================================
// TESTS
// =============================================================================
