// ============================================================================
// spark-observable - Host Tree Capability
// The operations the reconciler needs from whatever it renders into
// ============================================================================

use std::fmt;
use std::rc::Rc;

use crate::core::types::Json;

/// Event callback registered through [`HostTree::add_event_listener`].
pub type EventHandler<E> = Rc<dyn Fn(&E)>;

/// A mutable tree of host nodes (a DOM, a widget tree, an in-memory mock).
///
/// Containers are the nodes passed to `render`, elements and the scopes
/// returned by `attach_nested_scope`. Nodes are handles: cloning one must
/// refer to the same host node, and equality must be identity.
pub trait HostTree: 'static {
    type Node: Clone + PartialEq + fmt::Debug + 'static;
    type Event: 'static;

    /// Create a detached text leaf.
    fn create_leaf(&self, text: &str) -> Self::Node;

    /// Replace a text leaf's content in place.
    fn set_leaf_text(&self, leaf: &Self::Node, text: &str);

    /// Create a detached element.
    fn create_element(&self, tag: &str, namespace: Option<&str>) -> Self::Node;

    /// Insert `node` into `container` before `reference`, or append when
    /// `reference` is `None`. A node that already has a parent moves.
    fn insert_before(&self, container: &Self::Node, node: &Self::Node, reference: Option<&Self::Node>);

    /// Remove `node` from `container`.
    fn remove_child(&self, container: &Self::Node, node: &Self::Node);

    /// The container `node` is currently inserted in.
    fn parent(&self, node: &Self::Node) -> Option<Self::Node>;

    fn bind_attribute(&self, element: &Self::Node, name: &str, value: &str);

    fn bind_property(&self, element: &Self::Node, name: &str, value: &Json);

    fn bind_style(&self, element: &Self::Node, property: &str, value: &str);

    /// Drop every inline style property.
    fn clear_style(&self, element: &Self::Node);

    fn add_event_listener(&self, element: &Self::Node, event: &str, handler: EventHandler<Self::Event>);

    /// Create (or return) the isolated child scope of `element`, used as the
    /// container for its shadow content.
    fn attach_nested_scope(&self, element: &Self::Node) -> Self::Node;
}
