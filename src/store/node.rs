// ============================================================================
// spark-observable - Observable Node
// Memoized, path-addressed views into a single JSON document
// ============================================================================

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::{Rc, Weak};

use crate::core::constants::ROOT_LABEL;
use crate::core::error::StoreError;
use crate::core::types::{json_kind, primitive_equals, Json, Key, WatcherId};

// =============================================================================
// NODE
// =============================================================================

/// An observable view of one address inside a JSON document.
///
/// The root node owns the document. Every other node is identified by its
/// parent and key and owns no data; reads and writes go through the root.
/// Children are memoized, so asking for the same key twice yields the same
/// node, and nodes compare and hash by identity.
///
/// # Example
///
/// ```
/// use spark_observable::{Node, read, write};
/// use serde_json::json;
///
/// let state = Node::root(json!({ "count": 0 }));
/// let count = state.child("count");
/// assert_eq!(count, state.child("count"));
///
/// write(&count, 5);
/// assert_eq!(read(&state), json!({ "count": 5 }));
/// ```
#[derive(Clone)]
pub struct Node {
    pub(crate) inner: Rc<NodeInner>,
}

pub(crate) struct NodeInner {
    origin: Origin,
    children: RefCell<BTreeMap<Key, Node>>,
    watchers: RefCell<BTreeSet<WatcherId>>,
    notify_count: Cell<u64>,
    read_only_depth: Cell<u32>,
    queued: Cell<bool>,
}

enum Origin {
    Root { value: RefCell<Json> },
    Child { parent: Weak<NodeInner>, key: Key },
}

impl Node {
    /// Create a root node owning `value`.
    pub fn root(value: impl Into<Json>) -> Self {
        Self::with_origin(Origin::Root {
            value: RefCell::new(value.into()),
        })
    }

    fn with_origin(origin: Origin) -> Self {
        Self {
            inner: Rc::new(NodeInner {
                origin,
                children: RefCell::new(BTreeMap::new()),
                watchers: RefCell::new(BTreeSet::new()),
                notify_count: Cell::new(0),
                read_only_depth: Cell::new(0),
                queued: Cell::new(false),
            }),
        }
    }

    /// The child at `key`, created on first access and cached afterwards.
    ///
    /// Never fails: the address does not have to exist in the document.
    pub fn child(&self, key: impl Into<Key>) -> Node {
        let key = key.into();
        if let Some(existing) = self.inner.children.borrow().get(&key) {
            return existing.clone();
        }
        let child = Self::with_origin(Origin::Child {
            parent: Rc::downgrade(&self.inner),
            key: key.clone(),
        });
        self.inner.children.borrow_mut().insert(key, child.clone());
        child
    }

    /// Walk a sequence of keys from this node.
    pub fn at<K: Into<Key>>(&self, path: impl IntoIterator<Item = K>) -> Node {
        path.into_iter()
            .fold(self.clone(), |node, key| node.child(key))
    }

    // =========================================================================
    // IDENTITY
    // =========================================================================

    /// Whether this node owns a document.
    pub fn is_root(&self) -> bool {
        matches!(self.inner.origin, Origin::Root { .. })
    }

    /// The key under which this node hangs off its parent.
    pub fn key(&self) -> Option<&Key> {
        match &self.inner.origin {
            Origin::Root { .. } => None,
            Origin::Child { key, .. } => Some(key),
        }
    }

    /// The parent node, if this is a child whose parent is still alive.
    pub fn parent(&self) -> Option<Node> {
        match &self.inner.origin {
            Origin::Root { .. } => None,
            Origin::Child { parent, .. } => parent.upgrade().map(|inner| Node { inner }),
        }
    }

    /// Whether the owning root has been dropped.
    pub fn is_detached(&self) -> bool {
        self.locate().is_none()
    }

    /// The root node this node belongs to.
    pub fn root_node(&self) -> Option<Node> {
        self.locate().map(|(root, _)| root)
    }

    /// Keys from the root down to this node.
    pub fn path(&self) -> Option<Vec<Key>> {
        self.locate().map(|(_, path)| path)
    }

    /// Dotted name such as `{json}.todos.0.title`.
    pub fn label(&self) -> String {
        let mut keys = Vec::new();
        let mut current = self.clone();
        let reached_root = loop {
            let parent = match &current.inner.origin {
                Origin::Root { .. } => break true,
                Origin::Child { parent, key } => {
                    keys.push(key.to_string());
                    parent.upgrade()
                }
            };
            match parent {
                Some(inner) => current = Node { inner },
                None => break false,
            }
        };
        let mut label = String::from(if reached_root { ROOT_LABEL } else { "<detached>" });
        for key in keys.iter().rev() {
            label.push('.');
            label.push_str(key);
        }
        label
    }

    // =========================================================================
    // DIAGNOSTICS
    // =========================================================================

    /// Memoized children in key order.
    pub fn cached_children(&self) -> Vec<(Key, Node)> {
        self.inner
            .children
            .borrow()
            .iter()
            .map(|(key, node)| (key.clone(), node.clone()))
            .collect()
    }

    /// Number of memoized children.
    pub fn child_count(&self) -> usize {
        self.inner.children.borrow().len()
    }

    /// Number of watchers subscribed to this node.
    pub fn watcher_count(&self) -> usize {
        self.inner.watchers.borrow().len()
    }

    /// How many watcher runs this node's notifications have caused.
    pub fn notify_count(&self) -> u64 {
        self.inner.notify_count.get()
    }

    /// Whether writes are currently refused.
    pub fn is_read_only(&self) -> bool {
        self.inner.read_only_depth.get() > 0
    }

    // =========================================================================
    // SUBSCRIPTIONS (crate-internal)
    // =========================================================================

    pub(crate) fn add_watcher(&self, id: WatcherId) -> bool {
        self.inner.watchers.borrow_mut().insert(id)
    }

    pub(crate) fn remove_watcher(&self, id: WatcherId) {
        self.inner.watchers.borrow_mut().remove(&id);
    }

    pub(crate) fn has_watcher(&self, id: WatcherId) -> bool {
        self.inner.watchers.borrow().contains(&id)
    }

    pub(crate) fn has_watchers(&self) -> bool {
        !self.inner.watchers.borrow().is_empty()
    }

    pub(crate) fn watcher_ids(&self) -> BTreeSet<WatcherId> {
        self.inner.watchers.borrow().clone()
    }

    pub(crate) fn bump_notify_count(&self) {
        self.inner.notify_count.set(self.inner.notify_count.get() + 1);
    }

    /// Mark the node as queued. Returns false if it already was.
    pub(crate) fn mark_queued(&self) -> bool {
        !self.inner.queued.replace(true)
    }

    pub(crate) fn clear_queued(&self) {
        self.inner.queued.set(false);
    }

    // =========================================================================
    // VALUE ACCESS (crate-internal)
    // =========================================================================

    fn locate(&self) -> Option<(Node, Vec<Key>)> {
        let mut keys = Vec::new();
        let mut current = self.clone();
        loop {
            let parent = match &current.inner.origin {
                Origin::Root { .. } => break,
                Origin::Child { parent, key } => {
                    keys.push(key.clone());
                    parent.upgrade()?
                }
            };
            current = Node { inner: parent };
        }
        keys.reverse();
        Some((current, keys))
    }

    fn document(&self) -> Option<&RefCell<Json>> {
        match &self.inner.origin {
            Origin::Root { value } => Some(value),
            Origin::Child { .. } => None,
        }
    }

    fn detached(&self) -> StoreError {
        StoreError::Detached {
            key: self.key().map(Key::to_string).unwrap_or_else(|| ROOT_LABEL.to_string()),
        }
    }

    /// Borrow the current value. `None` when the address is missing or the
    /// node is detached.
    pub(crate) fn with_value<R>(&self, f: impl FnOnce(Option<&Json>) -> R) -> R {
        let Some((root, path)) = self.locate() else {
            return f(None);
        };
        let Some(document) = root.document() else {
            return f(None);
        };
        let value = document.borrow();
        let mut current = Some(&*value);
        for key in &path {
            current = current.and_then(|v| lookup(v, key));
        }
        f(current)
    }

    /// Clone of the current value, `null` when missing.
    pub(crate) fn value(&self) -> Json {
        self.with_value(|value| value.cloned().unwrap_or(Json::Null))
    }

    /// Store `new` unless it is a primitive equal to the current value.
    /// Returns whether the document changed.
    pub(crate) fn replace_value(&self, new: Json) -> Result<bool, StoreError> {
        let (root, path) = self.locate().ok_or_else(|| self.detached())?;
        let document = root.document().ok_or_else(|| self.detached())?;
        let mut value = document.borrow_mut();

        let unchanged = {
            let mut current = Some(&*value);
            for key in &path {
                current = current.and_then(|v| lookup(v, key));
            }
            primitive_equals(current.unwrap_or(&Json::Null), &new)
        };
        if unchanged {
            return Ok(false);
        }

        *slot_mut(&mut value, &path)? = new;
        Ok(true)
    }

    /// Run `f` on a working copy of the value, materializing a missing slot
    /// as `null`, then store the copy back.
    ///
    /// The document is not borrowed while `f` runs, so `f` may read the
    /// store. Those reads see the value from before the call.
    pub(crate) fn with_value_mut<R>(&self, f: impl FnOnce(&mut Json) -> R) -> Result<R, StoreError> {
        let (root, path) = self.locate().ok_or_else(|| self.detached())?;
        let document = root.document().ok_or_else(|| self.detached())?;
        let mut working = slot_mut(&mut document.borrow_mut(), &path)?.clone();
        let result = f(&mut working);
        *slot_mut(&mut document.borrow_mut(), &path)? = working;
        Ok(result)
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Node {}

impl Hash for Node {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Rc::as_ptr(&self.inner).hash(state);
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node({})", self.label())
    }
}

// =============================================================================
// READ-ONLY GUARD
// =============================================================================

/// Holds a node read-only for as long as the guard lives.
pub(crate) struct ReadOnlyGuard {
    node: Node,
}

impl ReadOnlyGuard {
    pub(crate) fn new(node: &Node) -> Self {
        let depth = &node.inner.read_only_depth;
        depth.set(depth.get() + 1);
        Self { node: node.clone() }
    }
}

impl Drop for ReadOnlyGuard {
    fn drop(&mut self) {
        let depth = &self.node.inner.read_only_depth;
        depth.set(depth.get().saturating_sub(1));
    }
}

// =============================================================================
// NAVIGATION
// =============================================================================

fn lookup<'a>(value: &'a Json, key: &Key) -> Option<&'a Json> {
    match (value, key) {
        (Json::Array(items), Key::Index(index)) => items.get(*index),
        (Json::Object(map), key) => map.get(&key.as_field()),
        _ => None,
    }
}

fn label_of(path: &[Key]) -> String {
    let mut label = String::from(ROOT_LABEL);
    for key in path {
        label.push('.');
        label.push_str(&key.to_string());
    }
    label
}

/// Mutable slot at `path`. Intermediate values must already exist; only the
/// last step is materialized.
fn slot_mut<'a>(mut value: &'a mut Json, path: &[Key]) -> Result<&'a mut Json, StoreError> {
    for (depth, key) in path.iter().enumerate() {
        let materialize = depth + 1 == path.len();
        value = step_mut(value, key, materialize).map_err(|found| StoreError::NotAContainer {
            path: label_of(&path[..depth]),
            found,
        })?;
    }
    Ok(value)
}

fn step_mut<'a>(value: &'a mut Json, key: &Key, materialize: bool) -> Result<&'a mut Json, &'static str> {
    match (value, key) {
        (Json::Array(items), Key::Index(index)) => {
            if *index >= items.len() {
                if !materialize {
                    return Err("null");
                }
                items.resize(*index + 1, Json::Null);
            }
            Ok(&mut items[*index])
        }
        (Json::Object(map), key) => {
            let field = key.as_field();
            if materialize {
                Ok(map.entry(field).or_insert(Json::Null))
            } else {
                map.get_mut(&field).ok_or("null")
            }
        }
        (other, _) => Err(json_kind(other)),
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn children_are_memoized() {
        let root = Node::root(json!({ "a": { "b": 1 } }));
        let a1 = root.child("a");
        let a2 = root.child("a");
        assert_eq!(a1, a2);
        assert_eq!(root.child_count(), 1);
        assert_eq!(a1.child("b"), root.at(["a", "b"]));
    }

    #[test]
    fn numeric_strings_share_index_children() {
        let root = Node::root(json!([10, 20]));
        assert_eq!(root.child("1"), root.child(1usize));
        assert_eq!(root.child(1usize).value(), json!(20));
    }

    #[test]
    fn labels_follow_the_path() {
        let root = Node::root(json!({}));
        assert_eq!(root.label(), "{json}");
        assert_eq!(root.at(["todos", "0", "title"]).label(), "{json}.todos.0.title");
    }

    #[test]
    fn missing_addresses_read_null() {
        let root = Node::root(json!({ "a": 1 }));
        assert_eq!(root.child("zzz").value(), Json::Null);
        assert_eq!(root.at(["a", "deeper"]).value(), Json::Null);
    }

    #[test]
    fn replace_skips_equal_primitives() {
        let root = Node::root(json!({ "n": 1 }));
        let n = root.child("n");
        assert_eq!(n.replace_value(json!(1)), Ok(false));
        assert_eq!(n.replace_value(json!(2)), Ok(true));
        assert_eq!(root.value(), json!({ "n": 2 }));
    }

    #[test]
    fn replace_always_changes_composites() {
        let root = Node::root(json!({ "list": [] }));
        assert_eq!(root.child("list").replace_value(json!([])), Ok(true));
    }

    #[test]
    fn array_writes_pad_with_null() {
        let root = Node::root(json!([1]));
        root.child(3usize).replace_value(json!(4)).unwrap();
        assert_eq!(root.value(), json!([1, null, null, 4]));
    }

    #[test]
    fn writes_below_primitives_fail() {
        let root = Node::root(json!({ "name": "x" }));
        let err = root.at(["name", "first"]).replace_value(json!(1)).unwrap_err();
        assert_eq!(
            err,
            StoreError::NotAContainer {
                path: "{json}.name".into(),
                found: "string"
            }
        );
    }

    #[test]
    fn missing_intermediate_fails_without_side_effects() {
        let root = Node::root(json!({}));
        let err = root.at(["a", "b"]).replace_value(json!(1)).unwrap_err();
        assert!(matches!(err, StoreError::NotAContainer { found: "null", .. }));
        assert_eq!(root.value(), json!({}));
    }

    #[test]
    fn detached_nodes_read_null_and_refuse_writes() {
        let child = {
            let root = Node::root(json!({ "a": 1 }));
            root.child("a")
        };
        assert!(child.is_detached());
        assert_eq!(child.value(), Json::Null);
        assert_eq!(
            child.replace_value(json!(2)),
            Err(StoreError::Detached { key: "a".into() })
        );
        assert_eq!(child.label(), "<detached>.a");
    }

    #[test]
    fn read_only_guard_nests() {
        let root = Node::root(json!(0));
        {
            let _outer = ReadOnlyGuard::new(&root);
            {
                let _inner = ReadOnlyGuard::new(&root);
                assert!(root.is_read_only());
            }
            assert!(root.is_read_only());
        }
        assert!(!root.is_read_only());
    }

    #[test]
    fn queued_flag_dedupes() {
        let root = Node::root(json!(0));
        assert!(root.mark_queued());
        assert!(!root.mark_queued());
        root.clear_queued();
        assert!(root.mark_queued());
    }
}
