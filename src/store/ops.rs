// ============================================================================
// spark-observable - Store Operations
// Tracked reads, guarded writes and in-place mutation
// ============================================================================

use std::any::Any;

use tracing::trace;

use super::node::Node;
use crate::core::error::StoreError;
use crate::core::types::Json;
use crate::reactivity::scheduling::notify;
use crate::reactivity::tracking::track_read;

// =============================================================================
// CONSTRUCTION
// =============================================================================

/// Create a root node owning `value`.
pub fn create_root(value: impl Into<Json>) -> Node {
    Node::root(value)
}

/// Whether `value` is an observable node.
pub fn is_node(value: &dyn Any) -> bool {
    value.is::<Node>()
}

// =============================================================================
// READS
// =============================================================================

/// Read the current value at `node` (missing addresses read as `null`).
///
/// Inside a running watcher this subscribes the watcher to `node`.
///
/// # Example
///
/// ```
/// use spark_observable::{Node, read};
/// use serde_json::json;
///
/// let state = Node::root(json!({ "user": { "name": "Ada" } }));
/// assert_eq!(read(&state.at(["user", "name"])), json!("Ada"));
/// assert_eq!(read(&state.child("missing")), json!(null));
/// ```
pub fn read(node: &Node) -> Json {
    track_read(node);
    node.value()
}

/// `f(read(node))`.
pub fn read_map<R>(node: &Node, f: impl FnOnce(&Json) -> R) -> R {
    let value = read(node);
    f(&value)
}

// =============================================================================
// WRITES
// =============================================================================

fn ensure_writable(node: &Node) -> Result<(), StoreError> {
    if node.is_read_only() {
        return Err(StoreError::ReadOnly { path: node.label() });
    }
    Ok(())
}

/// Replace the value at `node`, returning the written value.
///
/// Writing a primitive equal to the current primitive is a no-op. Arrays and
/// objects are never compared, so writing one always notifies.
pub fn try_write(node: &Node, value: impl Into<Json>) -> Result<Json, StoreError> {
    ensure_writable(node)?;
    let value = value.into();
    if node.replace_value(value.clone())? {
        trace!(node = %node.label(), "write");
        notify(node);
    }
    Ok(value)
}

/// Write form of [`try_write`] that panics on a contract violation.
///
/// # Panics
///
/// Panics if the node is read-only, sits below a non-container value or has
/// lost its root.
pub fn write(node: &Node, value: impl Into<Json>) -> Json {
    match try_write(node, value) {
        Ok(value) => value,
        Err(err) => panic!("{err}"),
    }
}

/// Write `f(current)`, where `current` is read without subscribing.
pub fn try_write_with(node: &Node, f: impl FnOnce(&Json) -> Json) -> Result<Json, StoreError> {
    ensure_writable(node)?;
    let next = f(&node.value());
    try_write(node, next)
}

/// Panicking form of [`try_write_with`].
pub fn write_with(node: &Node, f: impl FnOnce(&Json) -> Json) -> Json {
    match try_write_with(node, f) {
        Ok(value) => value,
        Err(err) => panic!("{err}"),
    }
}

/// Read `node` (tracked), transform it and write the result back.
pub fn read_write(node: &Node, f: impl FnOnce(Json) -> Json) -> Json {
    let next = f(read(node));
    write(node, next)
}

/// Mutate the value in place and notify unconditionally.
///
/// A missing slot is materialized as `null` before `mutator` sees it.
/// `mutator` works on a copy that replaces the slot when it returns: reads
/// made inside it see the value from before the call, and a write to the
/// same node from inside it is overwritten.
///
/// # Errors
///
/// `ReadOnly` while the node is being delivered or watched, `NotAContainer`
/// when an ancestor holds a primitive, `Detached` once the root is gone.
pub fn try_mutate<R>(node: &Node, mutator: impl FnOnce(&mut Json) -> R) -> Result<R, StoreError> {
    ensure_writable(node)?;
    let result = node.with_value_mut(mutator)?;
    trace!(node = %node.label(), "mutate");
    notify(node);
    Ok(result)
}

/// Panicking form of [`try_mutate`].
///
/// # Panics
///
/// On any error [`try_mutate`] would return.
///
/// # Example
///
/// ```
/// use spark_observable::{Node, mutate, read};
/// use serde_json::json;
///
/// let list = Node::root(json!([1, 2]));
/// mutate(&list, |value| {
///     if let Some(items) = value.as_array_mut() {
///         items.push(json!(3));
///     }
/// });
/// assert_eq!(read(&list), json!([1, 2, 3]));
/// ```
pub fn mutate<R>(node: &Node, mutator: impl FnOnce(&mut Json) -> R) -> R {
    match try_mutate(node, mutator) {
        Ok(result) => result,
        Err(err) => panic!("{err}"),
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::StoreError;
    use crate::store::node::ReadOnlyGuard;
    use serde_json::json;

    #[test]
    fn write_returns_the_value() {
        let root = create_root(json!({ "a": 1 }));
        assert_eq!(write(&root.child("a"), 2), json!(2));
        assert_eq!(read(&root), json!({ "a": 2 }));
    }

    #[test]
    fn write_with_sees_current_value() {
        let root = create_root(json!({ "n": 4 }));
        let n = root.child("n");
        let written = write_with(&n, |v| json!(v.as_i64().unwrap_or(0) * 10));
        assert_eq!(written, json!(40));
        assert_eq!(read(&n), json!(40));
    }

    #[test]
    fn read_write_transforms() {
        let root = create_root(json!("ab"));
        let out = read_write(&root, |v| json!(format!("{}c", v.as_str().unwrap_or(""))));
        assert_eq!(out, json!("abc"));
    }

    #[test]
    fn read_map_projects() {
        let root = create_root(json!([1, 2, 3]));
        let len = read_map(&root, |v| v.as_array().map_or(0, Vec::len));
        assert_eq!(len, 3);
    }

    #[test]
    fn mutate_materializes_missing_slot() {
        let root = create_root(json!({}));
        mutate(&root.child("list"), |value| {
            assert!(value.is_null());
            *value = json!([1]);
        });
        assert_eq!(read(&root), json!({ "list": [1] }));
    }

    #[test]
    fn mutator_can_read_the_store() {
        let root = create_root(json!({ "list": [1], "extra": 2 }));
        let (list, extra) = (root.child("list"), root.child("extra"));
        let seen = mutate(&list, |value| {
            let before = read(&list);
            if let Some(items) = value.as_array_mut() {
                items.push(read(&extra));
            }
            before
        });
        assert_eq!(seen, json!([1]));
        assert_eq!(read(&root), json!({ "list": [1, 2], "extra": 2 }));
    }

    #[test]
    fn read_only_nodes_refuse_writes() {
        let root = create_root(json!({ "a": 1 }));
        let a = root.child("a");
        let _guard = ReadOnlyGuard::new(&a);
        assert_eq!(
            try_write(&a, 2),
            Err(StoreError::ReadOnly {
                path: "{json}.a".into()
            })
        );
        assert!(try_mutate(&a, |_| ()).is_err());
        // siblings stay writable
        assert!(try_write(&root.child("b"), 2).is_ok());
    }

    #[test]
    #[should_panic(expected = "read-only phase")]
    fn plain_write_panics_when_read_only() {
        let root = create_root(json!(0));
        let _guard = ReadOnlyGuard::new(&root);
        write(&root, 1);
    }

    #[test]
    fn is_node_detects_nodes() {
        let root = create_root(json!(null));
        assert!(is_node(&root));
        assert!(!is_node(&json!(null)));
        assert!(!is_node(&5));
    }
}
