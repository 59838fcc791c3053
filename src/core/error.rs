// ============================================================================
// spark-observable - Errors
// Contract violations reported by the store and the reconciler
// ============================================================================

use thiserror::Error;

/// Errors raised by store writes.
///
/// The plain `write`/`mutate` operations treat these as programmer errors and
/// panic with the message; the `try_*` forms hand them back.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The node is held read-only by a running watcher or by the flush that
    /// is delivering its notifications.
    #[error("cannot write to `{path}` while it is being observed (read-only phase)")]
    ReadOnly { path: String },

    /// A value on the way to the node is not an array or object.
    #[error("cannot address a child of `{path}`: it holds {found}, not a container")]
    NotAContainer { path: String, found: &'static str },

    /// The root that owned this node's document has been dropped.
    #[error("node `{key}` is detached from its root")]
    Detached { key: String },
}

/// Errors raised while turning values into templates.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    /// Only `null`, strings, numbers and arrays of those render directly.
    #[error("a {kind} value cannot be rendered as a template")]
    Unrenderable { kind: &'static str },
}
