// ============================================================================
// spark-observable - Observable JSON State and Template Reconciliation
// ============================================================================
//
// A JSON document is exposed as a tree of nodes. Watchers read nodes, record
// them as dependencies and re-run when a write to one of them is flushed.
// The render layer builds on that to keep a host tree in sync with
// templates that reference nodes.
// ============================================================================

pub mod core;
pub mod reactivity;
pub mod render;
pub mod store;

mod macros;

// Re-export core items at crate root for ergonomic access
pub use core::constants;
pub use core::context::{
    generation, is_batching, is_tracking, is_untracking, live_watcher_count, with_context,
    ReactiveContext,
};
pub use core::error::{RenderError, StoreError};
pub use core::types::{json_kind, json_text, json_truthy, Json, Key, WatcherId};

// Re-export the store
pub use store::{
    create_root, debug_dump, is_node, mutate, read, read_map, read_write, try_mutate, try_write,
    try_write_with, write, write_with, Node,
};

// Re-export reactivity functions
pub use reactivity::batching::{batch, peek, tick, untrack};
pub use reactivity::scheduling::{
    configure, flush_now, has_pending, notify, settle, FlushMode, SchedulerOptions,
};
pub use reactivity::tracking::track_read;
pub use reactivity::watcher::{watch, watcher_snapshot, ReadingValue, Watcher, WatcherSnapshot};

// =============================================================================
// TESTS
// =============================================================================
