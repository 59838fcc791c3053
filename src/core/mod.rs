// ============================================================================
// spark-observable - Core Module
// Fundamental types, errors and the thread-local context
// ============================================================================

pub mod constants;
pub mod context;
pub mod error;
pub mod types;

// Re-export commonly used items
pub use constants::*;
pub use context::{
    generation, is_batching, is_tracking, is_untracking, live_watcher_count, with_context,
    ReactiveContext,
};
pub use error::{RenderError, StoreError};
pub use types::{
    is_primitive, json_kind, json_text, json_truthy, primitive_equals, Json, Key, WatcherId,
};
