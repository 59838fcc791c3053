// ============================================================================
// spark-observable - Reactivity Module
// Watchers, dependency tracking and the notification scheduler
// ============================================================================

pub mod batching;
pub mod scheduling;
pub mod tracking;
pub mod watcher;

// Re-export main tracking functions
pub use tracking::track_read;

// Re-export watcher API
pub use watcher::{watch, watcher_snapshot, ReadingValue, Watcher, WatcherArena, WatcherSnapshot};

// Re-export scheduling functions
pub use scheduling::{configure, flush_now, has_pending, notify, settle, FlushMode, SchedulerOptions};

// Re-export batching functions
pub use batching::{batch, peek, tick, untrack};
