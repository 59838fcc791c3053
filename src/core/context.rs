// ============================================================================
// spark-observable - Reactive Context
// Thread-local state: watcher stack, watcher arena and the pending batch
// ============================================================================

use std::cell::{Cell, RefCell};

use super::constants::INITIAL_GENERATION;
use super::types::WatcherId;
use crate::reactivity::scheduling::{FlushMode, SchedulerOptions};
use crate::reactivity::watcher::WatcherArena;
use crate::store::Node;

// =============================================================================
// REACTIVE CONTEXT
// =============================================================================

/// Thread-local reactive context holding all global state for observation.
///
/// Everything here is single-threaded. Nodes, watchers and the pending batch
/// never cross threads, so each thread that uses the store gets its own
/// independent scheduler.
pub struct ReactiveContext {
    // =========================================================================
    // WATCHER TRACKING
    // =========================================================================
    /// Watchers currently running, innermost last
    pub watcher_stack: RefCell<Vec<WatcherId>>,

    /// Whether reads are currently untracked
    pub untracking: Cell<bool>,

    /// Every live watcher
    pub watchers: RefCell<WatcherArena>,

    // =========================================================================
    // SCHEDULING
    // =========================================================================
    /// Flush counter, incremented once per flush
    pub generation: Cell<u64>,

    /// Nodes dirtied since the last flush, in first-write order
    pub pending: RefCell<Vec<Node>>,

    /// Whether a flush has been requested for the pending batch
    pub flush_scheduled: Cell<bool>,

    /// Whether a flush is delivering notifications right now
    pub is_flushing: Cell<bool>,

    /// Current batch depth (for nested batches)
    pub batch_depth: Cell<u32>,

    /// Scheduler configuration
    pub options: RefCell<SchedulerOptions>,
}

impl ReactiveContext {
    /// Create a new reactive context with default values
    pub fn new() -> Self {
        Self {
            watcher_stack: RefCell::new(Vec::new()),
            untracking: Cell::new(false),
            watchers: RefCell::new(WatcherArena::default()),
            generation: Cell::new(INITIAL_GENERATION),
            pending: RefCell::new(Vec::new()),
            flush_scheduled: Cell::new(false),
            is_flushing: Cell::new(false),
            batch_depth: Cell::new(0),
            options: RefCell::new(SchedulerOptions::default()),
        }
    }

    // =========================================================================
    // WATCHER TRACKING
    // =========================================================================

    /// The innermost running watcher
    pub fn current_watcher(&self) -> Option<WatcherId> {
        self.watcher_stack.borrow().last().copied()
    }

    /// Push a watcher onto the stack
    pub fn push_watcher(&self, id: WatcherId) {
        self.watcher_stack.borrow_mut().push(id);
    }

    /// Pop the innermost watcher
    pub fn pop_watcher(&self) -> Option<WatcherId> {
        self.watcher_stack.borrow_mut().pop()
    }

    /// Whether any watcher is running
    pub fn is_running_watcher(&self) -> bool {
        !self.watcher_stack.borrow().is_empty()
    }

    /// Set untracking mode, returning previous value
    pub fn set_untracking(&self, value: bool) -> bool {
        self.untracking.replace(value)
    }

    /// Check if currently untracking
    pub fn is_untracking(&self) -> bool {
        self.untracking.get()
    }

    /// Number of live watchers
    pub fn watcher_count(&self) -> usize {
        self.watchers.borrow().len()
    }

    // =========================================================================
    // SCHEDULING
    // =========================================================================

    /// Get the current generation
    pub fn get_generation(&self) -> u64 {
        self.generation.get()
    }

    /// Increment and return the generation
    pub fn increment_generation(&self) -> u64 {
        let g = self.generation.get() + 1;
        self.generation.set(g);
        g
    }

    /// Queue a node for the next flush
    pub fn push_pending(&self, node: Node) {
        self.pending.borrow_mut().push(node);
    }

    /// Take the whole pending batch
    pub fn take_pending(&self) -> Vec<Node> {
        self.pending.replace(Vec::new())
    }

    /// Whether any node is waiting for a flush
    pub fn has_pending(&self) -> bool {
        !self.pending.borrow().is_empty()
    }

    /// Set the flush-scheduled flag, returning previous
    pub fn set_flush_scheduled(&self, value: bool) -> bool {
        self.flush_scheduled.replace(value)
    }

    /// Set flushing mode, returning previous
    pub fn set_flushing(&self, value: bool) -> bool {
        self.is_flushing.replace(value)
    }

    /// Check if a flush is in progress
    pub fn is_flushing(&self) -> bool {
        self.is_flushing.get()
    }

    // =========================================================================
    // BATCHING
    // =========================================================================

    /// Increment batch depth, returns new depth
    pub fn enter_batch(&self) -> u32 {
        let depth = self.batch_depth.get() + 1;
        self.batch_depth.set(depth);
        depth
    }

    /// Decrement batch depth, returns new depth
    pub fn exit_batch(&self) -> u32 {
        let depth = self.batch_depth.get().saturating_sub(1);
        self.batch_depth.set(depth);
        depth
    }

    /// Check if currently in a batch
    pub fn is_batching(&self) -> bool {
        self.batch_depth.get() > 0
    }

    /// Current flush mode
    pub fn flush_mode(&self) -> FlushMode {
        self.options.borrow().mode
    }
}

impl Default for ReactiveContext {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// THREAD-LOCAL ACCESS
// =============================================================================

thread_local! {
    /// The thread-local reactive context
    static CONTEXT: ReactiveContext = ReactiveContext::new();
}

/// Access the thread-local reactive context.
///
/// # Example
///
/// ```ignore
/// with_context(|ctx| {
///     ctx.increment_generation();
/// });
/// ```
pub fn with_context<R>(f: impl FnOnce(&ReactiveContext) -> R) -> R {
    CONTEXT.with(f)
}

// =============================================================================
// CONVENIENCE FUNCTIONS
// =============================================================================

/// Check if reads are currently recorded (inside a watcher, not untracking)
pub fn is_tracking() -> bool {
    with_context(|ctx| ctx.is_running_watcher() && !ctx.is_untracking())
}

/// Check if currently untracking
pub fn is_untracking() -> bool {
    with_context(|ctx| ctx.is_untracking())
}

/// Check if currently in a batch
pub fn is_batching() -> bool {
    with_context(|ctx| ctx.is_batching())
}

/// The number of flushes performed on this thread so far
pub fn generation() -> u64 {
    with_context(|ctx| ctx.get_generation())
}

/// The number of live watchers on this thread
pub fn live_watcher_count() -> usize {
    with_context(|ctx| ctx.watcher_count())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_creation() {
        with_context(|ctx| {
            assert_eq!(ctx.get_generation(), INITIAL_GENERATION);
            assert!(ctx.current_watcher().is_none());
            assert!(!ctx.is_untracking());
            assert!(!ctx.is_batching());
            assert!(!ctx.has_pending());
            assert_eq!(ctx.flush_mode(), FlushMode::Deferred);
        });
    }

    #[test]
    fn generation_counter() {
        with_context(|ctx| {
            let start = ctx.get_generation();
            assert_eq!(ctx.increment_generation(), start + 1);
            assert_eq!(ctx.increment_generation(), start + 2);
            assert_eq!(ctx.get_generation(), start + 2);
        });
    }

    #[test]
    fn batch_depth() {
        with_context(|ctx| {
            assert!(!ctx.is_batching());

            assert_eq!(ctx.enter_batch(), 1);
            assert_eq!(ctx.enter_batch(), 2);
            assert!(ctx.is_batching());

            assert_eq!(ctx.exit_batch(), 1);
            assert_eq!(ctx.exit_batch(), 0);
            assert!(!ctx.is_batching());
            assert_eq!(ctx.exit_batch(), 0);
        });
    }

    #[test]
    fn untracking_flag() {
        with_context(|ctx| {
            let prev = ctx.set_untracking(true);
            assert!(!prev);
            assert!(ctx.is_untracking());

            let prev = ctx.set_untracking(false);
            assert!(prev);
        });
    }

    #[test]
    fn convenience_functions() {
        assert!(!is_tracking());
        assert!(!is_untracking());
        assert!(!is_batching());
        assert_eq!(live_watcher_count(), 0);
    }
}
