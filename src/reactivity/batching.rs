// ============================================================================
// spark-observable - Batching
// Group writes, suspend tracking, wait for the next tick
// ============================================================================

use crate::core::context::with_context;
use crate::reactivity::scheduling::{settle, settle_if_immediate};

// =============================================================================
// BATCH
// =============================================================================

/// Group several writes so they are delivered together.
///
/// In deferred mode writes already wait for the next flush, so a batch only
/// matters in `FlushMode::Immediate`: there, nothing settles until the
/// outermost batch exits.
///
/// # Example
///
/// ```
/// use spark_observable::{batch, configure, watch, write, FlushMode, Node, SchedulerOptions};
/// use serde_json::json;
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let previous = configure(SchedulerOptions { mode: FlushMode::Immediate, ..Default::default() });
///
/// let state = Node::root(json!({ "a": 1, "b": 2 }));
/// let runs = Rc::new(Cell::new(0));
/// let runs_clone = runs.clone();
/// let _w = watch(&state, move |_, _| runs_clone.set(runs_clone.get() + 1));
///
/// batch(|| {
///     write(&state, json!({ "a": 10, "b": 2 }));
///     write(&state, json!({ "a": 10, "b": 20 }));
///     assert_eq!(runs.get(), 1);
/// });
/// assert_eq!(runs.get(), 2);
///
/// configure(previous);
/// ```
pub fn batch<T>(f: impl FnOnce() -> T) -> T {
    with_context(|ctx| ctx.enter_batch());

    // Use a guard pattern to ensure we exit the batch even on panic
    struct BatchGuard;

    impl Drop for BatchGuard {
        fn drop(&mut self) {
            let depth = with_context(|ctx| ctx.exit_batch());

            if depth == 0 && !std::thread::panicking() {
                settle_if_immediate();
            }
        }
    }

    let _guard = BatchGuard;
    f()
}

// =============================================================================
// UNTRACK
// =============================================================================

/// Read nodes without subscribing the running watcher.
///
/// Watchers created inside `f` still track their own reads.
///
/// # Example
///
/// ```
/// use spark_observable::{flush_now, read, untrack, watch, write, Node, ReadingValue};
/// use serde_json::json;
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let state = Node::root(json!({ "a": 1, "b": 2 }));
/// let (a, b) = (state.child("a"), state.child("b"));
/// let runs = Rc::new(Cell::new(0));
///
/// let (a_clone, b_clone, runs_clone) = (a.clone(), b.clone(), runs.clone());
/// let _w = watch(
///     ReadingValue::getter(move || {
///         let _ = read(&a_clone);
///         untrack(|| read(&b_clone))
///     }),
///     move |_, _| runs_clone.set(runs_clone.get() + 1),
/// );
///
/// write(&b, 20);
/// flush_now();
/// assert_eq!(runs.get(), 1);
///
/// write(&a, 10);
/// flush_now();
/// assert_eq!(runs.get(), 2);
/// ```
pub fn untrack<T>(f: impl FnOnce() -> T) -> T {
    let prev = with_context(|ctx| ctx.set_untracking(true));

    // Use a guard pattern to ensure we restore even on panic
    struct UntrackGuard {
        prev: bool,
    }

    impl Drop for UntrackGuard {
        fn drop(&mut self) {
            with_context(|ctx| ctx.set_untracking(self.prev));
        }
    }

    let _guard = UntrackGuard { prev };
    f()
}

/// Alias for `untrack()`.
pub fn peek<T>(f: impl FnOnce() -> T) -> T {
    untrack(f)
}

// =============================================================================
// TICK
// =============================================================================

/// Deliver everything that is pending, including follow-up writes.
///
/// This is [`settle`] under the name of the host's frame callback: the
/// `on_schedule` hook of [`SchedulerOptions`] asks the host for a tick, and
/// the host answers by calling `tick()` on its next frame. Tests and hosts
/// without a frame loop call it directly.
///
/// [`SchedulerOptions`]: crate::reactivity::scheduling::SchedulerOptions
pub fn tick() {
    settle();
}

// =============================================================================
// TESTS
// =============================================================================
