// ============================================================================
// spark-observable - Notification Scheduling
// Batch dirtied nodes and deliver them to watchers at a tick boundary
// ============================================================================
//
// Writes never run watchers directly. A dirtying write queues its node (once
// per batch) and requests a flush. The host decides when the flush happens:
// it calls `flush_now()` from its frame callback, or configures
// `FlushMode::Immediate` to settle right after each write.
//
// Key functions:
// - notify: queue a node and request a flush
// - flush_now: deliver one batch
// - settle: flush until nothing is pending, with loop detection
// ============================================================================

use std::collections::BTreeSet;
use std::fmt;
use std::rc::Rc;

use tracing::{debug, trace, trace_span, warn};

use crate::core::constants::DEFAULT_MAX_SETTLE_PASSES;
use crate::core::context::with_context;
use crate::core::types::WatcherId;
use crate::reactivity::watcher::run_watcher;
use crate::store::node::ReadOnlyGuard;
use crate::store::Node;

// =============================================================================
// OPTIONS
// =============================================================================

/// When pending notifications are delivered.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FlushMode {
    /// Wait for the host to call `flush_now()` (or `settle()`).
    #[default]
    Deferred,
    /// Settle as soon as a write happens outside a watcher, a flush or a
    /// batch.
    Immediate,
}

/// Per-thread scheduler configuration.
///
/// # Example
///
/// ```
/// use spark_observable::{configure, FlushMode, SchedulerOptions};
///
/// configure(SchedulerOptions {
///     mode: FlushMode::Immediate,
///     ..Default::default()
/// });
/// # configure(SchedulerOptions::default());
/// ```
#[derive(Clone)]
pub struct SchedulerOptions {
    pub mode: FlushMode,
    /// Passes `settle()` allows before giving up.
    pub max_settle_passes: u32,
    /// Called once each time a flush becomes due in deferred mode.
    pub on_schedule: Option<Rc<dyn Fn()>>,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            mode: FlushMode::Deferred,
            max_settle_passes: DEFAULT_MAX_SETTLE_PASSES,
            on_schedule: None,
        }
    }
}

impl fmt::Debug for SchedulerOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchedulerOptions")
            .field("mode", &self.mode)
            .field("max_settle_passes", &self.max_settle_passes)
            .field("on_schedule", &self.on_schedule.is_some())
            .finish()
    }
}

/// Replace this thread's scheduler options, returning the previous ones.
pub fn configure(options: SchedulerOptions) -> SchedulerOptions {
    with_context(|ctx| ctx.options.replace(options))
}

// =============================================================================
// NOTIFY
// =============================================================================

/// Queue `node` for the next flush.
///
/// Nodes nobody watches are ignored. The first queued node of a batch
/// requests a flush through the `on_schedule` hook.
pub fn notify(node: &Node) {
    if !node.has_watchers() {
        return;
    }

    let hook = with_context(|ctx| {
        if node.mark_queued() {
            ctx.push_pending(node.clone());
            trace!(node = %node.label(), "queue");
        }
        if ctx.set_flush_scheduled(true) {
            return None;
        }
        match ctx.flush_mode() {
            FlushMode::Deferred => ctx.options.borrow().on_schedule.clone(),
            FlushMode::Immediate => None,
        }
    });

    if let Some(hook) = hook {
        hook();
    }
    settle_if_immediate();
}

/// In immediate mode, settle unless something is already in progress.
pub(crate) fn settle_if_immediate() {
    let due = with_context(|ctx| {
        ctx.flush_mode() == FlushMode::Immediate
            && ctx.has_pending()
            && !ctx.is_flushing()
            && !ctx.is_batching()
            && !ctx.is_running_watcher()
    });
    if due {
        settle();
    }
}

/// Whether a flush is due.
pub fn has_pending() -> bool {
    with_context(|ctx| ctx.has_pending())
}

// =============================================================================
// FLUSH
// =============================================================================

struct FlushingGuard;

impl Drop for FlushingGuard {
    fn drop(&mut self) {
        with_context(|ctx| ctx.set_flushing(false));
    }
}

/// Deliver the pending batch. Returns whether anything was flushed.
///
/// Every dirtied node is held read-only while its watchers run. Among that
/// node's watchers, ancestors run before descendants, and a watcher runs at
/// most once per flush. Writes made by watchers are queued for the next
/// flush. Calling `flush_now()` from inside a flush does nothing.
pub fn flush_now() -> bool {
    let started = with_context(|ctx| {
        if ctx.is_flushing() {
            return None;
        }
        ctx.set_flush_scheduled(false);
        let batch = ctx.take_pending();
        if batch.is_empty() {
            return None;
        }
        ctx.set_flushing(true);
        Some((batch, ctx.increment_generation()))
    });
    let Some((batch, generation)) = started else {
        return false;
    };

    let _guard = FlushingGuard;
    let _span = trace_span!("flush", generation).entered();
    debug!(generation, nodes = batch.len(), "flush start");

    for node in &batch {
        node.clear_queued();
    }

    let mut ran = 0usize;
    for node in &batch {
        ran += deliver(node, generation);
    }

    debug!(generation, watchers_run = ran, "flush end");
    true
}

fn deliver(node: &Node, generation: u64) -> usize {
    let _lock = ReadOnlyGuard::new(node);
    let mut working: BTreeSet<WatcherId> = node.watcher_ids();
    let mut ran = 0;

    while let Some(&picked) = working.iter().next() {
        let chosen = highest_pending_ancestor(picked, &working);
        working.remove(&chosen);

        let due = with_context(|ctx| {
            ctx.watchers
                .borrow()
                .get(chosen)
                .is_some_and(|record| record.last_run_generation < generation)
        });
        if due && node.has_watcher(chosen) {
            node.bump_notify_count();
            run_watcher(chosen);
            ran += 1;
        }
    }
    ran
}

/// The most distant ancestor of `id` that is still waiting in `working`.
fn highest_pending_ancestor(id: WatcherId, working: &BTreeSet<WatcherId>) -> WatcherId {
    with_context(|ctx| {
        let arena = ctx.watchers.borrow();
        let mut chosen = id;
        let mut current = id;
        while let Some(parent) = arena.parent_of(current) {
            if working.contains(&parent) {
                chosen = parent;
            }
            current = parent;
        }
        chosen
    })
}

/// Flush until nothing is pending.
///
/// # Panics
///
/// Panics with "Maximum update depth exceeded" when watchers keep dirtying
/// nodes for more than `max_settle_passes` consecutive flushes.
pub fn settle() {
    let max = with_context(|ctx| ctx.options.borrow().max_settle_passes);
    let mut passes = 0u32;

    while has_pending() {
        if passes >= max {
            // Drop the stuck batch so the context stays usable after the panic
            let stuck = with_context(|ctx| {
                ctx.set_flush_scheduled(false);
                ctx.take_pending()
            });
            for node in &stuck {
                node.clear_queued();
            }
            panic!(
                "Maximum update depth exceeded. This can happen when a watcher \
                 writes to a node it depends on."
            );
        }
        if passes == max / 2 && passes > 0 {
            warn!(passes, "settle is taking many passes");
        }
        if !flush_now() {
            break;
        }
        passes += 1;
    }
}

// =============================================================================
// TESTS
// =============================================================================
