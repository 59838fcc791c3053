// ============================================================================
// spark-observable - Dependency Tracking
// Record which nodes the running watcher reads
// ============================================================================
//
// Subscriptions are mutual: the node keeps the watcher's id in its watcher
// set and the watcher keeps the node in its read set. Both sides are always
// updated together so that clearing a watcher can unsubscribe it from every
// node it ever read.
// ============================================================================

use tracing::trace;

use crate::core::context::with_context;
use crate::core::types::WatcherId;
use crate::store::Node;

// =============================================================================
// TRACK READ
// =============================================================================

/// Subscribe the running watcher (if any) to `node`.
///
/// Called by every store read. Does nothing outside a watcher or inside
/// `untrack`.
pub fn track_read(node: &Node) {
    let subscribed = with_context(|ctx| {
        if ctx.is_untracking() {
            return None;
        }
        let id = ctx.current_watcher()?;
        let mut arena = ctx.watchers.borrow_mut();
        let record = arena.get_mut(id)?;
        if node.add_watcher(id) {
            record.nodes.push(node.clone());
            Some(id)
        } else {
            None
        }
    });

    if let Some(id) = subscribed {
        trace!(watcher = %id, node = %node.label(), "subscribe");
    }
}

/// Drop every subscription held by `id`.
///
/// Removes `id` from each node's watcher set and empties the watcher's read
/// set. Child watchers are left alone; see `watcher::reset_watcher`.
pub(crate) fn unsubscribe_all(id: WatcherId, nodes: Vec<Node>) {
    for node in nodes {
        node.remove_watcher(id);
    }
}

// =============================================================================
// TESTS
// =============================================================================
