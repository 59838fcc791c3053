// ============================================================================
// spark-observable - Observation Dump
// Human-readable snapshot of a document, its nodes and their watchers
// ============================================================================

use std::fmt::Write as _;

use crate::core::constants::{DUMP_INDENT, ROOT_LABEL};
use crate::core::types::WatcherId;
use crate::reactivity::watcher::watcher_snapshot;

use super::node::Node;

/// Render the document, the memoized node tree below `node` and every
/// watcher subscribed anywhere in that tree (grouped under their root
/// watcher).
///
/// ```text
/// JSON: {
///   "count": 1
/// }
///
/// NODES:
/// {json} (watchers: 0, notifyCount: 0)
///   [count] (watchers: 1, notifyCount: 1)
///
/// WATCHERS:
/// [{json}.count] (runCount: 2)
/// ```
pub fn debug_dump(node: &Node) -> String {
    let mut out = String::new();

    let document = node.root_node().map(|root| root.value()).unwrap_or_default();
    let pretty = serde_json::to_string_pretty(&document).unwrap_or_else(|_| document.to_string());
    let _ = writeln!(out, "JSON: {pretty}\n");

    let mut seen = Vec::new();
    out.push_str("NODES:\n");
    dump_node(node, 0, &mut out, &mut seen);
    out.push('\n');

    out.push_str("WATCHERS:\n");
    while let Some(&first) = seen.first() {
        let mut top = first;
        while let Some(parent) = watcher_snapshot(top).and_then(|s| s.parent) {
            top = parent;
        }
        dump_watcher(top, 0, &mut out, &mut seen);
        // a watcher that vanished mid-dump must not stall the loop
        seen.retain(|id| *id != first);
    }

    out
}

fn dump_node(node: &Node, depth: usize, out: &mut String, seen: &mut Vec<WatcherId>) {
    let name = match node.key() {
        None => ROOT_LABEL.to_string(),
        Some(key) => format!("[{key}]"),
    };
    let _ = writeln!(
        out,
        "{}{name} (watchers: {}, notifyCount: {})",
        DUMP_INDENT.repeat(depth),
        node.watcher_count(),
        node.notify_count()
    );
    for id in node.watcher_ids() {
        if !seen.contains(&id) {
            seen.push(id);
        }
    }
    for (_, child) in node.cached_children() {
        dump_node(&child, depth + 1, out, seen);
    }
}

fn dump_watcher(id: WatcherId, depth: usize, out: &mut String, seen: &mut Vec<WatcherId>) {
    seen.retain(|other| *other != id);
    let Some(snapshot) = watcher_snapshot(id) else {
        return;
    };
    let names: Vec<String> = snapshot.nodes.iter().map(Node::label).collect();
    let _ = writeln!(
        out,
        "{}[{}] (runCount: {})",
        DUMP_INDENT.repeat(depth),
        names.join(", "),
        snapshot.run_count
    );
    for child in snapshot.children {
        dump_watcher(child, depth + 1, out, seen);
    }
}

// =============================================================================
// TESTS
// =============================================================================
