// ============================================================================
// spark-observable - Watchers
// Reactive computations over store reads, kept in a generational arena
// ============================================================================
//
// A watcher pairs a reader with a consumer. Running it clears whatever it
// subscribed to last time, tears down the watchers it created last time,
// then pushes itself on the watcher stack and evaluates reader and consumer.
// Reads and nested `watch` calls made during that window belong to it.
//
// Records live in a thread-local arena addressed by `WatcherId`. A record's
// body is taken out while it runs so that user code never executes with
// the arena borrowed.
// ============================================================================

use std::fmt;

use tracing::trace;

use crate::core::constants::FIRST_RUN;
use crate::core::context::with_context;
use crate::core::types::{Json, WatcherId};
use crate::reactivity::scheduling::settle_if_immediate;
use crate::reactivity::tracking::unsubscribe_all;
use crate::store::node::ReadOnlyGuard;
use crate::store::{read, Node};

// =============================================================================
// READING VALUE
// =============================================================================

/// Where a watcher gets its value from.
///
/// - `Static`: a plain value. The consumer is called once and nothing is
///   subscribed.
/// - `Getter`: an arbitrary reader; every node it reads is subscribed.
/// - `Node`: a node read wholesale, held read-only while the watcher runs,
///   with a conversion into the consumer's type.
///
/// # Example
///
/// ```
/// use spark_observable::{Node, ReadingValue, read};
/// use serde_json::json;
///
/// let state = Node::root(json!({ "first": "Ada", "last": "Lovelace" }));
///
/// let from_node: ReadingValue<serde_json::Value> = (&state.child("first")).into();
/// let computed = ReadingValue::getter({
///     let state = state.clone();
///     move || format!("{} {}", read(&state.child("first")), read(&state.child("last")))
/// });
/// let fixed: ReadingValue<&str> = ReadingValue::value("hello");
/// # let _ = (from_node, computed, fixed);
/// ```
pub enum ReadingValue<T> {
    Static(T),
    Getter(Box<dyn FnMut() -> T>),
    Node(Node, fn(Json) -> T),
}

impl<T> ReadingValue<T> {
    /// A plain value.
    pub fn value(value: T) -> Self {
        ReadingValue::Static(value)
    }

    /// A reader function.
    pub fn getter(f: impl FnMut() -> T + 'static) -> Self {
        ReadingValue::Getter(Box::new(f))
    }

    /// A node whose value is converted with `convert`.
    pub fn node_as(node: &Node, convert: fn(Json) -> T) -> Self {
        ReadingValue::Node(node.clone(), convert)
    }

    /// The node this value reads from, if any.
    pub fn source_node(&self) -> Option<&Node> {
        match self {
            ReadingValue::Node(node, _) => Some(node),
            _ => None,
        }
    }
}

impl ReadingValue<Json> {
    /// A node read as raw JSON.
    pub fn node(node: &Node) -> Self {
        ReadingValue::Node(node.clone(), std::convert::identity)
    }
}

impl<T> fmt::Debug for ReadingValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadingValue::Static(_) => f.write_str("ReadingValue::Static"),
            ReadingValue::Getter(_) => f.write_str("ReadingValue::Getter"),
            ReadingValue::Node(node, _) => write!(f, "ReadingValue::Node({})", node.label()),
        }
    }
}

impl From<Node> for ReadingValue<Json> {
    fn from(node: Node) -> Self {
        ReadingValue::Node(node, std::convert::identity)
    }
}

impl From<&Node> for ReadingValue<Json> {
    fn from(node: &Node) -> Self {
        ReadingValue::node(node)
    }
}

impl From<Json> for ReadingValue<Json> {
    fn from(value: Json) -> Self {
        ReadingValue::Static(value)
    }
}

impl From<&str> for ReadingValue<Json> {
    fn from(value: &str) -> Self {
        ReadingValue::Static(Json::String(value.to_string()))
    }
}

impl From<String> for ReadingValue<Json> {
    fn from(value: String) -> Self {
        ReadingValue::Static(Json::String(value))
    }
}

impl From<bool> for ReadingValue<Json> {
    fn from(value: bool) -> Self {
        ReadingValue::Static(Json::Bool(value))
    }
}

// =============================================================================
// WATCHER BODY
// =============================================================================

/// Type-erased reader + consumer pair.
pub(crate) trait WatcherBody {
    fn run(&mut self, run_count: u32);
}

struct Body<T> {
    reader: Box<dyn FnMut() -> T>,
    consumer: Box<dyn FnMut(T, u32)>,
}

impl<T> WatcherBody for Body<T> {
    fn run(&mut self, run_count: u32) {
        let value = (self.reader)();
        (self.consumer)(value, run_count);
    }
}

// =============================================================================
// ARENA
// =============================================================================

pub(crate) struct WatcherRecord {
    pub(crate) parent: Option<WatcherId>,
    pub(crate) children: Vec<WatcherId>,
    pub(crate) nodes: Vec<Node>,
    pub(crate) run_count: u32,
    pub(crate) last_run_generation: u64,
    source_node: Option<Node>,
    body: Option<Box<dyn WatcherBody>>,
}

struct ArenaSlot {
    generation: u32,
    record: Option<WatcherRecord>,
}

/// Generational storage for watcher records.
#[derive(Default)]
pub struct WatcherArena {
    slots: Vec<ArenaSlot>,
    free: Vec<u32>,
    live: usize,
}

impl WatcherArena {
    pub(crate) fn insert(&mut self, record: WatcherRecord) -> WatcherId {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.record = Some(record);
            return WatcherId {
                index,
                generation: slot.generation,
            };
        }
        let index = self.slots.len() as u32;
        self.slots.push(ArenaSlot {
            generation: 0,
            record: Some(record),
        });
        WatcherId { index, generation: 0 }
    }

    pub(crate) fn get(&self, id: WatcherId) -> Option<&WatcherRecord> {
        let slot = self.slots.get(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.record.as_ref()
    }

    pub(crate) fn get_mut(&mut self, id: WatcherId) -> Option<&mut WatcherRecord> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.record.as_mut()
    }

    /// Release the slot. The returned record must be dropped after the arena
    /// borrow ends, since dropping a body runs user destructors.
    pub(crate) fn remove(&mut self, id: WatcherId) -> Option<WatcherRecord> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        let record = slot.record.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.live -= 1;
        Some(record)
    }

    pub(crate) fn contains(&self, id: WatcherId) -> bool {
        self.get(id).is_some()
    }

    pub(crate) fn parent_of(&self, id: WatcherId) -> Option<WatcherId> {
        self.get(id).and_then(|record| record.parent)
    }

    /// Number of live watchers.
    pub fn len(&self) -> usize {
        self.live
    }

    /// Whether no watcher is live.
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }
}

// =============================================================================
// WATCHER HANDLE
// =============================================================================

/// Handle to a watcher created by [`watch`].
///
/// Dropping the handle does not stop the watcher; call [`Watcher::clear`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Watcher {
    id: Option<WatcherId>,
}

impl Watcher {
    fn inert() -> Self {
        Self { id: None }
    }

    /// The arena id, or `None` for a static source.
    pub fn id(&self) -> Option<WatcherId> {
        self.id
    }

    /// Whether the watcher is still in the arena and can fire again.
    pub fn is_active(&self) -> bool {
        self.id
            .is_some_and(|id| with_context(|ctx| ctx.watchers.borrow().contains(id)))
    }

    /// How many times the watcher has run (0 once it is gone).
    pub fn run_count(&self) -> u32 {
        self.snapshot().map_or(0, |s| s.run_count)
    }

    /// Nodes the watcher is currently subscribed to.
    pub fn read_set(&self) -> Vec<Node> {
        self.snapshot().map(|s| s.nodes).unwrap_or_default()
    }

    /// Ids of the watchers created during the last run.
    pub fn children(&self) -> Vec<WatcherId> {
        self.snapshot().map(|s| s.children).unwrap_or_default()
    }

    fn snapshot(&self) -> Option<WatcherSnapshot> {
        watcher_snapshot(self.id?)
    }

    /// Unsubscribe, tear down every child watcher and release the slot.
    pub fn clear(&self) {
        if let Some(id) = self.id {
            clear_watcher(id);
        }
    }
}

// =============================================================================
// WATCH
// =============================================================================

/// Create a watcher over `source` and run it immediately.
///
/// `consumer` receives the value and the run count (1 on the first run).
/// A watcher created while another one runs becomes its child and is torn
/// down the next time the parent runs.
///
/// # Example
///
/// ```
/// use spark_observable::{Node, flush_now, watch, write};
/// use serde_json::json;
/// use std::cell::RefCell;
/// use std::rc::Rc;
///
/// let state = Node::root(json!({ "count": 0 }));
/// let seen = Rc::new(RefCell::new(Vec::new()));
///
/// let seen_clone = seen.clone();
/// let _watcher = watch(&state.child("count"), move |value, run| {
///     seen_clone.borrow_mut().push((value, run));
/// });
///
/// write(&state.child("count"), 1);
/// write(&state.child("count"), 2);
/// flush_now();
///
/// assert_eq!(*seen.borrow(), vec![(json!(0), 1), (json!(2), 2)]);
/// ```
pub fn watch<T: 'static>(
    source: impl Into<ReadingValue<T>>,
    mut consumer: impl FnMut(T, u32) + 'static,
) -> Watcher {
    let (reader, source_node): (Box<dyn FnMut() -> T>, Option<Node>) = match source.into() {
        ReadingValue::Static(value) => {
            consumer(value, FIRST_RUN);
            return Watcher::inert();
        }
        ReadingValue::Getter(reader) => (reader, None),
        ReadingValue::Node(node, convert) => {
            let target = node.clone();
            (Box::new(move || convert(read(&target))), Some(node))
        }
    };

    let body: Box<dyn WatcherBody> = Box::new(Body {
        reader,
        consumer: Box::new(consumer),
    });
    let id = spawn(body, source_node);
    run_watcher(id);
    settle_if_immediate();
    Watcher { id: Some(id) }
}

fn spawn(body: Box<dyn WatcherBody>, source_node: Option<Node>) -> WatcherId {
    with_context(|ctx| {
        let parent = ctx.current_watcher();
        let mut arena = ctx.watchers.borrow_mut();
        let id = arena.insert(WatcherRecord {
            parent,
            children: Vec::new(),
            nodes: Vec::new(),
            run_count: 0,
            last_run_generation: ctx.get_generation(),
            source_node,
            body: Some(body),
        });
        if let Some(parent) = parent.and_then(|p| arena.get_mut(p)) {
            parent.children.push(id);
        }
        trace!(watcher = %id, parent = ?parent, "spawn");
        id
    })
}

// =============================================================================
// RUN
// =============================================================================

struct StackFrame {
    prev_untracking: bool,
}

impl StackFrame {
    fn push(id: WatcherId) -> Self {
        let prev_untracking = with_context(|ctx| {
            ctx.push_watcher(id);
            ctx.set_untracking(false)
        });
        Self { prev_untracking }
    }
}

impl Drop for StackFrame {
    fn drop(&mut self) {
        with_context(|ctx| {
            ctx.pop_watcher();
            ctx.set_untracking(self.prev_untracking);
        });
    }
}

/// Run a watcher in place: bookkeeping, reset, then reader and consumer.
pub(crate) fn run_watcher(id: WatcherId) {
    let prepared = with_context(|ctx| {
        let generation = ctx.get_generation();
        let mut arena = ctx.watchers.borrow_mut();
        let record = arena.get_mut(id)?;
        // a body that is out is already running further up the stack
        let body = record.body.take()?;
        record.run_count += 1;
        record.last_run_generation = generation;
        Some((body, record.source_node.clone(), record.run_count))
    });
    let Some((mut body, source_node, run_count)) = prepared else {
        return;
    };

    drop(reset_watcher(id));
    trace!(watcher = %id, run_count, "run");

    {
        let _lock = source_node.as_ref().map(ReadOnlyGuard::new);
        let _frame = StackFrame::push(id);
        body.run(run_count);
    }

    let orphaned = with_context(|ctx| match ctx.watchers.borrow_mut().get_mut(id) {
        Some(record) => {
            record.body = Some(body);
            None
        }
        None => Some(body),
    });
    drop(orphaned);

    release_if_idle(id);
}

/// Drop subscriptions and detach the whole child subtree.
///
/// Returns the detached records so the caller can drop them outside the
/// arena borrow.
fn reset_watcher(id: WatcherId) -> Vec<WatcherRecord> {
    with_context(|ctx| {
        let mut arena = ctx.watchers.borrow_mut();
        let mut detached = Vec::new();
        let mut pending = Vec::new();

        if let Some(record) = arena.get_mut(id) {
            unsubscribe_all(id, std::mem::take(&mut record.nodes));
            pending.append(&mut record.children);
        }

        while let Some(child) = pending.pop() {
            if let Some(mut record) = arena.remove(child) {
                unsubscribe_all(child, std::mem::take(&mut record.nodes));
                pending.append(&mut record.children);
                detached.push(record);
            }
        }

        if !detached.is_empty() {
            trace!(watcher = %id, count = detached.len(), "detach children");
        }
        detached
    })
}

/// Fully clear a watcher: reset it, unlink it from its parent and release
/// its slot.
pub(crate) fn clear_watcher(id: WatcherId) {
    let detached = reset_watcher(id);
    let removed = with_context(|ctx| {
        let mut arena = ctx.watchers.borrow_mut();
        let record = arena.remove(id)?;
        if let Some(parent) = record.parent.and_then(|p| arena.get_mut(p)) {
            parent.children.retain(|child| *child != id);
        }
        Some(record)
    });
    drop(detached);
    drop(removed);
}

/// A root watcher with nothing to watch and no children can never fire
/// again; free its slot.
fn release_if_idle(id: WatcherId) {
    let removed = with_context(|ctx| {
        let mut arena = ctx.watchers.borrow_mut();
        let idle = arena
            .get(id)
            .is_some_and(|r| r.parent.is_none() && r.nodes.is_empty() && r.children.is_empty());
        if idle { arena.remove(id) } else { None }
    });
    if removed.is_some() {
        trace!(watcher = %id, "release idle watcher");
    }
    drop(removed);
}

// =============================================================================
// INTROSPECTION
// =============================================================================

/// Copy of a watcher's bookkeeping, for diagnostics.
#[derive(Clone, Debug)]
pub struct WatcherSnapshot {
    pub parent: Option<WatcherId>,
    pub children: Vec<WatcherId>,
    pub nodes: Vec<Node>,
    pub run_count: u32,
    pub last_run_generation: u64,
}

/// Snapshot a live watcher.
pub fn watcher_snapshot(id: WatcherId) -> Option<WatcherSnapshot> {
    with_context(|ctx| {
        ctx.watchers.borrow().get(id).map(|record| WatcherSnapshot {
            parent: record.parent,
            children: record.children.clone(),
            nodes: record.nodes.clone(),
            run_count: record.run_count,
            last_run_generation: record.last_run_generation,
        })
    })
}

// =============================================================================
// TESTS
// =============================================================================
