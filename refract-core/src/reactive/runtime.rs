//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects cells, computed
//! values and reactions. It owns the dependency graph and the evaluation
//! context, and delivers invalidation callbacks.
//!
//! # How It Works
//!
//! 1. Every cell, computed and reaction registers a node with the runtime
//!    that created it.
//!
//! 2. When a computed or reaction evaluates, the runtime pushes a frame for
//!    it; reads land in that frame and replace the observer's edges when the
//!    evaluation finishes.
//!
//! 3. When a cell's value changes, the runtime:
//!    a. Marks every node downstream of it dirty
//!    b. Collects the reactions that just became dirty
//!    c. Calls their callbacks, or queues them while a batch is open
//!    d. Leaves computed values alone; they recompute on next read
//!
//! # Threading
//!
//! A runtime is single-threaded: handles are reference counted with `Rc` and
//! are neither `Send` nor `Sync`. Separate runtimes share no state, so any
//! number of them can coexist on one thread.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexSet;
use smallvec::SmallVec;
use tracing::{debug, trace, warn};

use super::cell::Cell;
use super::computed::Computed;
use super::context::ReactiveContext;
use super::equality::{self, EqualityFn};
use super::reaction::Reaction;
use crate::config::RuntimeConfig;
use crate::error::{ConfigError, ReactiveError, Result};
use crate::graph::{DependencyGraph, GraphSnapshot, Node, NodeId, NodeKind};

/// Handle to a reactive runtime.
///
/// Cloning the handle is cheap and every clone refers to the same graph.
///
/// # Example
///
/// ```rust
/// use refract_core::Runtime;
///
/// let rt = Runtime::new();
/// let count = rt.create_cell(1);
///
/// let doubled = rt.create_computed({
///     let count = count.clone();
///     move || Ok(count.read() * 2)
/// });
///
/// assert_eq!(doubled.read().unwrap(), 2);
/// count.write(5);
/// assert_eq!(doubled.read().unwrap(), 10);
/// ```
#[derive(Clone)]
pub struct Runtime {
    inner: Rc<RuntimeInner>,
}

struct RuntimeInner {
    config: RuntimeConfig,
    graph: RefCell<DependencyGraph>,
    context: ReactiveContext,
    reactions: RefCell<HashMap<NodeId, ReactionEntry>>,
    batch: RefCell<BatchState>,
}

struct ReactionEntry {
    callback: Rc<dyn Fn()>,
    /// Re-armed right after each callback instead of on the next `track`.
    persistent: bool,
}

#[derive(Default)]
struct BatchState {
    depth: usize,
    pending: IndexSet<NodeId>,
}

impl Runtime {
    /// Create a runtime with the default configuration.
    pub fn new() -> Self {
        Self::build(RuntimeConfig::default())
    }

    /// Create a runtime with a validated configuration.
    pub fn with_config(config: RuntimeConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: RuntimeConfig) -> Self {
        Self {
            inner: Rc::new(RuntimeInner {
                config,
                graph: RefCell::new(DependencyGraph::new()),
                context: ReactiveContext::new(),
                reactions: RefCell::new(HashMap::new()),
                batch: RefCell::new(BatchState::default()),
            }),
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    /// Create a cell whose writes are compared with `PartialEq`.
    pub fn create_cell<T>(&self, initial: T) -> Cell<T>
    where
        T: PartialEq + 'static,
    {
        Cell::new(self.clone(), initial, equality::equals::<T>)
    }

    /// Create a cell with a custom equality policy.
    pub fn create_cell_with<T>(&self, initial: T, equals: EqualityFn<T>) -> Cell<T>
    where
        T: 'static,
    {
        Cell::new(self.clone(), initial, equals)
    }

    /// Create a computed value. `compute` does not run until the first read.
    pub fn create_computed<T, F>(&self, compute: F) -> Computed<T>
    where
        T: Clone + 'static,
        F: Fn() -> Result<T> + 'static,
    {
        Computed::new(self.clone(), compute)
    }

    /// Create an observer that is called back when anything it read during
    /// its last [`Reaction::track`] is invalidated.
    pub fn on_invalidate<F>(&self, callback: F) -> Reaction
    where
        F: Fn() + 'static,
    {
        Reaction::new(self.clone(), Rc::new(callback), false)
    }

    /// Run `f`, delivering reaction callbacks only once the outermost batch
    /// returns. Each invalidated reaction is called once.
    pub fn batch<R>(&self, f: impl FnOnce() -> R) -> R {
        self.inner.batch.borrow_mut().depth += 1;

        struct BatchGuard<'a>(&'a Runtime);

        impl Drop for BatchGuard<'_> {
            fn drop(&mut self) {
                let pending = {
                    let mut batch = self.0.inner.batch.borrow_mut();
                    batch.depth -= 1;
                    if batch.depth > 0 {
                        return;
                    }
                    std::mem::take(&mut batch.pending)
                };

                if std::thread::panicking() {
                    warn!(pending = pending.len(), "batch unwound; dropping queued notifications");
                    return;
                }
                if !pending.is_empty() {
                    debug!(reactions = pending.len(), "flushing batch");
                    self.0.notify(pending.into_iter());
                }
            }
        }

        let _guard = BatchGuard(self);
        f()
    }

    pub fn is_batching(&self) -> bool {
        self.inner.batch.borrow().depth > 0
    }

    /// Run `f` without recording any reads against the current observer.
    pub fn untracked<R>(&self, f: impl FnOnce() -> R) -> R {
        let _guard = self.inner.context.enter_untracked();
        f()
    }

    /// Whether reads are currently recorded against an observer.
    pub fn is_tracking(&self) -> bool {
        self.inner.context.is_active()
    }

    /// A serialisable copy of the current graph.
    pub fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot::capture(&self.inner.graph.borrow())
    }

    /// Number of live cells, computed values and reactions.
    pub fn node_count(&self) -> usize {
        self.inner.graph.borrow().node_count()
    }

    /// Whether two handles refer to the same runtime.
    pub fn same(&self, other: &Runtime) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    // ------------------------------------------------------------------------
    // Node bookkeeping, used by the primitives
    // ------------------------------------------------------------------------

    pub(crate) fn register(&self, node: Node) -> NodeId {
        self.inner.graph.borrow_mut().add_node(node)
    }

    /// Remove a node and every edge touching it.
    pub(crate) fn release(&self, id: NodeId) {
        match self.inner.graph.try_borrow_mut() {
            Ok(mut graph) => {
                graph.remove_node(id);
                trace!(node = %id, "node released");
            }
            Err(_) => warn!(node = %id, "graph busy while releasing node; node leaked"),
        }
    }

    pub(crate) fn register_reaction(&self, id: NodeId, callback: Rc<dyn Fn()>, persistent: bool) {
        self.inner
            .reactions
            .borrow_mut()
            .insert(id, ReactionEntry { callback, persistent });
    }

    pub(crate) fn release_reaction(&self, id: NodeId) {
        let entry = self.inner.reactions.borrow_mut().remove(&id);
        self.inner.batch.borrow_mut().pending.shift_remove(&id);
        self.release(id);
        // The callback may own cells; drop it only after every borrow is gone.
        drop(entry);
    }

    pub(crate) fn add_edge(&self, dependency: NodeId, dependent: NodeId) {
        self.inner.graph.borrow_mut().add_edge(dependency, dependent);
    }

    pub(crate) fn set_label(&self, id: NodeId, label: String) {
        if let Some(node) = self.inner.graph.borrow_mut().get_node_mut(id) {
            node.set_label(label);
        }
    }

    pub(crate) fn label(&self, id: NodeId) -> Option<String> {
        self.inner
            .graph
            .borrow()
            .get_node(id)
            .and_then(|node| node.label().map(str::to_owned))
    }

    pub(crate) fn is_clean(&self, id: NodeId) -> bool {
        self.inner
            .graph
            .borrow()
            .get_node(id)
            .map(Node::is_clean)
            .unwrap_or(false)
    }

    pub(crate) fn mark_clean(&self, id: NodeId) {
        if let Some(node) = self.inner.graph.borrow_mut().get_node_mut(id) {
            node.mark_clean();
        }
    }

    pub(crate) fn dependency_count(&self, id: NodeId) -> usize {
        self.inner
            .graph
            .borrow()
            .get_node(id)
            .map(|node| node.dependencies().len())
            .unwrap_or(0)
    }

    pub(crate) fn dependent_count(&self, id: NodeId) -> usize {
        self.inner
            .graph
            .borrow()
            .get_node(id)
            .map(|node| node.dependents().len())
            .unwrap_or(0)
    }

    // ------------------------------------------------------------------------
    // Tracking and evaluation
    // ------------------------------------------------------------------------

    /// Record a read of `id` against the current observer, if any.
    ///
    /// # Panics
    ///
    /// If another runtime is evaluating on this thread. The read could not
    /// be recorded, and the observer would cache a value that never
    /// refreshes. Use `read_untracked` for deliberate one-off reads.
    pub(crate) fn track_read(&self, id: NodeId) {
        if self.inner.context.is_foreign_evaluation() {
            panic!(
                "node {id} read while another runtime is evaluating; \
                 dependencies cannot be tracked across runtimes"
            );
        }
        if self.inner.context.track_dependency(id) {
            trace!(node = %id, observer = ?self.inner.context.current_observer(), "tracked read");
        }
    }

    /// The cycle error for reading `id` now, if `id` is already evaluating.
    pub(crate) fn cycle_error(&self, id: NodeId) -> Option<ReactiveError> {
        let path = self.inner.context.cycle_path(id)?;
        let graph = self.inner.graph.borrow();
        let path: Vec<String> = path
            .iter()
            .map(|id| {
                graph
                    .get_node(*id)
                    .map(Node::display_name)
                    .unwrap_or_else(|| id.to_string())
            })
            .collect();

        debug!(node = %id, path = ?path, "cyclic dependency detected");
        Some(ReactiveError::CyclicDependency { path })
    }

    /// Run `f` as an evaluation of `observer` and make the nodes it read the
    /// observer's new dependencies.
    ///
    /// Also returns the nodes invalidated while `f` ran; pass them to
    /// [`Runtime::settle`] once the observer's outcome is stored.
    pub(crate) fn evaluate<R>(
        &self,
        observer: NodeId,
        f: impl FnOnce() -> R,
    ) -> Result<(R, SmallVec<[NodeId; 2]>)> {
        let guard = self
            .inner
            .context
            .enter(observer, self.inner.config.max_depth)?;
        let output = f();
        let log = guard.finish();

        let diff = self
            .inner
            .graph
            .borrow_mut()
            .replace_dependencies(observer, &log.reads);
        if !diff.added.is_empty() || !diff.removed.is_empty() {
            trace!(
                node = %observer,
                added = diff.added.len(),
                removed = diff.removed.len(),
                "dependencies changed"
            );
        }

        Ok((output, log.writes))
    }

    /// Mark `observer` clean after a successful evaluation.
    ///
    /// Writes made during the evaluation could not reach the observer, since
    /// its edges were only installed afterwards. Any of them that the
    /// observer now depends on are replayed, leaving it dirty again.
    pub(crate) fn settle(&self, observer: NodeId, writes: &[NodeId]) {
        self.mark_clean(observer);

        let stale: SmallVec<[NodeId; 2]> = {
            let graph = self.inner.graph.borrow();
            writes
                .iter()
                .copied()
                .filter(|written| graph.depends_on(observer, *written))
                .collect()
        };
        for written in stale {
            debug!(node = %observer, cell = %written, "read a value it then overwrote; replaying");
            self.invalidate(written);
        }
    }

    /// Guard against cells being written from inside a computation.
    pub(crate) fn check_write(&self, target: NodeId) {
        let Some(observer) = self.inner.context.current_observer() else {
            return;
        };
        let inside_computed = self
            .inner
            .graph
            .borrow()
            .get_node(observer)
            .map(|node| node.kind() == NodeKind::Computed)
            .unwrap_or(false);
        if !inside_computed {
            return;
        }

        if self.inner.config.strict_writes {
            panic!(
                "cell {target} written while computing {observer}; \
                 computed values must not write cells"
            );
        }
        warn!(cell = %target, computed = %observer, "cell written inside a computation");
    }

    /// Invalidate everything downstream of `source` and notify reactions.
    pub(crate) fn invalidate(&self, source: NodeId) {
        self.inner.context.record_write(source);

        let (dirtied, reactions) = {
            let mut graph = self.inner.graph.borrow_mut();
            let dirtied = graph.mark_changed(source);
            let reactions: SmallVec<[NodeId; 4]> = dirtied
                .iter()
                .copied()
                .filter(|id| {
                    graph
                        .get_node(*id)
                        .map(|node| node.kind() == NodeKind::Reaction)
                        .unwrap_or(false)
                })
                .collect();
            (dirtied.len(), reactions)
        };

        debug!(source = %source, dirtied, reactions = reactions.len(), "invalidated");

        if reactions.is_empty() {
            return;
        }

        {
            let mut batch = self.inner.batch.borrow_mut();
            if batch.depth > 0 {
                batch.pending.extend(reactions);
                return;
            }
        }

        self.notify(reactions.into_iter());
    }

    /// Call the callback of each reaction. No internal borrow is held while a
    /// callback runs.
    fn notify(&self, reactions: impl Iterator<Item = NodeId>) {
        for id in reactions {
            let entry = self
                .inner
                .reactions
                .borrow()
                .get(&id)
                .map(|entry| (Rc::clone(&entry.callback), entry.persistent));

            // Unsubscribed by an earlier callback.
            let Some((callback, persistent)) = entry else {
                continue;
            };
            // Re-tracked since it was queued.
            if !persistent && self.is_clean(id) {
                trace!(reaction = %id, "skipping clean reaction");
                continue;
            }

            if persistent {
                self.mark_clean(id);
            }
            trace!(reaction = %id, "notifying");
            callback();
        }
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("config", &self.inner.config)
            .field("node_count", &self.node_count())
            .field("depth", &self.inner.context.depth())
            .field("batching", &self.is_batching())
            .finish()
    }
}
