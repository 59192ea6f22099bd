//! Reactive Context
//!
//! The reactive context tracks which computation is currently running.
//! This enables automatic dependency tracking: when a cell is read, the read
//! is recorded against the computation on top of the stack.
//!
//! # Implementation
//!
//! Each runtime owns one context stack. When entering a computation (a
//! computed evaluation or a reaction's render pass), we push a frame for it;
//! every tracked read appends to the frame on top. When the computation
//! completes, the frame is popped and its reads become the observer's new
//! dependency set.
//!
//! The stack is per runtime rather than thread-local, so two runtimes on one
//! thread never see each other's evaluations. A thread-local list of which
//! context owns the innermost frame exists only so that a read from one
//! runtime during another runtime's evaluation can be refused instead of
//! silently going untracked.
//!
//! This design supports nested contexts (e.g., a computed that reads from
//! another computed) and gives cycle detection for free: a computed that is
//! already on the stack is being evaluated.

use std::cell::RefCell;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexSet;
use smallvec::SmallVec;

use crate::error::{ReactiveError, Result};
use crate::graph::NodeId;

thread_local! {
    /// Frames of every context on this thread, innermost last, as
    /// `(context id, tracking)`. Only used to catch reads that cross runtimes.
    static THREAD_FRAMES: RefCell<SmallVec<[(u64, bool); 8]>> = RefCell::new(SmallVec::new());
}

/// An entry in the reactive context stack.
#[derive(Debug)]
struct Frame {
    /// The evaluating observer, or `None` for an untracked section.
    observer: Option<NodeId>,
    /// Nodes read during this evaluation, in first-read order.
    reads: IndexSet<NodeId>,
    /// Nodes invalidated by writes while this frame was on the stack.
    writes: SmallVec<[NodeId; 2]>,
}

/// What an evaluation touched, handed back when its frame is popped.
#[derive(Debug, Default)]
pub struct FrameLog {
    pub reads: IndexSet<NodeId>,
    pub writes: SmallVec<[NodeId; 2]>,
}

/// Stack of running evaluations for one runtime.
#[derive(Debug)]
pub struct ReactiveContext {
    id: u64,
    stack: RefCell<SmallVec<[Frame; 8]>>,
}

/// Guard that pops the frame when dropped.
///
/// This ensures the context stack is properly maintained even if
/// the computation panics.
#[must_use = "the frame is popped as soon as the guard is dropped"]
pub struct ContextGuard<'a> {
    context: &'a ReactiveContext,
    observer: Option<NodeId>,
    finished: bool,
}

impl ReactiveContext {
    pub fn new() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(0);
        Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            stack: RefCell::new(SmallVec::new()),
        }
    }

    /// Enter a new frame for the given observer.
    ///
    /// While the frame is on top, tracked reads are recorded against
    /// `observer`. Fails if `max_depth` frames are already active.
    pub fn enter(&self, observer: NodeId, max_depth: usize) -> Result<ContextGuard<'_>> {
        if self.depth() >= max_depth {
            return Err(ReactiveError::DepthExceeded { limit: max_depth });
        }
        Ok(self.push(Some(observer)))
    }

    /// Enter a frame in which reads are not recorded. Not subject to the
    /// depth limit.
    pub fn enter_untracked(&self) -> ContextGuard<'_> {
        self.push(None)
    }

    fn push(&self, observer: Option<NodeId>) -> ContextGuard<'_> {
        self.stack.borrow_mut().push(Frame {
            observer,
            reads: IndexSet::new(),
            writes: SmallVec::new(),
        });
        THREAD_FRAMES.with(|frames| frames.borrow_mut().push((self.id, observer.is_some())));

        ContextGuard {
            context: self,
            observer,
            finished: false,
        }
    }

    /// Check if there is an active tracking frame.
    pub fn is_active(&self) -> bool {
        self.current_observer().is_some()
    }

    /// The observer that reads are currently recorded against, if any.
    pub fn current_observer(&self) -> Option<NodeId> {
        self.stack.borrow().last().and_then(|frame| frame.observer)
    }

    pub fn depth(&self) -> usize {
        self.stack.borrow().len()
    }

    /// Whether the innermost frame on this thread is a tracking frame of
    /// some other context. A read from this context now could not be
    /// recorded against the observer that is running.
    pub fn is_foreign_evaluation(&self) -> bool {
        THREAD_FRAMES.with(|frames| {
            matches!(frames.borrow().last(), Some(&(id, true)) if id != self.id)
        })
    }

    /// Record a read of `node` in the top frame.
    ///
    /// Returns true if this is the first read of `node` in that frame.
    pub fn track_dependency(&self, node: NodeId) -> bool {
        let mut stack = self.stack.borrow_mut();
        match stack.last_mut() {
            Some(Frame {
                observer: Some(_),
                reads,
                ..
            }) => reads.insert(node),
            _ => false,
        }
    }

    /// Record that `node` was invalidated while evaluations are running.
    ///
    /// Every tracking frame on the stack keeps the record, since any of them
    /// may have read `node` before its edges exist in the graph.
    pub fn record_write(&self, node: NodeId) {
        let mut stack = self.stack.borrow_mut();
        for frame in stack.iter_mut().filter(|frame| frame.observer.is_some()) {
            if !frame.writes.contains(&node) {
                frame.writes.push(node);
            }
        }
    }

    /// Whether `node` is somewhere on the stack.
    pub fn is_evaluating(&self, node: NodeId) -> bool {
        self.stack
            .borrow()
            .iter()
            .any(|frame| frame.observer == Some(node))
    }

    /// The chain of evaluating observers starting at `node`, followed by
    /// `node` again. `None` if `node` is not evaluating.
    pub fn cycle_path(&self, node: NodeId) -> Option<Vec<NodeId>> {
        let stack = self.stack.borrow();
        let start = stack.iter().position(|frame| frame.observer == Some(node))?;

        let mut path: Vec<NodeId> = stack[start..]
            .iter()
            .filter_map(|frame| frame.observer)
            .collect();
        path.push(node);
        Some(path)
    }

    fn pop(&self, expected: Option<NodeId>) -> FrameLog {
        let popped = self.stack.borrow_mut().pop();
        THREAD_FRAMES.with(|frames| {
            frames.borrow_mut().pop();
        });

        match popped {
            Some(frame) => {
                debug_assert_eq!(
                    frame.observer, expected,
                    "ReactiveContext mismatch: expected {:?}, got {:?}",
                    expected, frame.observer
                );
                FrameLog {
                    reads: frame.reads,
                    writes: frame.writes,
                }
            }
            None => FrameLog::default(),
        }
    }
}

impl Default for ReactiveContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextGuard<'_> {
    /// Pop the frame and return what was read and invalidated while it was
    /// on the stack.
    pub fn finish(mut self) -> FrameLog {
        self.finished = true;
        self.context.pop(self.observer)
    }
}

impl Drop for ContextGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.context.pop(self.observer);
        }
    }
}
