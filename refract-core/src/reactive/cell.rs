//! Cell Implementation
//!
//! A Cell is the fundamental reactive primitive. It holds a value and
//! tracks which computations depend on it.
//!
//! # How Cells Work
//!
//! 1. When a cell is read within an evaluation (computed or reaction), the
//!    read is recorded and the evaluating observer becomes a subscriber.
//!
//! 2. When a cell is written with a value its equality policy considers
//!    different, every transitive subscriber is marked dirty before `write`
//!    returns.
//!
//! 3. Computed values recompute on their next read; reactions are called
//!    back.
//!
//! # Equality
//!
//! Writes of an equal value are dropped without touching the graph. Values
//! changed in place through [`Cell::mutate`] always notify, since the old
//! value is no longer available to compare against.

use std::cell::RefCell;
use std::fmt::{self, Debug};
use std::rc::Rc;

use tracing::trace;

use super::equality::EqualityFn;
use super::reaction::Reaction;
use super::runtime::Runtime;
use crate::graph::{Node, NodeId};

/// A reactive cell holding a value of type T.
///
/// Cloning a cell yields another handle to the same value.
///
/// # Example
///
/// ```rust
/// use refract_core::Runtime;
///
/// let rt = Runtime::new();
/// let message = rt.create_cell(String::from("Hello World!"));
///
/// message.update(|m| m.chars().rev().collect());
/// assert_eq!(message.read(), "!dlroW olleH");
/// ```
pub struct Cell<T: 'static> {
    inner: Rc<CellInner<T>>,
}

struct CellInner<T> {
    id: NodeId,
    runtime: Runtime,
    value: RefCell<T>,
    equals: EqualityFn<T>,
}

impl<T: 'static> Cell<T> {
    pub(crate) fn new(runtime: Runtime, value: T, equals: EqualityFn<T>) -> Self {
        let id = runtime.register(Node::cell());
        Self {
            inner: Rc::new(CellInner {
                id,
                runtime,
                value: RefCell::new(value),
                equals,
            }),
        }
    }

    pub fn id(&self) -> NodeId {
        self.inner.id
    }

    /// Attach a label used in logs, snapshots and cycle errors.
    pub fn named(self, label: impl Into<String>) -> Self {
        self.inner.runtime.set_label(self.inner.id, label.into());
        self
    }

    pub fn label(&self) -> Option<String> {
        self.inner.runtime.label(self.inner.id)
    }

    pub fn runtime(&self) -> &Runtime {
        &self.inner.runtime
    }

    /// Get a clone of the current value, recording the read.
    pub fn read(&self) -> T
    where
        T: Clone,
    {
        self.inner.runtime.track_read(self.inner.id);
        self.inner.value.borrow().clone()
    }

    /// Get the current value without establishing a dependency.
    pub fn read_untracked(&self) -> T
    where
        T: Clone,
    {
        self.inner.value.borrow().clone()
    }

    /// Borrow the current value, recording the read.
    ///
    /// The cell must not be written from inside `f`.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.inner.runtime.track_read(self.inner.id);
        f(&*self.inner.value.borrow())
    }

    /// Set a new value.
    ///
    /// If the value differs from the current one, every transitive
    /// subscriber is dirty when this returns. Otherwise nothing happens.
    pub fn write(&self, value: T) {
        let runtime = &self.inner.runtime;
        runtime.check_write(self.inner.id);

        let unchanged = {
            let current = self.inner.value.borrow();
            (self.inner.equals)(&*current, &value)
        };
        if unchanged {
            trace!(cell = %self.inner.id, "write suppressed: value unchanged");
            return;
        }

        let previous = self.inner.value.replace(value);
        runtime.invalidate(self.inner.id);
        drop(previous);
    }

    /// Update the value using a function of the current one.
    pub fn update(&self, f: impl FnOnce(&T) -> T) {
        let next = f(&*self.inner.value.borrow());
        self.write(next);
    }

    /// Change the value in place. Always invalidates subscribers.
    pub fn mutate<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let runtime = &self.inner.runtime;
        runtime.check_write(self.inner.id);

        let result = f(&mut *self.inner.value.borrow_mut());
        runtime.invalidate(self.inner.id);
        result
    }

    /// Call `callback` every time this cell is invalidated, until the
    /// returned reaction is dropped or unsubscribed.
    pub fn on_invalidate<F>(&self, callback: F) -> Reaction
    where
        F: Fn() + 'static,
    {
        Reaction::attach(self.inner.runtime.clone(), self.inner.id, Rc::new(callback))
    }

    /// Number of observers that read this cell during their last evaluation.
    pub fn subscriber_count(&self) -> usize {
        self.inner.runtime.dependent_count(self.inner.id)
    }
}

impl<T> Drop for CellInner<T> {
    fn drop(&mut self) {
        self.runtime.release(self.id);
    }
}

impl<T: 'static> Clone for Cell<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Debug + 'static> Debug for Cell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Cell");
        s.field("id", &self.inner.id);
        match self.inner.value.try_borrow() {
            Ok(value) => s.field("value", &*value),
            Err(_) => s.field("value", &"<borrowed>"),
        };
        s.field("subscriber_count", &self.subscriber_count()).finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
