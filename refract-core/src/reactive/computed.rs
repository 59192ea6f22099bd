//! Computed Implementation
//!
//! A Computed is a cached derived value that re-evaluates only when one of
//! the nodes it read last time has changed.
//!
//! # How Computed Values Work
//!
//! 1. Creating a computed does not run it. The first read does.
//!
//! 2. While running, every cell or computed it reads is recorded. Those
//!    reads replace the previous dependency set, so a computation that
//!    branches only depends on the branch it took last time.
//!
//! 3. When accessed again with no upstream change, the cached value is
//!    returned as is.
//!
//! 4. An upstream write marks the computed dirty without running it; the
//!    next read recomputes.
//!
//! # Failure
//!
//! A computation that returns an error (or panics) leaves the node dirty with
//! no cached value. The error goes to the caller of `read` and the next read
//! tries again from scratch.

use std::cell::{Cell as Counter, RefCell};
use std::fmt::{self, Debug};
use std::rc::Rc;

use tracing::debug;

use super::reaction::Reaction;
use super::runtime::Runtime;
use crate::error::Result;
use crate::graph::{Node, NodeId};

/// A cached derived value that recomputes only when dependencies change.
///
/// Cloning a computed yields another handle to the same node and cache.
///
/// # Example
///
/// ```rust
/// use refract_core::Runtime;
///
/// let rt = Runtime::new();
/// let children = rt.create_cell(None::<Vec<String>>);
///
/// let is_folder = rt.create_computed({
///     let children = children.clone();
///     move || Ok(children.with(|c| c.as_ref().is_some_and(|c| !c.is_empty())))
/// });
///
/// assert!(!is_folder.read().unwrap());
/// children.write(Some(vec!["new item".into()]));
/// assert!(is_folder.read().unwrap());
/// ```
pub struct Computed<T: 'static> {
    inner: Rc<ComputedInner<T>>,
}

struct ComputedInner<T> {
    id: NodeId,
    runtime: Runtime,
    compute: Box<dyn Fn() -> Result<T>>,
    /// `None` until the first successful evaluation and after any failure.
    cached: RefCell<Option<T>>,
    evaluations: Counter<usize>,
}

impl<T: Clone + 'static> Computed<T> {
    pub(crate) fn new<F>(runtime: Runtime, compute: F) -> Self
    where
        F: Fn() -> Result<T> + 'static,
    {
        let id = runtime.register(Node::computed());
        Self {
            inner: Rc::new(ComputedInner {
                id,
                runtime,
                compute: Box::new(compute),
                cached: RefCell::new(None),
                evaluations: Counter::new(0),
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

    /// Get the current value, recomputing if necessary.
    ///
    /// Records the read against the current observer. Fails with
    /// [`ReactiveError::CyclicDependency`](crate::ReactiveError::CyclicDependency)
    /// if this computed is already being evaluated.
    pub fn read(&self) -> Result<T> {
        let runtime = &self.inner.runtime;
        if let Some(err) = runtime.cycle_error(self.inner.id) {
            return Err(err);
        }
        runtime.track_read(self.inner.id);
        self.get()
    }

    /// Get the current value without establishing a dependency.
    pub fn read_untracked(&self) -> Result<T> {
        if let Some(err) = self.inner.runtime.cycle_error(self.inner.id) {
            return Err(err);
        }
        self.get()
    }

    fn get(&self) -> Result<T> {
        if self.inner.runtime.is_clean(self.inner.id) {
            if let Some(value) = self.inner.cached.borrow().as_ref() {
                return Ok(value.clone());
            }
        }
        self.recompute()
    }

    /// Run the computation within a tracking frame and cache the result.
    fn recompute(&self) -> Result<T> {
        let runtime = &self.inner.runtime;
        let id = self.inner.id;

        // Drop the stale value before running so nothing survives a failure.
        let stale = self.inner.cached.borrow_mut().take();
        drop(stale);

        let (outcome, writes) = runtime.evaluate(id, || (self.inner.compute)())?;
        self.inner.evaluations.set(self.inner.evaluations.get() + 1);

        match outcome {
            Ok(value) => {
                *self.inner.cached.borrow_mut() = Some(value.clone());
                runtime.settle(id, &writes);
                debug!(
                    node = %id,
                    label = ?runtime.label(id),
                    dependencies = runtime.dependency_count(id),
                    "recomputed"
                );
                Ok(value)
            }
            Err(err) => {
                debug!(node = %id, error = %err, "computation failed; staying dirty");
                Err(err)
            }
        }
    }

    /// Whether the next read will run the computation.
    pub fn is_dirty(&self) -> bool {
        !self.inner.runtime.is_clean(self.inner.id)
    }

    /// Check if the computed has a cached value.
    pub fn has_value(&self) -> bool {
        self.inner.cached.borrow().is_some()
    }

    /// Number of times the computation has run, including failed runs.
    pub fn evaluation_count(&self) -> usize {
        self.inner.evaluations.get()
    }

    /// Number of nodes read during the last evaluation.
    pub fn dependency_count(&self) -> usize {
        self.inner.runtime.dependency_count(self.inner.id)
    }

    /// Number of observers that read this computed during their last
    /// evaluation.
    pub fn subscriber_count(&self) -> usize {
        self.inner.runtime.dependent_count(self.inner.id)
    }

    /// Call `callback` every time this computed is invalidated, until the
    /// returned reaction is dropped or unsubscribed.
    pub fn on_invalidate<F>(&self, callback: F) -> Reaction
    where
        F: Fn() + 'static,
    {
        Reaction::attach(self.inner.runtime.clone(), self.inner.id, Rc::new(callback))
    }
}

impl<T> Drop for ComputedInner<T> {
    fn drop(&mut self) {
        self.runtime.release(self.id);
    }
}

impl<T: 'static> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Clone + Debug + 'static> Debug for Computed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computed")
            .field("id", &self.inner.id)
            .field("dirty", &self.is_dirty())
            .field("has_value", &self.has_value())
            .field("evaluations", &self.evaluation_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReactiveError;

    #[test]
    fn computed_is_lazy() {
        let rt = Runtime::new();
        let computed = rt.create_computed(|| Ok(42));

        assert!(!computed.has_value());
        assert!(computed.is_dirty());
        assert_eq!(computed.evaluation_count(), 0);

        assert_eq!(computed.read().unwrap(), 42);
        assert_eq!(computed.evaluation_count(), 1);
        assert!(computed.has_value());
    }

    #[test]
    fn computed_caches_value_when_clean() {
        let rt = Runtime::new();
        let computed = rt.create_computed(|| Ok(42));

        assert_eq!(computed.read().unwrap(), 42);
        assert_eq!(computed.read().unwrap(), 42);
        assert_eq!(computed.read().unwrap(), 42);
        assert_eq!(computed.evaluation_count(), 1);
    }

    #[test]
    fn computed_recomputes_after_write() {
        let rt = Runtime::new();
        let cell = rt.create_cell(1);
        let doubled = rt.create_computed({
            let cell = cell.clone();
            move || Ok(cell.read() * 2)
        });

        assert_eq!(doubled.read().unwrap(), 2);
        assert!(!doubled.is_dirty());

        cell.write(5);
        assert!(doubled.is_dirty());
        assert_eq!(doubled.read().unwrap(), 10);
        assert_eq!(doubled.evaluation_count(), 2);
    }

    #[test]
    fn failed_computation_stays_dirty_and_retries() {
        let rt = Runtime::new();
        let input = rt.create_cell(String::from("x"));
        let parsed = rt.create_computed({
            let input = input.clone();
            move || {
                let n: i32 = input.read().parse().map_err(ReactiveError::compute)?;
                Ok(n)
            }
        });

        assert!(parsed.read().is_err());
        assert!(parsed.is_dirty());
        assert!(!parsed.has_value());

        // Retried even without an upstream change.
        assert!(parsed.read().is_err());
        assert_eq!(parsed.evaluation_count(), 2);

        input.write("7".into());
        assert_eq!(parsed.read().unwrap(), 7);
    }

    #[test]
    fn failure_discards_previous_value() {
        let rt = Runtime::new();
        let fail = rt.create_cell(false);
        let computed = rt.create_computed({
            let fail = fail.clone();
            move || {
                if fail.read() {
                    Err(anyhow::anyhow!("boom"))?
                }
                Ok(1)
            }
        });

        assert_eq!(computed.read().unwrap(), 1);
        fail.write(true);
        assert!(computed.read().is_err());
        assert!(!computed.has_value());
    }

    #[test]
    fn direct_self_read_is_a_cycle() {
        let rt = Runtime::new();
        let slot: Rc<RefCell<Option<Computed<i32>>>> = Rc::new(RefCell::new(None));

        let computed = rt.create_computed({
            let slot = Rc::clone(&slot);
            move || {
                let me = slot.borrow().clone();
                match me {
                    Some(me) => Ok(me.read()? + 1),
                    None => Ok(0),
                }
            }
        });
        *slot.borrow_mut() = Some(computed.clone());

        let err = computed.read().unwrap_err();
        assert!(err.is_cycle());
        assert!(computed.is_dirty());

        // Break the Rc cycle between the closure and the handle.
        slot.borrow_mut().take();
    }

    #[test]
    fn computed_clone_shares_state() {
        let rt = Runtime::new();
        let c1 = rt.create_computed(|| Ok(42));
        assert_eq!(c1.read().unwrap(), 42);

        let c2 = c1.clone();
        assert_eq!(c1.id(), c2.id());
        assert!(c2.has_value());
        assert_eq!(c2.read().unwrap(), 42);
        assert_eq!(c2.evaluation_count(), 1);
    }

    #[test]
    fn labels_show_in_debug_output() {
        let rt = Runtime::new();
        let computed = rt.create_computed(|| Ok(1)).named("isFolder");
        assert_eq!(computed.label().as_deref(), Some("isFolder"));
        assert!(format!("{computed:?}").contains("dirty: true"));
    }
}
