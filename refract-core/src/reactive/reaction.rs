//! Reaction Implementation
//!
//! A Reaction is an observer outside the graph (a render pass, a logger)
//! that wants to hear about invalidation without computing a value.
//!
//! # How Reactions Work
//!
//! 1. [`Runtime::on_invalidate`] creates a reaction with no dependencies.
//!
//! 2. [`Reaction::track`] runs a closure, typically a render pass, in the
//!    reaction's frame. Everything read inside becomes its dependency set
//!    and the reaction becomes clean.
//!
//! 3. When any dependency is invalidated, the reaction turns dirty and its
//!    callback runs once. It is re-armed by the next `track`.
//!
//! Reactions created through `Cell::on_invalidate` or
//! `Computed::on_invalidate` are attached to one node and re-arm themselves
//! after every callback, so they hear about every invalidation.
//!
//! # Differences from Computed
//!
//! - Computed values return a value; reactions do not.
//! - Computed values are pulled by reads; reactions are pushed to.
//! - Nothing can depend on a reaction.
//!
//! # Cleanup
//!
//! Dropping the reaction, or calling [`Reaction::unsubscribe`], removes it
//! and its edges from the graph. The callback is never called afterwards.

use std::fmt;
use std::rc::Rc;

use tracing::trace;

use super::runtime::Runtime;
use crate::error::Result;
use crate::graph::{Node, NodeId};

/// Handle to an invalidation observer.
///
/// # Example
///
/// ```rust
/// use std::cell::Cell as Flag;
/// use std::rc::Rc;
/// use refract_core::Runtime;
///
/// let rt = Runtime::new();
/// let message = rt.create_cell("Hello");
/// let stale = Rc::new(Flag::new(false));
///
/// let view = {
///     let stale = Rc::clone(&stale);
///     rt.on_invalidate(move || stale.set(true))
/// };
///
/// let rendered = view.track(|| format!("<h1>{}</h1>", message.read())).unwrap();
/// assert_eq!(rendered, "<h1>Hello</h1>");
///
/// message.write("Ciao");
/// assert!(stale.get());
/// ```
#[must_use = "dropping a Reaction unsubscribes it"]
pub struct Reaction {
    id: NodeId,
    runtime: Runtime,
    active: bool,
}

impl Reaction {
    pub(crate) fn new(runtime: Runtime, callback: Rc<dyn Fn()>, persistent: bool) -> Self {
        let id = runtime.register(Node::reaction());
        runtime.register_reaction(id, callback, persistent);
        Self {
            id,
            runtime,
            active: true,
        }
    }

    /// A persistent reaction subscribed directly to `source`.
    pub(crate) fn attach(runtime: Runtime, source: NodeId, callback: Rc<dyn Fn()>) -> Self {
        let reaction = Self::new(runtime, callback, true);
        reaction.runtime.add_edge(source, reaction.id);
        trace!(reaction = %reaction.id, source = %source, "attached");
        reaction
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Run `f` in this reaction's frame.
    ///
    /// The nodes `f` reads replace the reaction's dependencies and the
    /// reaction becomes clean. If `f` writes a cell it read, the reaction is
    /// invalidated again right away. Fails only if the evaluation depth
    /// limit is reached, in which case `f` does not run.
    pub fn track<R>(&self, f: impl FnOnce() -> R) -> Result<R> {
        let (output, writes) = self.runtime.evaluate(self.id, f)?;
        self.runtime.settle(self.id, &writes);
        Ok(output)
    }

    /// Whether something this reaction depends on changed since the last
    /// `track` (or, for attached reactions, since the last callback).
    pub fn is_dirty(&self) -> bool {
        !self.runtime.is_clean(self.id)
    }

    /// Get the number of dependencies.
    pub fn dependency_count(&self) -> usize {
        self.runtime.dependency_count(self.id)
    }

    /// Stop observing. Equivalent to dropping the reaction.
    pub fn unsubscribe(mut self) {
        self.dispose();
    }

    fn dispose(&mut self) {
        if self.active {
            self.active = false;
            self.runtime.release_reaction(self.id);
            trace!(reaction = %self.id, "unsubscribed");
        }
    }
}

impl Drop for Reaction {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for Reaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reaction")
            .field("id", &self.id)
            .field("dirty", &self.is_dirty())
            .field("dependency_count", &self.dependency_count())
            .field("active", &self.active)
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell as Counter;

    fn counting(rt: &Runtime) -> (Reaction, Rc<Counter<usize>>) {
        let calls = Rc::new(Counter::new(0));
        let reaction = {
            let calls = Rc::clone(&calls);
            rt.on_invalidate(move || calls.set(calls.get() + 1))
        };
        (reaction, calls)
    }

    #[test]
    fn reaction_does_not_run_on_creation() {
        let rt = Runtime::new();
        let (reaction, calls) = counting(&rt);

        assert_eq!(calls.get(), 0);
        assert!(!reaction.is_dirty());
        assert_eq!(reaction.dependency_count(), 0);
    }

    #[test]
    fn track_subscribes_to_reads() {
        let rt = Runtime::new();
        let a = rt.create_cell(1);
        let b = rt.create_cell(2);
        let (reaction, calls) = counting(&rt);

        let sum = reaction.track(|| a.read() + b.read()).unwrap();
        assert_eq!(sum, 3);
        assert_eq!(reaction.dependency_count(), 2);

        b.write(5);
        assert_eq!(calls.get(), 1);
        assert!(reaction.is_dirty());
    }

    #[test]
    fn callback_fires_once_until_tracked_again() {
        let rt = Runtime::new();
        let cell = rt.create_cell(0);
        let (reaction, calls) = counting(&rt);

        reaction.track(|| cell.read()).unwrap();

        cell.write(1);
        cell.write(2);
        assert_eq!(calls.get(), 1);

        reaction.track(|| cell.read()).unwrap();
        assert!(!reaction.is_dirty());

        cell.write(3);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn track_through_computed() {
        let rt = Runtime::new();
        let cell = rt.create_cell(2);
        let squared = rt.create_computed({
            let cell = cell.clone();
            move || Ok(cell.read() * cell.read())
        });
        let (reaction, calls) = counting(&rt);

        assert_eq!(reaction.track(|| squared.read()).unwrap().unwrap(), 4);

        cell.write(3);
        assert_eq!(calls.get(), 1);
        assert_eq!(squared.read().unwrap(), 9);
    }

    #[test]
    fn reaction_does_not_run_after_unsubscribe() {
        let rt = Runtime::new();
        let cell = rt.create_cell(0);
        let (reaction, calls) = counting(&rt);

        reaction.track(|| cell.read()).unwrap();
        reaction.unsubscribe();

        cell.write(1);
        assert_eq!(calls.get(), 0);
        assert_eq!(cell.subscriber_count(), 0);
        assert_eq!(rt.node_count(), 1);
    }

    #[test]
    fn dropped_reaction_is_removed() {
        let rt = Runtime::new();
        let cell = rt.create_cell(0);

        {
            let (reaction, _calls) = counting(&rt);
            reaction.track(|| cell.read()).unwrap();
            assert_eq!(cell.subscriber_count(), 1);
        }

        assert_eq!(cell.subscriber_count(), 0);
    }

    #[test]
    fn callback_may_unsubscribe_other_reactions() {
        let rt = Runtime::new();
        let cell = rt.create_cell(0);
        let (second, second_calls) = counting(&rt);
        let second = Rc::new(std::cell::RefCell::new(Some(second)));

        let _first = {
            let second = Rc::clone(&second);
            cell.on_invalidate(move || {
                second.borrow_mut().take();
            })
        };
        if let Some(second) = second.borrow().as_ref() {
            second.track(|| cell.read()).unwrap();
        }

        cell.write(1);
        assert_eq!(second_calls.get(), 0);
        assert!(second.borrow().is_none());
    }

    #[test]
    fn reaction_tracked_again_inside_batch_is_not_notified() {
        let rt = Runtime::new();
        let cell = rt.create_cell(0);
        let (view, calls) = counting(&rt);
        view.track(|| cell.read()).unwrap();

        rt.batch(|| {
            cell.write(1);
            assert!(view.is_dirty());
            assert_eq!(view.track(|| cell.read()).unwrap(), 1);
        });

        assert!(!view.is_dirty());
        assert_eq!(calls.get(), 0);

        // Still armed for the next change.
        cell.write(2);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn render_pass_that_overwrites_its_input_stays_dirty() {
        let rt = Runtime::new();
        let draft = rt.create_cell(String::from("  todo  "));
        let (view, calls) = counting(&rt);

        let rendered = view
            .track(|| {
                let text = draft.read();
                draft.write(text.trim().to_string());
                text
            })
            .unwrap();

        assert_eq!(rendered, "  todo  ");
        assert!(view.is_dirty());
        assert_eq!(calls.get(), 1);

        assert_eq!(view.track(|| draft.read()).unwrap(), "todo");
        assert!(!view.is_dirty());
    }
}
