//! Reactive Primitives
//!
//! This module implements the core reactive system: cells, computed values
//! and reactions. These primitives are the whole contract a UI layer needs
//! for fine-grained updates.
//!
//! # Concepts
//!
//! ## Cells
//!
//! A Cell is a container for mutable state. When a cell's value is read
//! within an evaluation (a computed or a reaction's `track`), the evaluating
//! observer becomes a dependent. When the value changes, all dependents are
//! marked dirty.
//!
//! ## Computed
//!
//! A Computed is a derived value that caches its result. It re-evaluates only
//! when one of its dependencies changed, and only when it is read.
//!
//! ## Reactions
//!
//! A Reaction is an external observer, such as a render pass, that is called
//! back when something it read is invalidated.
//!
//! # Implementation Notes
//!
//! Each [`Runtime`] owns a stack of running evaluations. Reads consult the
//! stack of the runtime that created the node, so dependencies are detected
//! automatically without a process-wide global.
//!
//! This approach (sometimes called "automatic dependency tracking" or
//! "transparent reactivity") is used by SolidJS, Vue 3, and Leptos.

mod cell;
mod computed;
mod context;
pub mod equality;
mod reaction;
mod runtime;

pub use cell::Cell;
pub use computed::Computed;
pub use context::{ContextGuard, FrameLog, ReactiveContext};
pub use equality::EqualityFn;
pub use reaction::Reaction;
pub use runtime::Runtime;
