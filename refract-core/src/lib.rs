//! Refract Core
//!
//! This crate provides a small reactive state core for UI code:
//!
//! - Cells holding mutable state
//! - Computed values derived from cells, evaluated lazily and cached
//! - Reactions that are called back when what they read is invalidated
//!
//! Dependencies are discovered by running computations and recording what
//! they read, so a computation that branches only depends on the branch it
//! took last time.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: Cells, computed values, reactions and the runtime
//! - `graph`: Dependency graph storage and snapshots
//! - `config`: Runtime settings
//! - `error`: Error types
//!
//! # Example
//!
//! ```rust
//! use refract_core::Runtime;
//!
//! let rt = Runtime::new();
//!
//! // Create a cell
//! let count = rt.create_cell(0);
//!
//! // Create a derived value
//! let doubled = rt.create_computed({
//!     let count = count.clone();
//!     move || Ok(count.read() * 2)
//! });
//!
//! // Observe it from a render pass
//! let view = rt.on_invalidate(|| tracing::debug!("view is stale"));
//! let text = view
//!     .track(|| format!("Count: {}, Doubled: {}", count.read(), doubled.read().unwrap()))
//!     .unwrap();
//! assert_eq!(text, "Count: 0, Doubled: 0");
//!
//! // Update the cell; the view is invalidated, the computed recomputes on read
//! count.write(5);
//! assert!(view.is_dirty());
//! assert_eq!(doubled.read().unwrap(), 10);
//! ```

pub mod config;
pub mod error;
pub mod graph;
pub mod reactive;

pub use config::RuntimeConfig;
pub use error::{ConfigError, ReactiveError, Result};
pub use reactive::{Cell, Computed, Reaction, Runtime};
