//! Dependency Graph
//!
//! This module implements the dependency graph that tracks relationships
//! between cells, computed values and reactions.
//!
//! # Overview
//!
//! The dependency graph is a directed acyclic graph (DAG) where:
//!
//! - Nodes represent cells, computed values or reactions
//! - Edges represent reads: if A read B during its last evaluation, there is
//!   an edge from B to A
//!
//! Edges are rebuilt from scratch on every evaluation, so a computation that
//! reads different inputs depending on a condition only ever holds edges to
//! the inputs it read last time.
//!
//! When a cell changes, we traverse the graph to find all affected nodes and
//! mark them dirty. Computed nodes recompute lazily when next read.
//!
//! # Design Decisions
//!
//! 1. The graph is centralised per runtime rather than spread across the
//!    node handles, so a single borrow covers any structural update.
//!
//! 2. The graph is indexed by node ID for O(1) lookups.
//!
//! 3. We maintain both forward (dependencies) and reverse (dependents) edges
//!    to enable efficient traversal in both directions.

mod node;
mod snapshot;
mod store;

pub use node::{DirtyState, Node, NodeId, NodeKind};
pub use snapshot::{GraphSnapshot, NodeSnapshot};
pub use store::{DependencyGraph, EdgeDiff};
