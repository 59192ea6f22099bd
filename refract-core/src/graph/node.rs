//! Graph Nodes
//!
//! This module defines the node types that live in the dependency graph.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

/// Unique identifier for a node in the dependency graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(u64);

impl NodeId {
    /// Generate a new unique node ID.
    ///
    /// IDs are unique across every runtime in the process.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The kind of node in the dependency graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// A cell. These are the roots of the graph.
    /// They have no dependencies, only dependents.
    Cell,

    /// A computed value. These have dependencies and may have dependents.
    Computed,

    /// An external observer. These are leaves of the graph.
    Reaction,
}

/// Dirty state of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirtyState {
    /// The node's value is up-to-date.
    Clean,

    /// The node must be re-evaluated (computed) or has been invalidated
    /// since its last render pass (reaction).
    Dirty,
}

/// A node in the dependency graph.
#[derive(Debug)]
pub struct Node {
    id: NodeId,
    kind: NodeKind,
    dirty: DirtyState,
    label: Option<String>,

    /// Nodes that this node read during its last evaluation, in read order.
    dependencies: IndexSet<NodeId>,

    /// Nodes that read this node during their last evaluation.
    dependents: IndexSet<NodeId>,
}

impl Node {
    /// Create a new node with the given kind.
    pub fn new(kind: NodeKind) -> Self {
        Self {
            id: NodeId::new(),
            kind,
            dirty: match kind {
                NodeKind::Cell => DirtyState::Clean,
                // Never evaluated yet
                NodeKind::Computed => DirtyState::Dirty,
                NodeKind::Reaction => DirtyState::Clean,
            },
            label: None,
            dependencies: IndexSet::new(),
            dependents: IndexSet::new(),
        }
    }

    /// Create a new cell node.
    pub fn cell() -> Self {
        Self::new(NodeKind::Cell)
    }

    /// Create a new computed node.
    pub fn computed() -> Self {
        Self::new(NodeKind::Computed)
    }

    /// Create a new reaction node.
    pub fn reaction() -> Self {
        Self::new(NodeKind::Reaction)
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn dirty_state(&self) -> DirtyState {
        self.dirty
    }

    pub fn is_clean(&self) -> bool {
        self.dirty == DirtyState::Clean
    }

    pub fn mark_clean(&mut self) {
        self.dirty = DirtyState::Clean;
    }

    /// Mark the node dirty. Cells are never dirty.
    ///
    /// Returns true if the node transitioned from clean to dirty.
    pub fn mark_dirty(&mut self) -> bool {
        if self.kind == NodeKind::Cell || self.dirty == DirtyState::Dirty {
            return false;
        }
        self.dirty = DirtyState::Dirty;
        true
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn set_label(&mut self, label: impl Into<String>) {
        self.label = Some(label.into());
    }

    /// Label if set, otherwise the node ID.
    pub fn display_name(&self) -> String {
        match &self.label {
            Some(label) => format!("{label}({})", self.id),
            None => self.id.to_string(),
        }
    }

    pub fn add_dependency(&mut self, node_id: NodeId) {
        self.dependencies.insert(node_id);
    }

    /// Remove a dependency, keeping the order of the others.
    pub fn remove_dependency(&mut self, node_id: NodeId) {
        self.dependencies.shift_remove(&node_id);
    }

    pub fn dependencies(&self) -> &IndexSet<NodeId> {
        &self.dependencies
    }

    pub fn add_dependent(&mut self, node_id: NodeId) {
        self.dependents.insert(node_id);
    }

    pub fn remove_dependent(&mut self, node_id: NodeId) {
        self.dependents.shift_remove(&node_id);
    }

    pub fn dependents(&self) -> &IndexSet<NodeId> {
        &self.dependents
    }

    /// Take all dependencies, leaving the set empty.
    pub fn take_dependencies(&mut self) -> IndexSet<NodeId> {
        std::mem::take(&mut self.dependencies)
    }
}
