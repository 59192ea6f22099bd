//! Dependency Graph Store
//!
//! The store owns every node of one runtime and the edges between them. It
//! answers two questions for the reactive layer:
//!
//! 1. Which nodes does an observer depend on, and how does that set change
//!    after a fresh evaluation?
//! 2. Which nodes become dirty when a cell changes?
//!
//! # Invalidation
//!
//! When a cell changes we walk its dependents breadth-first and mark each
//! reached node dirty. The walk continues through nodes that were already
//! dirty: a computed whose last evaluation failed stays dirty while an
//! observer that recovered from that failure may be clean, so stopping early
//! would lose the notification.

use std::collections::{HashMap, HashSet, VecDeque};

use indexmap::IndexSet;
use smallvec::SmallVec;

use super::node::{Node, NodeId};

/// Graph of nodes and dependency edges for one runtime.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    nodes: HashMap<NodeId, Node>,
}

/// Edge changes made by [`DependencyGraph::replace_dependencies`].
#[derive(Debug, Default, PartialEq, Eq)]
pub struct EdgeDiff {
    pub added: SmallVec<[NodeId; 4]>,
    pub removed: SmallVec<[NodeId; 4]>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node to the graph.
    pub fn add_node(&mut self, node: Node) -> NodeId {
        let id = node.id();
        self.nodes.insert(id, node);
        id
    }

    /// Remove a node from the graph.
    ///
    /// Also removes all edges involving this node.
    pub fn remove_node(&mut self, node_id: NodeId) -> Option<Node> {
        let node = self.nodes.remove(&node_id)?;

        for dep_id in node.dependencies() {
            if let Some(dep) = self.nodes.get_mut(dep_id) {
                dep.remove_dependent(node_id);
            }
        }

        for dependent_id in node.dependents() {
            if let Some(dependent) = self.nodes.get_mut(dependent_id) {
                dependent.remove_dependency(node_id);
            }
        }

        Some(node)
    }

    pub fn get_node(&self, node_id: NodeId) -> Option<&Node> {
        self.nodes.get(&node_id)
    }

    pub fn get_node_mut(&mut self, node_id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&node_id)
    }

    /// Add a dependency edge: `dependent` depends on `dependency`.
    ///
    /// Both nodes must exist; otherwise the call is ignored.
    pub fn add_edge(&mut self, dependency: NodeId, dependent: NodeId) {
        if !self.nodes.contains_key(&dependency) || !self.nodes.contains_key(&dependent) {
            return;
        }
        if let Some(dep_node) = self.nodes.get_mut(&dependency) {
            dep_node.add_dependent(dependent);
        }
        if let Some(dependent_node) = self.nodes.get_mut(&dependent) {
            dependent_node.add_dependency(dependency);
        }
    }

    /// Replace the dependency set of `dependent` with the nodes read during
    /// its latest evaluation.
    ///
    /// Edges to nodes no longer read are removed, edges to newly read nodes
    /// are added, and the stored order follows `reads`. IDs of nodes that
    /// were dropped mid-evaluation are skipped.
    pub fn replace_dependencies(&mut self, dependent: NodeId, reads: &IndexSet<NodeId>) -> EdgeDiff {
        let mut diff = EdgeDiff::default();

        let previous = match self.nodes.get_mut(&dependent) {
            Some(node) => node.take_dependencies(),
            None => return diff,
        };

        for old in previous.iter().filter(|id| !reads.contains(*id)) {
            if let Some(dep_node) = self.nodes.get_mut(old) {
                dep_node.remove_dependent(dependent);
            }
            diff.removed.push(*old);
        }

        for &read in reads {
            if read == dependent || !self.nodes.contains_key(&read) {
                continue;
            }
            if !previous.contains(&read) {
                diff.added.push(read);
            }
            self.add_edge(read, dependent);
        }

        diff
    }

    /// Mark everything downstream of `source` dirty.
    ///
    /// Returns the nodes that transitioned from clean to dirty, in
    /// breadth-first order.
    pub fn mark_changed(&mut self, source_id: NodeId) -> Vec<NodeId> {
        let mut newly_dirty = Vec::new();
        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();

        if let Some(source) = self.nodes.get(&source_id) {
            queue.extend(source.dependents().iter().copied());
        }

        while let Some(node_id) = queue.pop_front() {
            if !visited.insert(node_id) {
                continue;
            }

            if let Some(node) = self.nodes.get_mut(&node_id) {
                if node.mark_dirty() {
                    newly_dirty.push(node_id);
                }
                queue.extend(node.dependents().iter().copied());
            }
        }

        newly_dirty
    }

    /// Perform a topological sort of the given nodes.
    ///
    /// Returns nodes in order such that dependencies come before dependents.
    /// Ties keep the order of `nodes`.
    pub fn topological_sort(&self, nodes: &[NodeId]) -> Vec<NodeId> {
        let node_set: HashSet<_> = nodes.iter().copied().collect();
        let mut in_degree: HashMap<NodeId, usize> = HashMap::new();
        let mut result = Vec::with_capacity(nodes.len());
        let mut queue = VecDeque::new();

        // Calculate in-degrees (only counting edges within the node set)
        for &node_id in nodes {
            if let Some(node) = self.nodes.get(&node_id) {
                let degree = node
                    .dependencies()
                    .iter()
                    .filter(|d| node_set.contains(d))
                    .count();
                in_degree.insert(node_id, degree);
                if degree == 0 {
                    queue.push_back(node_id);
                }
            }
        }

        // Kahn's algorithm
        while let Some(node_id) = queue.pop_front() {
            result.push(node_id);

            if let Some(node) = self.nodes.get(&node_id) {
                for dependent_id in node.dependents() {
                    if let Some(degree) = in_degree.get_mut(dependent_id) {
                        *degree = degree.saturating_sub(1);
                        if *degree == 0 {
                            queue.push_back(*dependent_id);
                        }
                    }
                }
            }
        }

        result
    }

    /// Every node, dependencies before dependents, ties broken by ID.
    pub fn topological_order(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self.nodes.keys().copied().collect();
        ids.sort_unstable();
        self.topological_sort(&ids)
    }

    /// Whether `node` reads `target`, directly or through other nodes.
    pub fn depends_on(&self, node: NodeId, target: NodeId) -> bool {
        let mut stack = vec![node];
        let mut seen = HashSet::new();

        while let Some(id) = stack.pop() {
            let Some(current) = self.nodes.get(&id) else {
                continue;
            };
            for &dependency in current.dependencies() {
                if dependency == target {
                    return true;
                }
                if seen.insert(dependency) {
                    stack.push(dependency);
                }
            }
        }
        false
    }

    /// Get the total number of nodes in the graph.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}
