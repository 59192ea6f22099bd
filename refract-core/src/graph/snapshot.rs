//! Serialisable views of the dependency graph, for debugging tools.

use serde::{Deserialize, Serialize};

use super::node::{DirtyState, NodeId, NodeKind};
use super::store::DependencyGraph;

/// One node as seen at snapshot time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub id: NodeId,
    pub kind: NodeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub state: DirtyState,
    pub dependencies: Vec<NodeId>,
    pub dependents: Vec<NodeId>,
}

/// The whole graph, dependencies listed before their dependents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<NodeSnapshot>,
}

impl GraphSnapshot {
    pub fn capture(graph: &DependencyGraph) -> Self {
        let nodes = graph
            .topological_order()
            .into_iter()
            .filter_map(|id| graph.get_node(id))
            .map(|node| NodeSnapshot {
                id: node.id(),
                kind: node.kind(),
                label: node.label().map(str::to_owned),
                state: node.dirty_state(),
                dependencies: node.dependencies().iter().copied().collect(),
                dependents: node.dependents().iter().copied().collect(),
            })
            .collect();

        Self { nodes }
    }

    /// Find a node by label.
    pub fn find(&self, label: &str) -> Option<&NodeSnapshot> {
        self.nodes.iter().find(|n| n.label.as_deref() == Some(label))
    }

    pub fn get(&self, id: NodeId) -> Option<&NodeSnapshot> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
