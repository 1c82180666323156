//! Edge in the property graph.

use serde::{Deserialize, Serialize};
use super::VertexId;

/// Traversal direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Outgoing,
    Incoming,
    Both,
}

/// A directed, typed edge. Edges carry no properties; identity is the triple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub origin: VertexId,
    pub target: VertexId,
    #[serde(rename = "type")]
    pub edge_type: String,
}

impl Edge {
    pub fn new(
        origin: impl Into<VertexId>,
        target: impl Into<VertexId>,
        edge_type: impl Into<String>,
    ) -> Self {
        Self {
            origin: origin.into(),
            target: target.into(),
            edge_type: edge_type.into(),
        }
    }

    /// The edge with origin and target swapped, under the given type.
    pub fn mirrored(&self, edge_type: impl Into<String>) -> Edge {
        Edge::new(self.target.clone(), self.origin.clone(), edge_type)
    }
}
