//! Change events emitted by the store.
//!
//! One event per mutating call, carrying enough payload to invert it.
//! Consumers (cache invalidation, undo journals) register an [`EventSink`]
//! on a [`Graph`](super::Graph); nothing here is process-wide.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::model::{Edge, Vertex};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum GraphEvent {
    CreateNode {
        vertex: Vertex,
    },
    UpdateNode {
        previous: Vertex,
        current: Vertex,
    },
    /// `edges` are the incident edges removed by the cascade.
    DeleteNode {
        vertex: Vertex,
        edges: Vec<Edge>,
    },
    MakeEdge {
        edge: Edge,
    },
    DeleteEdge {
        edge: Edge,
    },
}

impl GraphEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            GraphEvent::CreateNode { .. } => "create-node",
            GraphEvent::UpdateNode { .. } => "update-node",
            GraphEvent::DeleteNode { .. } => "delete-node",
            GraphEvent::MakeEdge { .. } => "make-edge",
            GraphEvent::DeleteEdge { .. } => "delete-edge",
        }
    }

    /// Events that undo this one, in the order they must be applied.
    pub fn inverse(&self) -> Vec<GraphEvent> {
        match self {
            GraphEvent::CreateNode { vertex } => vec![GraphEvent::DeleteNode {
                vertex: vertex.clone(),
                edges: Vec::new(),
            }],
            GraphEvent::UpdateNode { previous, current } => vec![GraphEvent::UpdateNode {
                previous: current.clone(),
                current: previous.clone(),
            }],
            GraphEvent::DeleteNode { vertex, edges } => {
                let mut events = Vec::with_capacity(edges.len() + 1);
                events.push(GraphEvent::CreateNode { vertex: vertex.clone() });
                events.extend(edges.iter().cloned().map(|edge| GraphEvent::MakeEdge { edge }));
                events
            }
            GraphEvent::MakeEdge { edge } => vec![GraphEvent::DeleteEdge { edge: edge.clone() }],
            GraphEvent::DeleteEdge { edge } => vec![GraphEvent::MakeEdge { edge: edge.clone() }],
        }
    }
}

/// Receiver of store change events. Called after the mutation is applied,
/// with no store lock held.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &GraphEvent);
}

/// Sink that records every event it sees.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<GraphEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<GraphEvent> {
        self.events.lock().clone()
    }

    /// Drain recorded events.
    pub fn take(&self) -> Vec<GraphEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: &GraphEvent) {
        self.events.lock().push(event.clone());
    }
}
