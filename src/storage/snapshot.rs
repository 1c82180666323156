//! Snapshot of the store's four internal maps.
//!
//! This is the shape persistence backends consume on save and produce on
//! load. It mirrors the store exactly: vertex records, forward adjacency,
//! backward adjacency and the type index.

use indexmap::{IndexMap, IndexSet};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use async_trait::async_trait;

use crate::model::{Vertex, VertexId};
use crate::Result;
use super::memory::{Adjacency, TypeSet};
use super::Persistence;

/// Owned copy of the store state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub vertices: IndexMap<VertexId, Vertex>,
    pub edges_from: IndexMap<VertexId, Adjacency>,
    pub edges_to: IndexMap<VertexId, Adjacency>,
    pub type_index: IndexMap<String, IndexSet<VertexId>>,
}

impl Snapshot {
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges_from
            .values()
            .flat_map(|adj| adj.values())
            .map(TypeSet::len)
            .sum()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

// ============================================================================
// MemoryPersistence
// ============================================================================

/// Keeps the last saved snapshot in memory.
#[derive(Debug, Default)]
pub struct MemoryPersistence {
    saved: Mutex<Option<Snapshot>>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Persistence for MemoryPersistence {
    async fn load(&self) -> Result<Option<Snapshot>> {
        Ok(self.saved.lock().clone())
    }

    async fn save(&self, snapshot: &Snapshot) -> Result<()> {
        *self.saved.lock() = Some(snapshot.clone());
        Ok(())
    }
}

// ============================================================================
// FilePersistence
// ============================================================================

/// Stores the snapshot as a JSON document on disk.
///
/// A missing file loads as `None` so a fresh store can start empty.
#[cfg(feature = "fs")]
#[derive(Debug, Clone)]
pub struct FilePersistence {
    path: std::path::PathBuf,
}

#[cfg(feature = "fs")]
impl FilePersistence {
    pub fn new(path: impl Into<std::path::PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[cfg(feature = "fs")]
#[async_trait]
impl Persistence for FilePersistence {
    async fn load(&self) -> Result<Option<Snapshot>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(json) => Ok(Some(Snapshot::from_json(&json)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, snapshot: &Snapshot) -> Result<()> {
        let json = snapshot.to_json()?;
        tokio::fs::write(&self.path, json).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Graph;
    use crate::model::props;

    fn sample() -> Graph {
        let g = Graph::new();
        g.set_vertex("foo", "Person", props([("name", "foo")]));
        g.set_vertex("bar", "Person", props([("name", "bar")]));
        g.set_edge("foo", "bar", "friend").unwrap();
        g.set_edge("foo", "bar", "likes").unwrap();
        g
    }

    #[test]
    fn test_snapshot_counts() {
        let snap = sample().snapshot();
        assert_eq!(snap.vertex_count(), 2);
        assert_eq!(snap.edge_count(), 2);
    }

    #[test]
    fn test_json_roundtrip() {
        let snap = sample().snapshot();
        let restored = Snapshot::from_json(&snap.to_json().unwrap()).unwrap();
        assert_eq!(snap, restored);
    }

    #[tokio::test]
    async fn test_memory_persistence() {
        let store = MemoryPersistence::new();
        assert!(store.load().await.unwrap().is_none());

        let snap = sample().snapshot();
        store.save(&snap).await.unwrap();
        let loaded = store.load().await.unwrap().unwrap();

        let g = Graph::from_snapshot(loaded).unwrap();
        assert!(g.has_edge("foo", "bar", "likes"));
        assert!(g.in_edges("bar").any(|e| e.edge_type == "friend"));
    }
}
