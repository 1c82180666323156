//! # Storage
//!
//! The in-memory graph store and the contracts of the collaborators that
//! sit around it.
//!
//! | Item | Module | Description |
//! |------|--------|-------------|
//! | `Graph` | `memory` | The multigraph: vertices, adjacency, type index |
//! | `Snapshot` | `snapshot` | Owned copy of the four internal maps |
//! | `MemoryPersistence` | `snapshot` | Keeps the last snapshot in memory |
//! | `FilePersistence` | `snapshot` | JSON snapshot on disk (`fs` feature) |
//! | `GraphEvent` | `event` | One change event per mutating call |

pub mod memory;
pub mod snapshot;
pub mod event;

use async_trait::async_trait;
use crate::Result;

pub use memory::{Graph, Adjacency, TypeSet};
pub use snapshot::{Snapshot, MemoryPersistence};
#[cfg(feature = "fs")]
pub use snapshot::FilePersistence;
pub use event::{GraphEvent, EventSink, RecordingSink};

// ============================================================================
// Persistence Trait
// ============================================================================

/// The contract for durable snapshot storage.
///
/// Backends only move snapshots; they never see the live store. Retries,
/// compression and scheduling belong to the backend, not to the core.
#[async_trait]
pub trait Persistence: Send + Sync {
    /// Load the last saved snapshot, or `None` if nothing was saved yet.
    async fn load(&self) -> Result<Option<Snapshot>>;

    /// Persist a snapshot, replacing any previous one.
    async fn save(&self, snapshot: &Snapshot) -> Result<()>;

    /// Load into a fresh store, or start an empty one.
    async fn open(&self) -> Result<Graph> {
        match self.load().await? {
            Some(snapshot) => Graph::from_snapshot(snapshot),
            None => Ok(Graph::new()),
        }
    }

    /// Snapshot the store and save it.
    async fn commit(&self, graph: &Graph) -> Result<()> {
        self.save(&graph.snapshot()).await
    }
}
