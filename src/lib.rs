//! # syno: embeddable in-memory property graph
//!
//! A typed vertex/edge store with a schema-driven model layer on top and two
//! query surfaces: a lazy traversal DSL and a signed, data-only schema query.
//!
//! ## Design Principles
//!
//! 1. **The store owns the data**: model instances are `(store, id)` views,
//!    never copies
//! 2. **Bidirectional adjacency**: every edge is indexed from both ends, so
//!    predecessor and successor lookups cost the same
//! 3. **Lazy by default**: enumeration and traversal return [`Seq`]s that do
//!    no work until driven
//! 4. **Untrusted queries are signed**: a schema query runs only if its
//!    token verifies under the executor's secret
//!
//! ## Quick Start
//!
//! ```rust
//! use syno::{Graph, Models, ModelSchema, ConnectionDescriptor, Traversal, props};
//!
//! # fn main() -> syno::Result<()> {
//! let models = Models::new(Graph::new());
//! let person = models.register(
//!     ModelSchema::new("Person")
//!         .property("name")
//!         .connection("friends", ConnectionDescriptor::collection().mutual()),
//! );
//!
//! let ada = person.create(props([("name", "Ada")]));
//! let bob = person.create(props([("name", "Bob")]));
//! let cy = person.create(props([("name", "Cy")]));
//! ada.collection("friends")?.add(&bob)?;
//! bob.collection("friends")?.add(&cy)?;
//!
//! // Friends of friends of Ada: Ada again (through Bob) and Cy.
//! let fof = Traversal::new(&models).via("friends").of("friends").starting_with(&ada).count();
//! assert_eq!(fof, 2);
//! # Ok(())
//! # }
//! ```
//!
//! ## Features
//!
//! | Feature | Description |
//! |---------|-------------|
//! | (default) | Store, models, traversal, schema queries, in-memory persistence |
//! | `fs` | JSON snapshot persistence on disk via `tokio::fs` |

// ============================================================================
// Modules
// ============================================================================

pub mod model;
pub mod seq;
pub mod storage;
pub mod schema;
pub mod traversal;
pub mod query;
pub mod config;

// ============================================================================
// Re-exports: Model (the DTOs)
// ============================================================================

pub use model::{
    Vertex, VertexId, Edge, Direction,
    Value, PropertyMap, props,
};

pub use seq::Seq;

// ============================================================================
// Re-exports: Storage
// ============================================================================

pub use storage::{
    Graph, Snapshot, Persistence, MemoryPersistence,
    GraphEvent, EventSink, RecordingSink,
};

#[cfg(feature = "fs")]
pub use storage::FilePersistence;

// ============================================================================
// Re-exports: Schema, traversal, query
// ============================================================================

pub use schema::{
    Models, Factory, Instance, ModelSchema, ConnectionDescriptor,
    SingleConnection, CollectionConnection,
};

pub use traversal::{Traversal, Raw, Node, Seeds, Projection};

pub use query::{QueryEngine, Schema, SignedSchema, Select, ConnectionSelect, FromStep, ResultRow, FromValue};

pub use config::{GraphConfig, IdStrategy, QueryConfig};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Reference error: {0}")]
    Reference(String),

    #[error("Type error: expected {expected}, got {got}")]
    TypeError { expected: String, got: String },

    #[error("Integrity error: schema token does not match its body")]
    Integrity,

    #[error("Unknown field {field} on {model}")]
    UnknownField { model: String, field: String },

    #[error("Unregistered model type: {0}")]
    UnregisteredType(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Reserved property key: {0}")]
    ReservedKey(String),

    #[error("Invalid snapshot: {0}")]
    Snapshot(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
