//! # Schema-driven models
//!
//! Registering a [`ModelSchema`] with [`Models`] yields a [`Factory`] bound
//! to one store. Instances are views `(store, id, schema)`: every property
//! read goes back to the store, every write goes through it. Connections
//! are named relations backed by edge types, single or collection, and may
//! keep a mirrored edge in step (`mutual` reuses the edge type, `reverse`
//! names a distinct one).
//!
//! ```
//! use syno::{Graph, Models, ModelSchema, ConnectionDescriptor, props};
//!
//! # fn main() -> syno::Result<()> {
//! let models = Models::new(Graph::new());
//! let person = models.register(
//!     ModelSchema::new("Person")
//!         .property("name")
//!         .connection("friends", ConnectionDescriptor::collection().mutual()),
//! );
//! let ada = person.create(props([("name", "Ada")]));
//! let bob = person.create(props([("name", "Bob")]));
//! ada.collection("friends")?.add(&bob)?;
//! assert!(bob.collection("friends")?.has(&ada)?);
//! # Ok(())
//! # }
//! ```

pub mod registry;
pub mod instance;

use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::model::Value;
use crate::Result;

pub use registry::{Models, Factory};
pub use instance::{Instance, SingleConnection, CollectionConnection};

/// Computed, read-only member. Re-evaluated on every access.
pub type DerivedFn = Arc<dyn Fn(&Instance) -> Result<Value> + Send + Sync>;

// ============================================================================
// Connection descriptor
// ============================================================================

/// How a named connection maps onto edges.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionDescriptor {
    /// Also the edge type. Filled in by [`ModelSchema::connection`].
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub collection: bool,
    #[serde(default)]
    pub mutual: bool,
    #[serde(default)]
    pub reverse: Option<String>,
}

impl ConnectionDescriptor {
    pub fn single() -> Self {
        Self::default()
    }

    pub fn collection() -> Self {
        Self { collection: true, ..Self::default() }
    }

    /// Use the same edge type in both directions.
    pub fn mutual(mut self) -> Self {
        self.mutual = true;
        self
    }

    /// Keep an inverse edge of type `name` in step.
    pub fn reverse(mut self, name: impl Into<String>) -> Self {
        self.reverse = Some(name.into());
        self
    }

    /// Edge type of the mirrored edge, if any.
    pub fn mirror(&self) -> Option<&str> {
        if self.mutual {
            Some(&self.name)
        } else {
            self.reverse.as_deref()
        }
    }
}

// ============================================================================
// Model schema
// ============================================================================

/// Declaration of one model type: its properties, connections and derived members.
#[derive(Clone)]
pub struct ModelSchema {
    type_name: String,
    properties: Vec<String>,
    connections: IndexMap<String, ConnectionDescriptor>,
    derived: IndexMap<String, DerivedFn>,
}

impl ModelSchema {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            properties: Vec::new(),
            connections: IndexMap::new(),
            derived: IndexMap::new(),
        }
    }

    pub fn property(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !self.properties.contains(&name) {
            self.properties.push(name);
        }
        self
    }

    pub fn properties<I, S>(self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        names.into_iter().fold(self, |schema, name| schema.property(name))
    }

    pub fn connection(mut self, name: impl Into<String>, mut descriptor: ConnectionDescriptor) -> Self {
        let name = name.into();
        descriptor.name = name.clone();
        self.connections.insert(name, descriptor);
        self
    }

    pub fn derived<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Instance) -> Result<Value> + Send + Sync + 'static,
    {
        self.derived.insert(name.into(), Arc::new(f));
        self
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn declared_properties(&self) -> &[String] {
        &self.properties
    }

    pub fn connections(&self) -> impl Iterator<Item = &ConnectionDescriptor> {
        self.connections.values()
    }

    pub fn connection_descriptor(&self, name: &str) -> Option<&ConnectionDescriptor> {
        self.connections.get(name)
    }

    /// Declared properties plus the `id` and `type` identity keys.
    pub fn has_property(&self, name: &str) -> bool {
        crate::model::RESERVED_KEYS.contains(&name) || self.properties.iter().any(|p| p == name)
    }

    pub(crate) fn derived_fn(&self, name: &str) -> Option<&DerivedFn> {
        self.derived.get(name)
    }
}

impl std::fmt::Debug for ModelSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelSchema")
            .field("type_name", &self.type_name)
            .field("properties", &self.properties)
            .field("connections", &self.connections)
            .field("derived", &self.derived.keys().collect::<Vec<_>>())
            .finish()
    }
}
