//! Model instances and their connection accessors.
//!
//! An `Instance` owns no data. It is a back-reference `(store, id, schema)`
//! and re-reads the store on every access, so changes made through any
//! other handle are visible immediately.

use std::sync::Arc;

use crate::model::{Edge, PropertyMap, Value, Vertex, VertexId};
use crate::seq::Seq;
use crate::storage::Graph;
use crate::{Error, Result};
use super::{ConnectionDescriptor, ModelSchema, Models};

/// Typed view over one vertex.
#[derive(Clone)]
pub struct Instance {
    models: Models,
    id: VertexId,
    schema: Arc<ModelSchema>,
}

impl Instance {
    pub(crate) fn new(models: Models, id: VertexId, schema: Arc<ModelSchema>) -> Self {
        Self { models, id, schema }
    }

    pub fn id(&self) -> &VertexId {
        &self.id
    }

    pub fn type_name(&self) -> &str {
        self.schema.type_name()
    }

    pub fn schema(&self) -> &ModelSchema {
        &self.schema
    }

    pub fn models(&self) -> &Models {
        &self.models
    }

    pub fn graph(&self) -> &Graph {
        self.models.graph()
    }

    pub fn exists(&self) -> bool {
        self.graph().has_vertex(self.id.as_str())
    }

    /// Current vertex record, if the vertex still exists.
    pub fn vertex(&self) -> Option<Vertex> {
        self.graph().vertex(self.id.as_str())
    }

    fn unknown(&self, field: &str) -> Error {
        Error::UnknownField {
            model: self.type_name().to_string(),
            field: field.to_string(),
        }
    }

    // ========================================================================
    // Properties
    // ========================================================================

    /// Live value of a declared property (or `id` / `type`).
    pub fn get(&self, property: &str) -> Result<Option<Value>> {
        if !self.schema.has_property(property) {
            return Err(self.unknown(property));
        }
        Ok(self.graph().property(self.id.as_str(), property))
    }

    /// Write one declared property; the others are preserved.
    pub fn set(&self, property: &str, value: impl Into<Value>) -> Result<()> {
        if !self.schema.has_property(property) {
            return Err(self.unknown(property));
        }
        self.graph().set_property(self.id.as_str(), property, value.into())
    }

    /// Evaluate a derived member against the current state.
    pub fn derived(&self, name: &str) -> Result<Value> {
        let f = self.schema.derived_fn(name).cloned().ok_or_else(|| self.unknown(name))?;
        f(self)
    }

    // ========================================================================
    // Connections
    // ========================================================================

    pub fn single(&self, name: &str) -> Result<SingleConnection<'_>> {
        match self.schema.connection_descriptor(name) {
            Some(descriptor) if !descriptor.collection => Ok(SingleConnection { owner: self, descriptor }),
            _ => Err(self.unknown(name)),
        }
    }

    pub fn collection(&self, name: &str) -> Result<CollectionConnection<'_>> {
        match self.schema.connection_descriptor(name) {
            Some(descriptor) if descriptor.collection => Ok(CollectionConnection { owner: self, descriptor }),
            _ => Err(self.unknown(name)),
        }
    }

    /// Reject instances from another store or of a type this registry does not know.
    fn check_model(&self, other: &Instance) -> Result<()> {
        let recognized = other.graph().ptr_eq(self.graph())
            && self.models.is_registered(other.type_name());
        if recognized {
            Ok(())
        } else {
            Err(Error::TypeError {
                expected: "model instance of this store".into(),
                got: format!("{} {}", other.type_name(), other.id),
            })
        }
    }

    /// The connection edge to `target` followed by its mirror, if declared.
    fn connection_edges(&self, descriptor: &ConnectionDescriptor, target: &VertexId) -> Vec<Edge> {
        let edge = Edge::new(self.id.clone(), target.clone(), descriptor.name.clone());
        let mirror = descriptor.mirror().map(|m| edge.mirrored(m));
        std::iter::once(edge).chain(mirror).collect()
    }

    fn link(&self, descriptor: &ConnectionDescriptor, target: &VertexId) -> Result<()> {
        let graph = self.graph();
        for edge in self.connection_edges(descriptor, target) {
            graph.set_edge(edge.origin.as_str(), edge.target.as_str(), &edge.edge_type)?;
        }
        Ok(())
    }

    fn unlink(&self, descriptor: &ConnectionDescriptor, target: &VertexId) {
        let graph = self.graph();
        for edge in self.connection_edges(descriptor, target) {
            graph.remove_edge(edge.origin.as_str(), edge.target.as_str(), &edge.edge_type);
        }
    }

    fn targets(&self, descriptor: &ConnectionDescriptor) -> Seq<'static, VertexId> {
        let name = descriptor.name.clone();
        self.graph()
            .out_edges(self.id.as_str())
            .filter(move |e| e.edge_type == name)
            .map(|e| e.target)
    }

    // ========================================================================
    // Export / lifecycle
    // ========================================================================

    /// Plain record of the declared properties plus `id` and `type`.
    ///
    /// Properties that are not set export as `null`.
    pub fn to_js(&self) -> PropertyMap {
        let vertex = self.vertex();
        let mut record: PropertyMap = self
            .schema
            .declared_properties()
            .iter()
            .map(|p| {
                let value = vertex.as_ref().and_then(|v| v.get(p)).unwrap_or(Value::Null);
                (p.clone(), value)
            })
            .collect();
        record.insert("id".into(), Value::String(self.id.0.clone()));
        record.insert("type".into(), Value::String(self.type_name().to_string()));
        record
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.to_js())?)
    }

    /// Delete the backing vertex and its edges.
    pub fn remove(self) -> Result<Vec<Edge>> {
        self.graph().remove_vertex(self.id.as_str())
    }
}

impl PartialEq for Instance {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.graph().ptr_eq(other.graph())
    }
}

impl std::fmt::Debug for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instance")
            .field("type", &self.type_name())
            .field("id", &self.id)
            .finish()
    }
}

// ============================================================================
// Single connection
// ============================================================================

/// Accessor for a single-cardinality connection.
///
/// Setting a value is exclusive: edges to any previous target (and their
/// mirrors) are removed first. Exclusivity is enforced from this side only.
pub struct SingleConnection<'i> {
    owner: &'i Instance,
    descriptor: &'i ConnectionDescriptor,
}

impl SingleConnection<'_> {
    /// First target by adjacency order, projected to its model type.
    pub fn get(&self) -> Option<Instance> {
        let models = self.owner.models();
        self.owner.targets(self.descriptor).find_map(|id| models.instance_of_id(&id))
    }

    pub fn is_set(&self) -> bool {
        self.owner.targets(self.descriptor).first().is_some()
    }

    /// `Some` replaces the current target; `None` clears it.
    pub fn set(&self, target: Option<&Instance>) -> Result<()> {
        match target {
            Some(target) => {
                self.owner.check_model(target)?;
                for existing in self.owner.targets(self.descriptor) {
                    if existing != target.id {
                        self.owner.unlink(self.descriptor, &existing);
                    }
                }
                self.owner.link(self.descriptor, &target.id)
            }
            None => {
                self.clear();
                Ok(())
            }
        }
    }

    /// Remove the current target edge and its mirror.
    pub fn clear(&self) {
        for existing in self.owner.targets(self.descriptor) {
            self.owner.unlink(self.descriptor, &existing);
        }
    }
}

// ============================================================================
// Collection connection
// ============================================================================

/// Accessor for a collection connection.
pub struct CollectionConnection<'i> {
    owner: &'i Instance,
    descriptor: &'i ConnectionDescriptor,
}

impl CollectionConnection<'_> {
    /// Lazily projected targets across all matching out-edges.
    pub fn get(&self) -> Seq<'static, Instance> {
        let models = self.owner.models().clone();
        Seq::new(
            self.owner
                .targets(self.descriptor)
                .filter_map(move |id| models.instance_of_id(&id)),
        )
    }

    pub fn has(&self, other: &Instance) -> Result<bool> {
        self.owner.check_model(other)?;
        Ok(self
            .owner
            .graph()
            .has_edge(self.owner.id.as_str(), other.id.as_str(), &self.descriptor.name))
    }

    pub fn add(&self, other: &Instance) -> Result<()> {
        self.owner.check_model(other)?;
        self.owner.link(self.descriptor, &other.id)
    }

    pub fn remove(&self, other: &Instance) -> Result<()> {
        self.owner.check_model(other)?;
        self.owner.unlink(self.descriptor, &other.id);
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
