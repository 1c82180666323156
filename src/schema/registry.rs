//! Per-store model registry and factories.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::config::{GraphConfig, IdGenerator};
use crate::model::{PropertyMap, Vertex, VertexId};
use crate::seq::Seq;
use crate::storage::Graph;
use crate::{Error, Result};
use super::{Instance, ModelSchema};

/// A store plus the model types registered against it.
///
/// Cloning is cheap and clones share the registry. Two `Models` built
/// separately over the same store do not see each other's registrations.
#[derive(Clone)]
pub struct Models {
    graph: Graph,
    registry: Arc<Registry>,
}

struct Registry {
    schemas: RwLock<HashMap<String, Arc<ModelSchema>>>,
    ids: IdGenerator,
}

impl Models {
    pub fn new(graph: Graph) -> Self {
        Self::with_config(graph, GraphConfig::default())
    }

    pub fn with_config(graph: Graph, config: GraphConfig) -> Self {
        Self {
            graph,
            registry: Arc::new(Registry {
                schemas: RwLock::new(HashMap::new()),
                ids: IdGenerator::new(config.id_strategy),
            }),
        }
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Register (or replace) a model type and return its factory.
    pub fn register(&self, schema: ModelSchema) -> Factory {
        let schema = Arc::new(schema);
        debug!("Registered model {}", schema.type_name());
        self.registry
            .schemas
            .write()
            .insert(schema.type_name().to_string(), schema.clone());
        Factory { models: self.clone(), schema }
    }

    pub fn schema(&self, type_name: &str) -> Option<Arc<ModelSchema>> {
        self.registry.schemas.read().get(type_name).cloned()
    }

    pub fn is_registered(&self, type_name: &str) -> bool {
        self.registry.schemas.read().contains_key(type_name)
    }

    pub fn factory(&self, type_name: &str) -> Result<Factory> {
        let schema = self
            .schema(type_name)
            .ok_or_else(|| Error::UnregisteredType(type_name.to_string()))?;
        Ok(Factory { models: self.clone(), schema })
    }

    /// Whether both handles share a registry.
    pub fn ptr_eq(&self, other: &Models) -> bool {
        Arc::ptr_eq(&self.registry, &other.registry)
    }

    /// Wrap an existing vertex as an instance of its registered type.
    pub fn project(&self, id: &str) -> Result<Instance> {
        let vertex_type = self
            .graph
            .vertex_type(id)
            .ok_or_else(|| Error::Reference(format!("vertex {id} does not exist")))?;
        let schema = self
            .schema(&vertex_type)
            .ok_or(Error::UnregisteredType(vertex_type))?;
        Ok(Instance::new(self.clone(), VertexId::from(id), schema))
    }

    /// Projection used inside lazy sequences: unprojectable vertices are skipped.
    pub(crate) fn instance_of(&self, vertex: &Vertex) -> Option<Instance> {
        match self.schema(&vertex.vertex_type) {
            Some(schema) => Some(Instance::new(self.clone(), vertex.id.clone(), schema)),
            None => {
                warn!("Skipping vertex {} of unregistered type {}", vertex.id, vertex.vertex_type);
                None
            }
        }
    }

    pub(crate) fn instance_of_id(&self, id: &VertexId) -> Option<Instance> {
        self.graph.vertex(id.as_str()).and_then(|v| self.instance_of(&v))
    }

    pub(crate) fn mint_id(&self) -> VertexId {
        self.registry.ids.mint()
    }
}

impl std::fmt::Debug for Models {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut types: Vec<String> = self.registry.schemas.read().keys().cloned().collect();
        types.sort();
        f.debug_struct("Models")
            .field("graph", &self.graph)
            .field("types", &types)
            .finish()
    }
}

// ============================================================================
// Factory
// ============================================================================

/// Creates, wraps and enumerates instances of one model type.
#[derive(Clone, Debug)]
pub struct Factory {
    models: Models,
    schema: Arc<ModelSchema>,
}

impl Factory {
    pub fn type_name(&self) -> &str {
        self.schema.type_name()
    }

    pub fn schema(&self) -> &ModelSchema {
        &self.schema
    }

    pub fn models(&self) -> &Models {
        &self.models
    }

    /// Mint a fresh id, store the vertex and return its instance.
    pub fn create(&self, props: PropertyMap) -> Instance {
        let id = self.models.mint_id();
        self.models.graph().set_vertex(id.clone(), self.type_name(), props);
        Instance::new(self.models.clone(), id, self.schema.clone())
    }

    /// Wrap an id as an instance of this type. Existence is not checked.
    pub fn get(&self, id: impl Into<VertexId>) -> Instance {
        Instance::new(self.models.clone(), id.into(), self.schema.clone())
    }

    /// Instances of this type accepted by `predicate`, in creation order.
    pub fn find<'a, P>(&self, predicate: P) -> Seq<'a, Instance>
    where
        P: FnMut(&Instance) -> bool + 'a,
    {
        let all: Seq<'a, Instance> = self.find_all();
        all.filter(predicate)
    }

    pub fn find_all(&self) -> Seq<'static, Instance> {
        let models = self.models.clone();
        let schema = self.schema.clone();
        self.models
            .graph()
            .vertices(Some(self.type_name()))
            .map(move |v| Instance::new(models.clone(), v.id, schema.clone()))
    }
}
