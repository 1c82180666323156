//! Vertex in the property graph.

use serde::{Deserialize, Serialize};
use super::{PropertyMap, Value};

/// Opaque vertex identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VertexId(pub String);

impl VertexId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for VertexId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// Lets `&str` look up `VertexId`-keyed maps. Hash/Eq agree with `str`.
impl std::borrow::Borrow<str> for VertexId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for VertexId {
    fn from(s: &str) -> Self { VertexId(s.to_owned()) }
}

impl From<String> for VertexId {
    fn from(s: String) -> Self { VertexId(s) }
}

impl From<&VertexId> for VertexId {
    fn from(id: &VertexId) -> Self { id.clone() }
}

/// A vertex record: id, fixed type and mutable properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    pub id: VertexId,
    #[serde(rename = "type")]
    pub vertex_type: String,
    pub properties: PropertyMap,
}

impl Vertex {
    pub fn new(id: impl Into<VertexId>, vertex_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            vertex_type: vertex_type.into(),
            properties: PropertyMap::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Property lookup. `id` and `type` resolve to the vertex identity.
    pub fn get(&self, key: &str) -> Option<Value> {
        match key {
            "id" => Some(Value::String(self.id.0.clone())),
            "type" => Some(Value::String(self.vertex_type.clone())),
            _ => self.properties.get(key).cloned(),
        }
    }
}
