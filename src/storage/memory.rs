//! In-memory graph store.
//!
//! A directed, labeled multigraph kept in four flat id-indexed maps:
//! vertex records, forward adjacency (`origin → target → types`), backward
//! adjacency (`target → origin → types`) and the type index
//! (`type → vertex ids`). Every other layer reaches vertex and edge data
//! through this store; nothing else owns it.
//!
//! ## Invariants
//!
//! - `edges_from[a][b]` exists iff `edges_to[b][a]` exists, and both hold
//!   the same set of edge types.
//! - A type set is never empty; the entry is pruned with its last type.
//! - Every vertex has (possibly empty) forward and backward entries.
//!
//! ## Concurrency
//!
//! `Graph` is a cheap handle over `Arc` state behind one `RwLock`, so each
//! mutating call is atomic with respect to itself. Sequences returned by
//! the store copy the single adjacency entry (or id bucket) they expand and
//! hold no lock while they are driven. Sequences of calls are not isolated
//! from each other; a host with several writers must serialize them.

use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use parking_lot::RwLock;
use smallvec::SmallVec;
use tracing::debug;

use crate::model::*;
use crate::seq::Seq;
use crate::{Error, Result};
use super::event::{EventSink, GraphEvent};
use super::snapshot::Snapshot;

/// Edge types between one ordered vertex pair. Almost always one or two.
pub type TypeSet = SmallVec<[String; 2]>;

/// Neighbor id → edge types, for one side of one vertex.
pub type Adjacency = IndexMap<VertexId, TypeSet>;

// ============================================================================
// Graph
// ============================================================================

/// In-memory multigraph store.
#[derive(Clone, Default)]
pub struct Graph {
    inner: Arc<GraphInner>,
}

#[derive(Default)]
struct GraphInner {
    state: RwLock<GraphState>,
    sinks: RwLock<Vec<Arc<dyn EventSink>>>,
}

#[derive(Default)]
struct GraphState {
    vertices: IndexMap<VertexId, Vertex>,
    edges_from: IndexMap<VertexId, Adjacency>,
    edges_to: IndexMap<VertexId, Adjacency>,
    type_index: IndexMap<String, IndexSet<VertexId>>,
}

impl GraphState {
    fn link(&mut self, origin: &str, target: &str, edge_type: &str) -> bool {
        let Some(forward) = self.edges_from.get_mut(origin) else { return false };
        let types = forward.entry(VertexId::from(target)).or_default();
        if types.iter().any(|t| t == edge_type) {
            return false;
        }
        types.push(edge_type.to_string());

        let backward = self.edges_to.entry(VertexId::from(target)).or_default();
        backward.entry(VertexId::from(origin)).or_default().push(edge_type.to_string());
        true
    }

    fn unlink(&mut self, origin: &str, target: &str, edge_type: &str) -> bool {
        let Some(forward) = self.edges_from.get_mut(origin) else { return false };
        let Some(types) = forward.get_mut(target) else { return false };
        let Some(pos) = types.iter().position(|t| t == edge_type) else { return false };
        types.remove(pos);
        if types.is_empty() {
            forward.shift_remove(target);
        }

        if let Some(backward) = self.edges_to.get_mut(target) {
            if let Some(types) = backward.get_mut(origin) {
                types.retain(|t| t != edge_type);
                if types.is_empty() {
                    backward.shift_remove(origin);
                }
            }
        }
        true
    }

    fn has_edge(&self, origin: &str, target: &str, edge_type: &str) -> bool {
        self.edges_from
            .get(origin)
            .and_then(|adj| adj.get(target))
            .is_some_and(|types| types.iter().any(|t| t == edge_type))
    }
}

/// Copy one side of one vertex's adjacency.
fn copy_entries(adj: Option<&Adjacency>) -> Vec<(VertexId, TypeSet)> {
    adj.map(|adj| adj.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
        .unwrap_or_default()
}

/// One edge per `(neighbor, type)` pair.
fn expand(source: VertexId, entries: Vec<(VertexId, TypeSet)>, outgoing: bool) -> Seq<'static, Edge> {
    Seq::new(entries.into_iter().flat_map(move |(other, types)| {
        let source = source.clone();
        types.into_iter().map(move |t| {
            if outgoing {
                Edge::new(source.clone(), other.clone(), t)
            } else {
                Edge::new(other.clone(), source.clone(), t)
            }
        })
    }))
}

fn missing(id: &str) -> Error {
    Error::Reference(format!("vertex {id} does not exist"))
}

/// Check one adjacency side of a snapshot against the vertices and the
/// opposite side. `side[a][b]` must equal `other[b][a]` as a set.
fn check_side(
    vertices: &IndexMap<VertexId, Vertex>,
    side: &IndexMap<VertexId, Adjacency>,
    other: &IndexMap<VertexId, Adjacency>,
    label: &str,
) -> Result<()> {
    for (id, adj) in side {
        if !vertices.contains_key(id) {
            return Err(Error::Snapshot(format!("{label} adjacency for unknown vertex {id}")));
        }
        for (neighbor, types) in adj {
            if !vertices.contains_key(neighbor) {
                return Err(Error::Snapshot(format!(
                    "{label} adjacency of {id} names unknown vertex {neighbor}"
                )));
            }
            let distinct = types.iter().enumerate().all(|(i, t)| !types[..i].contains(t));
            if types.is_empty() || !distinct {
                return Err(Error::Snapshot(format!(
                    "{label} edge types between {id} and {neighbor} are empty or repeated"
                )));
            }
            let mirrored = other.get(neighbor).and_then(|adj| adj.get(id)).is_some_and(|m| {
                m.len() == types.len() && types.iter().all(|t| m.contains(t))
            });
            if !mirrored {
                return Err(Error::Snapshot(format!(
                    "{label} edges between {id} and {neighbor} are not mirrored"
                )));
            }
        }
    }
    Ok(())
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether two handles point at the same store.
    pub fn ptr_eq(&self, other: &Graph) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Register a change event receiver.
    pub fn subscribe(&self, sink: Arc<dyn EventSink>) {
        self.inner.sinks.write().push(sink);
    }

    fn emit(&self, event: GraphEvent) {
        let sinks = self.inner.sinks.read().clone();
        for sink in &sinks {
            sink.emit(&event);
        }
    }

    // ========================================================================
    // Vertex CRUD
    // ========================================================================

    /// Insert or replace a vertex.
    ///
    /// The id is (re)added to the bucket of `vertex_type`. Changing the type
    /// of an existing vertex is not supported: the old bucket keeps the id.
    /// `id` and `type` keys in `props` are dropped; they are not properties.
    pub fn set_vertex(
        &self,
        id: impl Into<VertexId>,
        vertex_type: impl Into<String>,
        mut props: PropertyMap,
    ) {
        let id = id.into();
        let vertex_type = vertex_type.into();
        for key in RESERVED_KEYS {
            props.remove(key);
        }
        let vertex = Vertex { id: id.clone(), vertex_type: vertex_type.clone(), properties: props };

        let previous = {
            let mut state = self.inner.state.write();
            if !state.vertices.contains_key(&id) {
                state.edges_from.insert(id.clone(), Adjacency::new());
                state.edges_to.insert(id.clone(), Adjacency::new());
            }
            state.type_index.entry(vertex_type).or_default().insert(id.clone());
            state.vertices.insert(id.clone(), vertex.clone())
        };

        match previous {
            Some(previous) => {
                debug!("Replaced vertex {}", id);
                self.emit(GraphEvent::UpdateNode { previous, current: vertex });
            }
            None => {
                debug!("Created vertex {} of type {}", id, vertex.vertex_type);
                self.emit(GraphEvent::CreateNode { vertex });
            }
        }
    }

    /// Write one property, preserving the others.
    pub fn set_property(&self, id: &str, key: &str, value: Value) -> Result<()> {
        if RESERVED_KEYS.contains(&key) {
            return Err(Error::ReservedKey(key.to_string()));
        }

        let (previous, current) = {
            let mut state = self.inner.state.write();
            let vertex = state.vertices.get_mut(id).ok_or_else(|| missing(id))?;
            let previous = vertex.clone();
            vertex.properties.insert(key.to_string(), value);
            (previous, vertex.clone())
        };

        debug!("Set property {} on vertex {}", key, id);
        self.emit(GraphEvent::UpdateNode { previous, current });
        Ok(())
    }

    pub fn vertex(&self, id: &str) -> Option<Vertex> {
        self.inner.state.read().vertices.get(id).cloned()
    }

    pub fn has_vertex(&self, id: &str) -> bool {
        self.inner.state.read().vertices.contains_key(id)
    }

    pub fn vertex_type(&self, id: &str) -> Option<String> {
        self.inner.state.read().vertices.get(id).map(|v| v.vertex_type.clone())
    }

    /// Read one property without copying the whole record.
    pub fn property(&self, id: &str, key: &str) -> Option<Value> {
        self.inner.state.read().vertices.get(id).and_then(|v| v.get(key))
    }

    /// Delete a vertex and every incident edge.
    ///
    /// Returns the removed edges, outgoing first. Fails with a reference
    /// error if the vertex does not exist.
    pub fn remove_vertex(&self, id: &str) -> Result<Vec<Edge>> {
        let (vertex, removed) = {
            let mut state = self.inner.state.write();
            let vertex_type = state
                .vertices
                .get(id)
                .map(|v| v.vertex_type.clone())
                .ok_or_else(|| missing(id))?;
            if let Some(bucket) = state.type_index.get_mut(&vertex_type) {
                bucket.shift_remove(id);
            }

            let vid = VertexId::from(id);
            let mut removed = Vec::new();
            for edge in expand(vid.clone(), copy_entries(state.edges_from.get(id)), true) {
                state.unlink(edge.origin.as_str(), edge.target.as_str(), &edge.edge_type);
                removed.push(edge);
            }
            // Self-loops were already removed with the outgoing side.
            for edge in expand(vid, copy_entries(state.edges_to.get(id)), false) {
                state.unlink(edge.origin.as_str(), edge.target.as_str(), &edge.edge_type);
                removed.push(edge);
            }

            state.edges_from.shift_remove(id);
            state.edges_to.shift_remove(id);
            (state.vertices.shift_remove(id), removed)
        };

        debug!("Deleted vertex {} with {} edges", id, removed.len());
        if let Some(vertex) = vertex {
            self.emit(GraphEvent::DeleteNode { vertex, edges: removed.clone() });
        }
        Ok(removed)
    }

    // ========================================================================
    // Edge CRUD
    // ========================================================================

    /// Add the edge `(origin, target, edge_type)`.
    ///
    /// Idempotent: returns `false` if the edge already existed. Fails with a
    /// reference error if either endpoint is missing.
    pub fn set_edge(&self, origin: &str, target: &str, edge_type: &str) -> Result<bool> {
        let created = {
            let mut state = self.inner.state.write();
            if !state.vertices.contains_key(origin) {
                return Err(missing(origin));
            }
            if !state.vertices.contains_key(target) {
                return Err(missing(target));
            }
            state.link(origin, target, edge_type)
        };

        if created {
            debug!("Created edge {} -[{}]-> {}", origin, edge_type, target);
            self.emit(GraphEvent::MakeEdge { edge: Edge::new(origin, target, edge_type) });
        }
        Ok(created)
    }

    /// Remove the edge if present. Returns whether it existed; never fails.
    pub fn remove_edge(&self, origin: &str, target: &str, edge_type: &str) -> bool {
        let removed = self.inner.state.write().unlink(origin, target, edge_type);
        if removed {
            debug!("Deleted edge {} -[{}]-> {}", origin, edge_type, target);
            self.emit(GraphEvent::DeleteEdge { edge: Edge::new(origin, target, edge_type) });
        }
        removed
    }

    pub fn has_edge(&self, origin: &str, target: &str, edge_type: &str) -> bool {
        self.inner.state.read().has_edge(origin, target, edge_type)
    }

    pub fn edge(&self, origin: &str, target: &str, edge_type: &str) -> Option<Edge> {
        self.has_edge(origin, target, edge_type)
            .then(|| Edge::new(origin, target, edge_type))
    }

    // ========================================================================
    // Traversal
    // ========================================================================

    /// Edges leaving `origin`, one per `(target, type)` pair.
    pub fn out_edges(&self, origin: &str) -> Seq<'static, Edge> {
        let entries = copy_entries(self.inner.state.read().edges_from.get(origin));
        expand(VertexId::from(origin), entries, true)
    }

    /// Edges arriving at `target`, one per `(origin, type)` pair.
    pub fn in_edges(&self, target: &str) -> Seq<'static, Edge> {
        let entries = copy_entries(self.inner.state.read().edges_to.get(target));
        expand(VertexId::from(target), entries, false)
    }

    /// All edge types between one ordered pair.
    pub fn inter_edges(&self, origin: &str, target: &str) -> Seq<'static, Edge> {
        let types = self
            .inner
            .state
            .read()
            .edges_from
            .get(origin)
            .and_then(|adj| adj.get(target))
            .cloned()
            .unwrap_or_default();
        expand(VertexId::from(origin), vec![(VertexId::from(target), types)], true)
    }

    /// Incoming edges, then outgoing edges.
    pub fn all_edges(&self, id: &str) -> Seq<'static, Edge> {
        let incoming = self.in_edges(id);
        let outgoing = self.out_edges(id);
        Seq::new(incoming.chain(outgoing))
    }

    pub fn edges(&self, id: &str, dir: Direction) -> Seq<'static, Edge> {
        match dir {
            Direction::Outgoing => self.out_edges(id),
            Direction::Incoming => self.in_edges(id),
            Direction::Both => self.all_edges(id),
        }
    }

    /// All vertices, or only those of `vertex_type`, in insertion order.
    ///
    /// Vertices removed while the sequence is being driven are skipped.
    pub fn vertices(&self, vertex_type: Option<&str>) -> Seq<'static, Vertex> {
        let ids: Vec<VertexId> = {
            let state = self.inner.state.read();
            match vertex_type {
                Some(t) => state
                    .type_index
                    .get(t)
                    .map(|bucket| bucket.iter().cloned().collect())
                    .unwrap_or_default(),
                None => state.vertices.keys().cloned().collect(),
            }
        };
        let graph = self.clone();
        Seq::new(ids.into_iter().filter_map(move |id| graph.vertex(id.as_str())))
    }

    // ========================================================================
    // Introspection
    // ========================================================================

    pub fn vertex_count(&self) -> usize {
        self.inner.state.read().vertices.len()
    }

    pub fn edge_count(&self) -> usize {
        self.inner
            .state
            .read()
            .edges_from
            .values()
            .flat_map(|adj| adj.values())
            .map(TypeSet::len)
            .sum()
    }

    /// Vertex types that currently have at least one vertex.
    pub fn types(&self) -> Vec<String> {
        self.inner
            .state
            .read()
            .type_index
            .iter()
            .filter(|(_, ids)| !ids.is_empty())
            .map(|(t, _)| t.clone())
            .collect()
    }

    // ========================================================================
    // Snapshot
    // ========================================================================

    /// Copy the four internal maps. Take it between mutating calls.
    pub fn snapshot(&self) -> Snapshot {
        let state = self.inner.state.read();
        Snapshot {
            vertices: state.vertices.clone(),
            edges_from: state.edges_from.clone(),
            edges_to: state.edges_to.clone(),
            type_index: state.type_index.clone(),
        }
    }

    /// Rebuild a store from a snapshot, checking the adjacency invariants.
    ///
    /// Every adjacency key and neighbor must be a known vertex, every type
    /// set must be non-empty without duplicates and mirrored exactly on the
    /// other side, and the type index must agree with the vertex records.
    pub fn from_snapshot(snapshot: Snapshot) -> Result<Self> {
        let Snapshot { vertices, mut edges_from, mut edges_to, type_index } = snapshot;

        check_side(&vertices, &edges_from, &edges_to, "outgoing")?;
        check_side(&vertices, &edges_to, &edges_from, "incoming")?;

        for (vertex_type, bucket) in &type_index {
            for id in bucket {
                match vertices.get(id) {
                    Some(v) if &v.vertex_type == vertex_type => {}
                    Some(v) => {
                        return Err(Error::Snapshot(format!(
                            "vertex {id} of type {} indexed under {vertex_type}",
                            v.vertex_type
                        )));
                    }
                    None => {
                        return Err(Error::Snapshot(format!(
                            "type index {vertex_type} names unknown vertex {id}"
                        )));
                    }
                }
            }
        }
        for (id, vertex) in &vertices {
            let indexed = type_index.get(&vertex.vertex_type).is_some_and(|b| b.contains(id));
            if !indexed {
                return Err(Error::Snapshot(format!(
                    "vertex {id} missing from type index {}",
                    vertex.vertex_type
                )));
            }
        }

        for id in vertices.keys() {
            edges_from.entry(id.clone()).or_default();
            edges_to.entry(id.clone()).or_default();
        }

        debug!("Restored {} vertices from snapshot", vertices.len());
        let graph = Graph::new();
        *graph.inner.state.write() = GraphState { vertices, edges_from, edges_to, type_index };
        Ok(graph)
    }

    /// Apply a change event as a mutation on this store.
    pub fn apply(&self, event: &GraphEvent) -> Result<()> {
        match event {
            GraphEvent::CreateNode { vertex } | GraphEvent::UpdateNode { current: vertex, .. } => {
                self.set_vertex(vertex.id.clone(), vertex.vertex_type.clone(), vertex.properties.clone());
            }
            GraphEvent::DeleteNode { vertex, .. } => {
                if self.has_vertex(vertex.id.as_str()) {
                    self.remove_vertex(vertex.id.as_str())?;
                }
            }
            GraphEvent::MakeEdge { edge } => {
                self.set_edge(edge.origin.as_str(), edge.target.as_str(), &edge.edge_type)?;
            }
            GraphEvent::DeleteEdge { edge } => {
                self.remove_edge(edge.origin.as_str(), edge.target.as_str(), &edge.edge_type);
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for Graph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Graph")
            .field("vertices", &self.vertex_count())
            .field("edges", &self.edge_count())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
