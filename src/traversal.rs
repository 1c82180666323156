//! Traversal DSL: chains of "predecessors along a named edge type".
//!
//! A traversal is an immutable list of steps. `via` (and its synonyms
//! `of`, `that`, `who`, `which`) appends a step; `where_` replaces the
//! filter and limit of the last step. Every call returns a new traversal.
//!
//! Evaluation runs the steps last-declared first, so a chain reads outer to
//! inner: `bff.of.visited.of.ruledBy` starting with `x` is "the bff of
//! whoever visited what is ruled by `x`". Each hop follows *incoming* edges
//! of the step's type to their origins, caps each vertex's own fan-out with
//! the step's limit and de-duplicates the frontier before the next hop.
//!
//! ```
//! use syno::{Graph, Traversal, props};
//!
//! let g = Graph::new();
//! g.set_vertex("a", "T", props([("n", 1)]));
//! g.set_vertex("b", "T", props([("n", 2)]));
//! g.set_edge("a", "b", "parent").unwrap();
//!
//! let parents: Vec<_> = Traversal::raw(&g).via("parent").starting_with(syno::VertexId::from("b")).collect();
//! assert_eq!(parents[0].id.as_str(), "a");
//! ```

use std::sync::Arc;

use tracing::{debug, trace};

use crate::model::{Vertex, VertexId};
use crate::schema::{Instance, Models};
use crate::seq::Seq;
use crate::storage::Graph;

/// Filter applied to each vertex reached by a step.
pub type VertexPredicate = Arc<dyn Fn(&Vertex) -> bool + Send + Sync>;

// ============================================================================
// Seeds
// ============================================================================

/// Anything that identifies one vertex.
pub trait Node {
    fn node_id(&self) -> &VertexId;
}

impl Node for VertexId {
    fn node_id(&self) -> &VertexId { self }
}

impl Node for Vertex {
    fn node_id(&self) -> &VertexId { &self.id }
}

impl Node for Instance {
    fn node_id(&self) -> &VertexId { self.id() }
}

impl<T: Node + ?Sized> Node for &T {
    fn node_id(&self) -> &VertexId { (**self).node_id() }
}

/// Starting point of a traversal: one node, or any sequence of nodes.
pub trait Seeds<'a> {
    fn into_ids(self) -> Seq<'a, VertexId>;
}

impl<'a, T: Node + 'a> Seeds<'a> for T {
    fn into_ids(self) -> Seq<'a, VertexId> {
        Seq::once(self.node_id().clone())
    }
}

impl<'a, T: Node + 'a> Seeds<'a> for Vec<T> {
    fn into_ids(self) -> Seq<'a, VertexId> {
        Seq::new(self.into_iter().map(|n| n.node_id().clone()))
    }
}

impl<'a, T: Node + 'a> Seeds<'a> for Seq<'a, T> {
    fn into_ids(self) -> Seq<'a, VertexId> {
        self.map(|n| n.node_id().clone())
    }
}

// ============================================================================
// Projection
// ============================================================================

/// What a traversal yields for each vertex it reaches.
pub trait Projection: Clone + 'static {
    type Output: 'static;

    fn graph(&self) -> &Graph;

    /// `None` drops the vertex from the results.
    fn project(&self, vertex: Vertex) -> Option<Self::Output>;
}

/// Yield raw vertex records.
#[derive(Clone, Debug)]
pub struct Raw(Graph);

impl Projection for Raw {
    type Output = Vertex;

    fn graph(&self) -> &Graph {
        &self.0
    }

    fn project(&self, vertex: Vertex) -> Option<Vertex> {
        Some(vertex)
    }
}

/// Yield model instances, by vertex type.
impl Projection for Models {
    type Output = Instance;

    fn graph(&self) -> &Graph {
        Models::graph(self)
    }

    fn project(&self, vertex: Vertex) -> Option<Instance> {
        self.instance_of(&vertex)
    }
}

// ============================================================================
// Traversal
// ============================================================================

#[derive(Clone)]
struct Step {
    name: String,
    filter: Option<VertexPredicate>,
    limit: Option<usize>,
}

impl std::fmt::Debug for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Step")
            .field("name", &self.name)
            .field("filtered", &self.filter.is_some())
            .field("limit", &self.limit)
            .finish()
    }
}

/// Immutable traversal builder.
#[derive(Clone, Debug)]
pub struct Traversal<P: Projection = Models> {
    projection: P,
    steps: Vec<Step>,
}

impl Traversal<Models> {
    /// Traversal that yields model instances.
    pub fn new(models: &Models) -> Self {
        Self { projection: models.clone(), steps: Vec::new() }
    }
}

impl Traversal<Raw> {
    /// Traversal that yields raw vertices.
    pub fn raw(graph: &Graph) -> Self {
        Self { projection: Raw(graph.clone()), steps: Vec::new() }
    }
}

impl<P: Projection> Traversal<P> {
    /// Append a hop along the named relation.
    pub fn via(&self, name: impl Into<String>) -> Self {
        let mut steps = self.steps.clone();
        steps.push(Step { name: name.into(), filter: None, limit: None });
        Self { projection: self.projection.clone(), steps }
    }

    pub fn of(&self, name: impl Into<String>) -> Self { self.via(name) }
    pub fn that(&self, name: impl Into<String>) -> Self { self.via(name) }
    pub fn who(&self, name: impl Into<String>) -> Self { self.via(name) }
    pub fn which(&self, name: impl Into<String>) -> Self { self.via(name) }

    /// Replace the filter and per-vertex limit of the last step.
    ///
    /// A limit of zero means no limit. Without any step there is nothing to constrain and the traversal is
    /// returned unchanged.
    pub fn where_<F>(&self, filter: F, limit: Option<usize>) -> Self
    where
        F: Fn(&Vertex) -> bool + Send + Sync + 'static,
    {
        self.constrain(Some(Arc::new(filter)), limit)
    }

    /// Like [`where_`](Self::where_) with an optional, already shared filter.
    pub fn constrain(&self, filter: Option<VertexPredicate>, limit: Option<usize>) -> Self {
        let mut steps = self.steps.clone();
        match steps.last_mut() {
            Some(last) => {
                last.filter = filter;
                last.limit = limit.filter(|&n| n > 0);
            }
            None => debug!("Ignoring constraint on a traversal without steps"),
        }
        Self { projection: self.projection.clone(), steps }
    }

    /// Relation names, in declaration order.
    pub fn steps(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name.as_str()).collect()
    }

    /// Evaluate lazily from one node or a sequence of nodes.
    pub fn starting_with<'a, S: Seeds<'a>>(&self, seeds: S) -> Seq<'a, P::Output> {
        let graph = self.projection.graph().clone();
        let mut frontier = seeds.into_ids();

        for step in self.steps.iter().rev().cloned() {
            let graph = graph.clone();
            frontier = frontier
                .map(move |id| hop(&graph, &step, &id))
                .flatten()
                .unique_by(VertexId::clone);
        }

        let projection = self.projection.clone();
        Seq::new(
            frontier
                .filter_map(move |id| graph.vertex(id.as_str()))
                .filter_map(move |v| projection.project(v)),
        )
    }
}

/// Origins of `id`'s incoming edges of the step's type, filtered and capped.
fn hop(graph: &Graph, step: &Step, id: &VertexId) -> Seq<'static, VertexId> {
    trace!("Hop {} from {}", step.name, id);
    let name = step.name.clone();
    let lookup = graph.clone();
    let mut reached: Seq<'static, Vertex> = Seq::new(
        graph
            .in_edges(id.as_str())
            .filter(move |e| e.edge_type == name)
            .filter_map(move |e| lookup.vertex(e.origin.as_str())),
    );
    if let Some(filter) = step.filter.clone() {
        reached = reached.filter(move |v| filter(v));
    }
    if let Some(limit) = step.limit {
        reached = reached.limit(limit);
    }
    reached.map(|v| v.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GraphConfig;
    use crate::model::{props, PropertyMap, Value};
    use crate::schema::{ConnectionDescriptor, Factory, ModelSchema};
    use crate::Result;

    fn setup() -> (Models, Factory, Factory) {
        let models = Models::with_config(Graph::new(), GraphConfig::sequential("v"));
        let person = models.register(
            ModelSchema::new("Person")
                .properties(["name", "age"])
                .connection("friends", ConnectionDescriptor::collection().mutual())
                .connection("visited", ConnectionDescriptor::collection().reverse("visitors"))
                .connection("bff", ConnectionDescriptor::single())
                .connection("rulerOf", ConnectionDescriptor::single().reverse("ruledBy")),
        );
        let place = models.register(
            ModelSchema::new("Place")
                .property("name")
                .connection("visitors", ConnectionDescriptor::collection().reverse("visited"))
                .connection("ruledBy", ConnectionDescriptor::single().reverse("rulerOf")),
        );
        (models, person, place)
    }

    fn bffify(me: &Instance, other: &Instance) -> Result<()> {
        let friends = me.collection("friends")?;
        if !friends.has(other)? {
            friends.add(other)?;
        }
        me.single("bff")?.set(Some(other))
    }

    fn name_of(v: &Vertex) -> String {
        v.get("name").and_then(|n| n.as_str().map(str::to_string)).unwrap_or_default()
    }

    #[test]
    fn test_simple_query() {
        let (models, person, place) = setup();
        let foo = person.create(props([("name", Value::from("foo")), ("age", Value::from(5))]));
        let bar = person.create(props([("name", Value::from("bar")), ("age", Value::from(7))]));
        let uk = place.create(props([("name", "UK")]));

        foo.collection("visited").unwrap().add(&uk).unwrap();
        bffify(&foo, &bar).unwrap();
        bffify(&bar, &foo).unwrap();
        foo.single("rulerOf").unwrap().set(Some(&uk)).unwrap();

        let res: Vec<Instance> = Traversal::new(&models)
            .via("bff")
            .of("visited")
            .of("ruledBy")
            .starting_with(&foo)
            .collect();
        assert_eq!(res, vec![bar]);
    }

    #[test]
    fn test_complex_query_with_where() {
        let (models, person, place) = setup();
        let names = ["foo", "bar", "spam", "buzz", "meow"];
        let people: Vec<Instance> = names
            .iter()
            .map(|n| person.create(props([("name", *n)])))
            .collect();
        let (foo, bar, spam, buzz, meow) = (&people[0], &people[1], &people[2], &people[3], &people[4]);
        let uk = place.create(props([("name", "uk")]));
        let usa = place.create(props([("name", "usa")]));

        let friends = |p: &Instance, q: &Instance| p.collection("friends").unwrap().add(q).unwrap();
        friends(foo, bar);
        friends(foo, buzz);
        friends(foo, spam);
        friends(bar, spam);
        friends(bar, meow);
        friends(spam, meow);
        for p in [foo, bar, spam] {
            uk.collection("visitors").unwrap().add(p).unwrap();
        }
        for p in &people {
            usa.collection("visitors").unwrap().add(p).unwrap();
        }

        let query = Traversal::new(&models)
            .via("friends")
            .of("friends")
            .where_(|v| name_of(v).contains('a'), Some(5))
            .who("visited");
        let seeds = place.find(|p| {
            p.get("name").ok().flatten().and_then(|n| n.as_str().map(|s| s.starts_with('u'))).unwrap_or(false)
        });
        let res: Vec<Instance> = query.starting_with(seeds).collect();

        assert_eq!(res.len(), 4);
        assert!(!res.contains(buzz));
    }

    #[test]
    fn test_where_does_not_mutate_original() {
        let (models, _, _) = setup();
        let base = Traversal::new(&models).via("friends");
        let narrowed = base.where_(|_| false, Some(1));
        assert!(base.steps[0].filter.is_none());
        assert!(narrowed.steps[0].filter.is_some());
        assert_eq!(narrowed.steps(), vec!["friends"]);
    }

    #[test]
    fn test_limit_caps_each_vertex_fanout() {
        let g = Graph::new();
        for id in ["s1", "s2", "a", "b", "c", "d"] {
            g.set_vertex(id, "T", props([("name", id)]));
        }
        for (o, t) in [("a", "s1"), ("b", "s1"), ("c", "s2"), ("d", "s2")] {
            g.set_edge(o, t, "e").unwrap();
        }

        let seeds = vec![VertexId::from("s1"), VertexId::from("s2")];
        let res: Vec<Vertex> = Traversal::raw(&g).via("e").where_(|_| true, Some(1)).starting_with(seeds).collect();
        let mut names: Vec<String> = res.iter().map(name_of).collect();
        names.sort();
        assert_eq!(names, vec!["a", "c"]);
    }

    #[test]
    fn test_zero_limit_is_unlimited() {
        let g = Graph::new();
        for id in ["s", "a", "b"] {
            g.set_vertex(id, "T", props([("name", id)]));
        }
        g.set_edge("a", "s", "e").unwrap();
        g.set_edge("b", "s", "e").unwrap();

        let query = Traversal::raw(&g).via("e").where_(|_| true, Some(0));
        assert_eq!(query.steps[0].limit, None);
        assert_eq!(query.starting_with(VertexId::from("s")).count(), 2);
    }

    #[test]
    fn test_dedup_between_hops() {
        let g = Graph::new();
        for id in ["root", "x", "y", "top"] {
            g.set_vertex(id, "T", PropertyMap::new());
        }
        g.set_edge("x", "root", "e").unwrap();
        g.set_edge("y", "root", "e").unwrap();
        g.set_edge("top", "x", "e").unwrap();
        g.set_edge("top", "y", "e").unwrap();

        let res: Vec<Vertex> = Traversal::raw(&g).via("e").of("e").starting_with(VertexId::from("root")).collect();
        assert_eq!(res.len(), 1);
        assert_eq!(res[0].id.as_str(), "top");
    }

    #[test]
    fn test_no_steps_yields_seeds() {
        let (models, person, _) = setup();
        let foo = person.create(props([("name", "foo")]));
        let res: Vec<Instance> = Traversal::new(&models).starting_with(foo.clone()).collect();
        assert_eq!(res, vec![foo]);
    }
}
