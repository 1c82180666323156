//! End-to-end tests for the schema-driven model layer.
//!
//! People and places over one store: properties read live from the store,
//! mutual and reverse connections keep both directions in step, single
//! connections are exclusive, and instances export to plain records.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use syno::{
    ConnectionDescriptor, Error, Factory, Graph, GraphConfig, GraphEvent, Instance, ModelSchema,
    Models, RecordingSink, Value, props,
};

// ============================================================================
// Helper: a small world with two model types
// ============================================================================

struct World {
    models: Models,
    person: Factory,
    place: Factory,
    foo: Instance,
    bar: Instance,
    uk: Instance,
}

fn setup() -> World {
    let models = Models::with_config(Graph::new(), GraphConfig::sequential("n"));
    let person = models.register(
        ModelSchema::new("Person")
            .properties(["name", "age"])
            .connection("friends", ConnectionDescriptor::collection().mutual())
            .connection("visited", ConnectionDescriptor::collection().reverse("visitors"))
            .connection("bff", ConnectionDescriptor::single())
            .connection("mayorOf", ConnectionDescriptor::single().reverse("mayor"))
            .derived("hasBff", |me| Ok(Value::Bool(me.single("bff")?.is_set()))),
    );
    let place = models.register(
        ModelSchema::new("Place")
            .property("name")
            .connection("visitors", ConnectionDescriptor::collection().reverse("visited"))
            .connection("mayor", ConnectionDescriptor::single().reverse("mayorOf")),
    );

    let foo = person.create(props([("name", Value::from("foo")), ("age", Value::from(5))]));
    let bar = person.create(props([("name", Value::from("bar")), ("age", Value::from(7))]));
    let uk = place.create(props([("name", "UK")]));
    World { models, person, place, foo, bar, uk }
}

fn bffify(me: &Instance, other: &Instance) -> syno::Result<()> {
    let friends = me.collection("friends")?;
    if !friends.has(other)? {
        friends.add(other)?;
    }
    me.single("bff")?.set(Some(other))
}

fn name(i: &Instance) -> String {
    i.get("name").unwrap().and_then(|v| v.as_str().map(str::to_owned)).unwrap_or_default()
}

// ============================================================================
// 1. Initial state and factories
// ============================================================================

#[test]
fn test_initial_state() {
    let w = setup();
    assert_eq!(w.foo.collection("friends").unwrap().get().count(), 0);
    assert_eq!(w.bar.collection("friends").unwrap().get().count(), 0);
    assert_eq!(w.uk.collection("visitors").unwrap().get().count(), 0);
    assert_eq!(w.foo.id().as_str(), "n1");
    assert_eq!(w.uk.type_name(), "Place");
}

#[test]
fn test_find_and_get() {
    let w = setup();
    for p in w.person.find_all() {
        assert_eq!(name(&p), name(&w.person.get(p.id().clone())));
    }
    let older = w
        .person
        .find(|p| p.get("age").ok().flatten().and_then(|a| a.as_int()).is_some_and(|a| a > 6))
        .count();
    assert_eq!(older, 1);
    assert_eq!(w.person.find_all().count(), 2);
    assert_eq!(w.place.find_all().count(), 1);
}

// ============================================================================
// 2. Connections
// ============================================================================

#[test]
fn test_interactions() {
    let w = setup();
    w.foo.collection("visited").unwrap().add(&w.uk).unwrap();
    assert_eq!(w.uk.collection("visitors").unwrap().get().count(), 1);
    assert_eq!(w.foo.derived("hasBff").unwrap(), Value::Bool(false));

    bffify(&w.foo, &w.bar).unwrap();
    bffify(&w.bar, &w.foo).unwrap();
    w.foo.single("mayorOf").unwrap().set(Some(&w.uk)).unwrap();

    let mayor = w.uk.single("mayor").unwrap().get().unwrap();
    assert_eq!(name(&mayor), "foo");
    assert_eq!(w.foo.derived("hasBff").unwrap(), Value::Bool(true));

    let bff = w.foo.single("bff").unwrap().get().unwrap();
    assert_eq!(name(&bff), "bar");

    // Reads go back to the store.
    w.bar.set("name", "lolz").unwrap();
    assert_eq!(name(&w.foo.single("bff").unwrap().get().unwrap()), "lolz");
}

#[test]
fn test_mutual_and_reverse_are_symmetric() {
    let w = setup();
    w.foo.collection("friends").unwrap().add(&w.bar).unwrap();
    assert!(w.bar.collection("friends").unwrap().has(&w.foo).unwrap());

    w.uk.collection("visitors").unwrap().add(&w.bar).unwrap();
    assert!(w.bar.collection("visited").unwrap().has(&w.uk).unwrap());

    // Removing from either side removes both edges.
    w.bar.collection("visited").unwrap().remove(&w.uk).unwrap();
    assert!(!w.uk.collection("visitors").unwrap().has(&w.bar).unwrap());
    assert!(!w.models.graph().has_edge(w.uk.id().as_str(), w.bar.id().as_str(), "visitors"));
}

#[test]
fn test_remove_connections() {
    let w = setup();
    w.foo.collection("visited").unwrap().add(&w.uk).unwrap();
    bffify(&w.foo, &w.bar).unwrap();
    w.foo.single("mayorOf").unwrap().set(Some(&w.uk)).unwrap();

    w.foo.single("bff").unwrap().set(None).unwrap();
    w.foo.single("mayorOf").unwrap().clear();
    assert_eq!(w.foo.derived("hasBff").unwrap(), Value::Bool(false));
    assert!(w.uk.single("mayor").unwrap().get().is_none());

    w.foo.collection("visited").unwrap().remove(&w.uk).unwrap();
    assert!(!w.uk.collection("visitors").unwrap().has(&w.foo).unwrap());
}

#[test]
fn test_single_connection_is_exclusive() {
    let w = setup();
    let paris = w.place.create(props([("name", "Paris")]));

    w.foo.single("mayorOf").unwrap().set(Some(&w.uk)).unwrap();
    w.foo.single("mayorOf").unwrap().set(Some(&paris)).unwrap();

    assert_eq!(w.foo.single("mayorOf").unwrap().get(), Some(paris.clone()));
    assert!(w.uk.single("mayor").unwrap().get().is_none());
    assert_eq!(paris.single("mayor").unwrap().get(), Some(w.foo.clone()));
    assert_eq!(w.models.graph().out_edges(w.foo.id().as_str()).count(), 1);
}

#[test]
fn test_connection_ops_emit_events() {
    let w = setup();
    let sink = Arc::new(RecordingSink::new());
    w.models.graph().subscribe(sink.clone());

    w.foo.collection("visited").unwrap().add(&w.uk).unwrap();
    let made: Vec<String> = sink
        .take()
        .into_iter()
        .filter_map(|e| match e {
            GraphEvent::MakeEdge { edge } => Some(edge.edge_type),
            _ => None,
        })
        .collect();
    assert_eq!(made, vec!["visited", "visitors"]);
}

// ============================================================================
// 3. Validation
// ============================================================================

#[test]
fn test_invalid_models_are_rejected() {
    let w = setup();

    // Same type name, different store.
    let elsewhere = Models::new(Graph::new());
    let stranger = elsewhere.register(ModelSchema::new("Place").property("name")).create(props([("name", "X")]));

    let visited = w.foo.collection("visited").unwrap();
    assert!(matches!(visited.add(&stranger), Err(Error::TypeError { .. })));
    assert!(matches!(visited.has(&stranger), Err(Error::TypeError { .. })));
    assert!(matches!(visited.remove(&stranger), Err(Error::TypeError { .. })));
    assert!(matches!(w.foo.single("bff").unwrap().set(Some(&stranger)), Err(Error::TypeError { .. })));
}

#[test]
fn test_unknown_members() {
    let w = setup();
    assert!(matches!(w.foo.get("email"), Err(Error::UnknownField { .. })));
    assert!(matches!(w.foo.set("email", "x"), Err(Error::UnknownField { .. })));
    assert!(matches!(w.foo.single("friends"), Err(Error::UnknownField { .. })));
    assert!(matches!(w.foo.collection("bff"), Err(Error::UnknownField { .. })));
    assert!(matches!(w.foo.derived("isMayor"), Err(Error::UnknownField { .. })));
}

// ============================================================================
// 4. Export and removal
// ============================================================================

#[test]
fn test_to_js_round_trips_through_json() {
    let w = setup();
    let json = w.foo.to_json().unwrap();
    let back: syno::PropertyMap = serde_json::from_str(&json).unwrap();
    assert_eq!(back.get("name"), Some(&Value::from("foo")));
    assert_eq!(back.get("age"), Some(&Value::from(5)));
    assert_eq!(back.get("type"), Some(&Value::from("Person")));
    assert_eq!(back, w.foo.to_js());
}

#[test]
fn test_remove() {
    let w = setup();
    w.bar.collection("friends").unwrap().add(&w.foo).unwrap();
    let bar = w.bar.clone();
    let removed = bar.remove().unwrap();
    assert_eq!(removed.len(), 2);

    let older = w
        .person
        .find(|p| p.get("age").ok().flatten().and_then(|a| a.as_int()).is_some_and(|a| a > 6))
        .count();
    assert_eq!(older, 0);
    assert!(!w.bar.exists());
    assert_eq!(w.foo.collection("friends").unwrap().get().count(), 0);
}

#[test]
fn test_project_any_vertex() {
    let w = setup();
    let uk = w.models.project(w.uk.id().as_str()).unwrap();
    assert_eq!(uk, w.uk);
    assert_eq!(uk.type_name(), "Place");
}
