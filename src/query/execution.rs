//! Projection of traversal results into plain nested records.

use serde::{Deserialize, Serialize};

use crate::model::{PropertyMap, Value, Vertex};
use crate::seq::Seq;
use crate::storage::Graph;
use crate::{Error, Result};
use super::{Predicate, Select};

// ============================================================================
// Result rows
// ============================================================================

/// One projected vertex. Nested connections hold lists of maps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultRow {
    pub values: PropertyMap,
}

impl ResultRow {
    /// Get a typed value from the row.
    pub fn get<T: FromValue>(&self, key: &str) -> Result<T> {
        let val = self.values.get(key).ok_or_else(|| Error::UnknownField {
            model: "result row".into(),
            field: key.into(),
        })?;
        T::from_value(val)
    }

    pub fn into_value(self) -> Value {
        Value::Map(self.values)
    }
}

/// Convert from Value to concrete types.
pub trait FromValue: Sized {
    fn from_value(val: &Value) -> Result<Self>;
}

fn mismatch(expected: &str, val: &Value) -> Error {
    Error::TypeError { expected: expected.into(), got: val.type_name().into() }
}

impl FromValue for Value {
    fn from_value(val: &Value) -> Result<Self> {
        Ok(val.clone())
    }
}

impl FromValue for String {
    fn from_value(val: &Value) -> Result<Self> {
        val.as_str().map(str::to_owned).ok_or_else(|| mismatch("string", val))
    }
}

impl FromValue for i64 {
    fn from_value(val: &Value) -> Result<Self> {
        val.as_int().ok_or_else(|| mismatch("integer", val))
    }
}

impl FromValue for f64 {
    fn from_value(val: &Value) -> Result<Self> {
        val.as_float().ok_or_else(|| mismatch("number", val))
    }
}

impl FromValue for bool {
    fn from_value(val: &Value) -> Result<Self> {
        val.as_bool().ok_or_else(|| mismatch("boolean", val))
    }
}

impl FromValue for ResultRow {
    fn from_value(val: &Value) -> Result<Self> {
        val.as_map()
            .map(|m| ResultRow { values: m.clone() })
            .ok_or_else(|| mismatch("object", val))
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(val: &Value) -> Result<Self> {
        val.as_list()
            .ok_or_else(|| mismatch("array", val))?
            .iter()
            .map(T::from_value)
            .collect()
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(val: &Value) -> Result<Self> {
        match val {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

// ============================================================================
// Compiled projection
// ============================================================================

/// A [`Select`] with every nested filter compiled.
#[derive(Debug, Clone)]
pub struct SelectPlan {
    properties: Vec<String>,
    connections: Vec<ConnectionPlan>,
}

#[derive(Debug, Clone)]
struct ConnectionPlan {
    name: String,
    select: SelectPlan,
    filter: Option<Predicate>,
    limit: Option<usize>,
}

impl SelectPlan {
    pub fn compile(select: &Select) -> Result<Self> {
        let connections = select
            .connections
            .iter()
            .map(|(name, conn)| {
                Ok(ConnectionPlan {
                    name: name.clone(),
                    select: SelectPlan::compile(&conn.select)?,
                    filter: conn.filter.as_ref().map(Predicate::compile).transpose()?,
                    limit: conn.limit.filter(|&n| n > 0),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { properties: select.properties.clone(), connections })
    }

    /// Project every vertex of `source`. Missing properties come out as null.
    pub fn project(&self, graph: &Graph, source: impl Iterator<Item = Vertex>) -> Vec<ResultRow> {
        source.map(|v| self.project_one(graph, &v)).collect()
    }

    fn project_one(&self, graph: &Graph, vertex: &Vertex) -> ResultRow {
        let mut values = PropertyMap::with_capacity(self.properties.len() + self.connections.len());
        for prop in &self.properties {
            values.insert(prop.clone(), vertex.get(prop).unwrap_or(Value::Null));
        }

        for conn in &self.connections {
            let name = conn.name.clone();
            let lookup = graph.clone();
            let mut targets: Seq<'_, Vertex> = Seq::new(
                graph
                    .out_edges(vertex.id.as_str())
                    .filter(move |e| e.edge_type == name)
                    .filter_map(move |e| lookup.vertex(e.target.as_str())),
            );
            if let Some(filter) = &conn.filter {
                targets = targets.filter(move |v| filter.test(v));
            }
            if let Some(limit) = conn.limit {
                targets = targets.limit(limit);
            }
            let nested = conn
                .select
                .project(graph, targets)
                .into_iter()
                .map(ResultRow::into_value)
                .collect();
            values.insert(conn.name.clone(), Value::List(nested));
        }
        ResultRow { values }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::props;
    use pretty_assertions::assert_eq;

    fn select(json: &str) -> SelectPlan {
        SelectPlan::compile(&serde_json::from_str(json).unwrap()).unwrap()
    }

    fn sample() -> Graph {
        let g = Graph::new();
        g.set_vertex("a", "Person", props([("name", Value::from("ann")), ("age", Value::from(30))]));
        g.set_vertex("b", "Person", props([("name", "bob")]));
        g.set_vertex("c", "Person", props([("name", "cy")]));
        g.set_edge("a", "b", "friends").unwrap();
        g.set_edge("a", "c", "friends").unwrap();
        g.set_edge("a", "c", "boss").unwrap();
        g
    }

    #[test]
    fn test_projects_declared_properties_only() {
        let g = sample();
        let rows = select(r#"{"properties":["name","id","email"]}"#).project(&g, g.vertex("a").into_iter());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].values.len(), 3);
        assert_eq!(rows[0].get::<String>("name").unwrap(), "ann");
        assert_eq!(rows[0].get::<String>("id").unwrap(), "a");
        assert_eq!(rows[0].get::<Option<String>>("email").unwrap(), None);
        assert!(matches!(rows[0].get::<i64>("age"), Err(Error::UnknownField { .. })));
    }

    #[test]
    fn test_nested_connections() {
        let g = sample();
        let plan = select(
            r#"{"properties":["name"],"connections":{
                "friends":{"properties":["name"],"filter":{"$starts":{"name":"c"}}},
                "boss":{"properties":["id"]}
            }}"#,
        );
        let rows = plan.project(&g, g.vertex("a").into_iter());
        let friends: Vec<ResultRow> = rows[0].get("friends").unwrap();
        assert_eq!(friends.len(), 1);
        assert_eq!(friends[0].get::<String>("name").unwrap(), "cy");
        let boss: Vec<ResultRow> = rows[0].get("boss").unwrap();
        assert_eq!(boss[0].get::<String>("id").unwrap(), "c");
    }

    #[test]
    fn test_connection_limit() {
        let g = sample();
        let plan = select(r#"{"properties":[],"connections":{"friends":{"properties":["id"],"limit":1}}}"#);
        let rows = plan.project(&g, g.vertex("a").into_iter());
        let friends: Vec<ResultRow> = rows[0].get("friends").unwrap();
        assert_eq!(friends.len(), 1);
    }

    #[test]
    fn test_zero_connection_limit_is_unlimited() {
        let g = sample();
        let plan = select(r#"{"properties":[],"connections":{"friends":{"properties":["id"],"limit":0}}}"#);
        let rows = plan.project(&g, g.vertex("a").into_iter());
        let friends: Vec<ResultRow> = rows[0].get("friends").unwrap();
        assert_eq!(friends.len(), 2);
    }

    #[test]
    fn test_typed_get_mismatch() {
        let row = ResultRow { values: props([("name", "x")]) };
        assert!(matches!(row.get::<i64>("name"), Err(Error::TypeError { .. })));
    }
}
