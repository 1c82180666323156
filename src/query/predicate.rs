//! Filter objects compiled to vertex predicates.
//!
//! A filter is a JSON object. Every entry must hold:
//! - `"prop": value`: the property equals `value` (numbers compare across int/float);
//! - `"$and" | "$or" | "$not": [filter, ...]`: all / any / none of the sub-filters;
//! - `"$op": { "prop": operand, ... }`: each named property passes test `op`.
//!
//! `id` and `type` resolve like any other property.

use std::cmp::Ordering;
use std::sync::Arc;

use regex::Regex;

use crate::model::{Value, Vertex};
use crate::traversal::VertexPredicate;
use crate::{Error, Result};

/// Value tests available as `$op` keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    /// Substring of a string, or member of a list.
    Contains,
    Starts,
    Ends,
    Less,
    More,
    /// Property value is one of the operand list.
    In,
    /// Type name as reported by [`Value::type_name`], plus `integer` and `undefined`.
    Type,
    Defined,
    Undefined,
    /// Equality.
    Test,
}

impl Op {
    pub fn parse(name: &str) -> Option<Op> {
        Some(match name {
            "contains" => Op::Contains,
            "starts" => Op::Starts,
            "ends" => Op::Ends,
            "less" => Op::Less,
            "more" => Op::More,
            "in" => Op::In,
            "type" => Op::Type,
            "defined" => Op::Defined,
            "undefined" => Op::Undefined,
            "test" => Op::Test,
            _ => return None,
        })
    }

    /// Apply to a property value (`None` when the property is absent).
    pub fn apply(self, value: Option<&Value>, operand: &Value) -> bool {
        match (self, value) {
            (Op::Defined, v) => v.is_some(),
            (Op::Undefined, v) => v.is_none(),
            (Op::Type, None) => operand.as_str() == Some("undefined"),
            (Op::Type, Some(v)) => operand
                .as_str()
                .is_some_and(|t| t == v.type_name() || (t == "integer" && matches!(v, Value::Int(_)))),
            (_, None) => false,
            (Op::Contains, Some(v)) => match (v, operand) {
                (Value::String(s), Value::String(needle)) => s.contains(needle.as_str()),
                (Value::List(items), needle) => items.iter().any(|i| i.loose_eq(needle)),
                _ => false,
            },
            (Op::Starts, Some(v)) => match (v, operand) {
                (Value::String(s), Value::String(prefix)) => s.starts_with(prefix.as_str()),
                _ => false,
            },
            (Op::Ends, Some(v)) => match (v, operand) {
                (Value::String(s), Value::String(suffix)) => s.ends_with(suffix.as_str()),
                _ => false,
            },
            (Op::Less, Some(v)) => matches!(v, Value::Int(_) | Value::Float(_)) && v.compare(operand) == Some(Ordering::Less),
            (Op::More, Some(v)) => matches!(v, Value::Int(_) | Value::Float(_)) && v.compare(operand) == Some(Ordering::Greater),
            (Op::In, Some(v)) => operand.as_list().is_some_and(|l| l.iter().any(|o| v.loose_eq(o))),
            (Op::Test, Some(v)) => v.loose_eq(operand),
        }
    }
}

/// Compiled filter.
#[derive(Debug, Clone)]
pub enum Predicate {
    All(Vec<Predicate>),
    Any(Vec<Predicate>),
    NoneOf(Vec<Predicate>),
    Equals { property: String, value: Value },
    Test { op: Op, property: String, operand: Value },
    Matches { property: String, pattern: Regex },
}

fn invalid(msg: impl Into<String>) -> Error {
    Error::InvalidQuery(msg.into())
}

impl Predicate {
    /// Compile a filter object. Unknown operators and malformed operands are
    /// rejected here, before any traversal runs.
    pub fn compile(filter: &Value) -> Result<Predicate> {
        let entries = filter
            .as_map()
            .ok_or_else(|| invalid(format!("filter must be an object, got {}", filter.type_name())))?;

        let mut clauses = Vec::with_capacity(entries.len());
        for (key, val) in entries {
            let Some(op) = key.strip_prefix('$') else {
                clauses.push(Predicate::Equals { property: key.clone(), value: val.clone() });
                continue;
            };
            match op {
                "and" => clauses.push(Predicate::All(compile_list(op, val)?)),
                "or" => clauses.push(Predicate::Any(compile_list(op, val)?)),
                "not" => clauses.push(Predicate::NoneOf(compile_list(op, val)?)),
                "matches" => {
                    for (property, pattern) in operands(op, val)? {
                        let source = pattern
                            .as_str()
                            .ok_or_else(|| invalid(format!("$matches on {property} needs a string pattern")))?;
                        let pattern = Regex::new(source)
                            .map_err(|e| invalid(format!("$matches on {property}: {e}")))?;
                        clauses.push(Predicate::Matches { property: property.clone(), pattern });
                    }
                }
                other => {
                    let op = Op::parse(other).ok_or_else(|| invalid(format!("unknown operator ${other}")))?;
                    for (property, operand) in operands(other, val)? {
                        clauses.push(Predicate::Test { op, property: property.clone(), operand: operand.clone() });
                    }
                }
            }
        }
        Ok(Predicate::All(clauses))
    }

    pub fn test(&self, vertex: &Vertex) -> bool {
        match self {
            Predicate::All(ps) => ps.iter().all(|p| p.test(vertex)),
            Predicate::Any(ps) => ps.iter().any(|p| p.test(vertex)),
            Predicate::NoneOf(ps) => !ps.iter().any(|p| p.test(vertex)),
            Predicate::Equals { property, value } => {
                vertex.get(property).is_some_and(|v| v.loose_eq(value))
            }
            Predicate::Test { op, property, operand } => op.apply(vertex.get(property).as_ref(), operand),
            Predicate::Matches { property, pattern } => vertex
                .get(property)
                .is_some_and(|v| v.as_str().is_some_and(|s| pattern.is_match(s))),
        }
    }

    /// Shareable closure form, as taken by traversal steps.
    pub fn into_fn(self) -> VertexPredicate {
        Arc::new(move |v: &Vertex| self.test(v))
    }
}

fn compile_list(op: &str, val: &Value) -> Result<Vec<Predicate>> {
    val.as_list()
        .ok_or_else(|| invalid(format!("${op} takes a list of filters")))?
        .iter()
        .map(Predicate::compile)
        .collect()
}

fn operands<'v>(op: &str, val: &'v Value) -> Result<impl Iterator<Item = (&'v String, &'v Value)>> {
    val.as_map()
        .map(|m| m.iter())
        .ok_or_else(|| invalid(format!("${op} takes an object of property operands")))
}
