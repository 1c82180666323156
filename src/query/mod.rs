//! # Signed schema queries
//!
//! A [`Schema`] is a data-only description of a traversal plus a nested
//! projection. It is issued by [`QueryEngine::create`], which attaches an
//! HMAC-SHA256 token over the schema body, and executed by
//! [`QueryEngine::query`], which refuses any schema whose token does not
//! verify under its own secret. Results are plain [`ResultRow`]s, never
//! live instances.
//!
//! Wire shape (JSON):
//!
//! ```json
//! {
//!   "token": "9f2c…",
//!   "select": { "properties": ["name", "id"], "connections": { "friends": { "properties": ["name"], "limit": 3 } } },
//!   "from": [
//!     "friends",
//!     { "what": "friends", "filter": { "$contains": { "name": "a" } }, "limit": 5 },
//!     "visited",
//!     { "type": "Place", "filter": { "$starts": { "name": "u" } } }
//!   ]
//! }
//! ```
//!
//! Every `from` element but the last is a hop (a bare relation name, or
//! `{what, filter?, limit?}`); hops read outer to inner like the
//! [`Traversal`] DSL. The last element is the seed: a bare string is a
//! vertex id, `{type, filter?, limit?}` selects instances of a model type.

pub mod predicate;
pub mod signing;
pub mod execution;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::QueryConfig;
use crate::model::{Value, VertexId};
use crate::schema::Models;
use crate::seq::Seq;
use crate::traversal::{Raw, Traversal};
use crate::{Error, Result};

pub use execution::{FromValue, ResultRow, SelectPlan};
pub use predicate::{Op, Predicate};

// ============================================================================
// Wire types
// ============================================================================

/// Projection: which properties to copy and which connections to descend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Select {
    #[serde(default)]
    pub properties: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub connections: BTreeMap<String, ConnectionSelect>,
}

/// Nested projection over the out-edges of one connection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectionSelect {
    #[serde(flatten)]
    pub select: Select,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

/// One element of `from`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FromStep {
    /// Unfiltered hop, or a vertex id when last.
    Name(String),
    Step {
        what: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        filter: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        limit: Option<usize>,
    },
    Seed {
        #[serde(rename = "type")]
        seed_type: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        filter: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        limit: Option<usize>,
    },
}

/// Unsigned query body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub select: Select,
    pub from: Vec<FromStep>,
}

/// A schema plus its token, serialized flat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedSchema {
    pub token: String,
    #[serde(flatten)]
    pub body: Schema,
}

impl SignedSchema {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

// ============================================================================
// Engine
// ============================================================================

/// Issues and executes signed schemas under one secret.
#[derive(Debug, Clone)]
pub struct QueryEngine {
    config: QueryConfig,
}

impl QueryEngine {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self::from_config(QueryConfig::new(secret))
    }

    pub fn from_config(config: QueryConfig) -> Self {
        Self { config }
    }

    /// Sign a schema.
    pub fn create(&self, schema: Schema) -> Result<SignedSchema> {
        let token = signing::sign(&self.config.secret, &schema)?;
        Ok(SignedSchema { token, body: schema })
    }

    /// Fails with [`Error::Integrity`] unless the token matches the body.
    pub fn verify(&self, schema: &SignedSchema) -> Result<()> {
        if signing::verify(&self.config.secret, &schema.body, &schema.token)? {
            Ok(())
        } else {
            warn!("Rejected schema query with an invalid token");
            Err(Error::Integrity)
        }
    }

    /// Verify, then run the traversal and project each result.
    pub fn query(&self, models: &Models, schema: &SignedSchema) -> Result<Vec<ResultRow>> {
        self.verify(schema)?;
        let body = &schema.body;

        let (seed, hops) = body
            .from
            .split_last()
            .ok_or_else(|| Error::InvalidQuery("`from` is empty".into()))?;
        let plan = SelectPlan::compile(&body.select)?;
        let traversal = build_traversal(models, hops)?;
        let seeds = resolve_seed(models, seed)?;

        let rows = plan.project(models.graph(), traversal.starting_with(seeds));
        debug!("Schema query returned {} rows", rows.len());
        Ok(rows)
    }

    /// Parse a signed schema from JSON and run it.
    pub fn query_json(&self, models: &Models, json: &str) -> Result<Vec<ResultRow>> {
        let schema = SignedSchema::from_json(json)?;
        self.query(models, &schema)
    }
}

fn build_traversal(models: &Models, hops: &[FromStep]) -> Result<Traversal<Raw>> {
    let mut traversal = Traversal::raw(models.graph());
    for hop in hops {
        traversal = match hop {
            FromStep::Name(name) => traversal.via(name.as_str()),
            FromStep::Step { what, filter, limit } => {
                let traversal = traversal.via(what.as_str());
                if filter.is_none() && limit.is_none() {
                    traversal
                } else {
                    let filter = filter.as_ref().map(Predicate::compile).transpose()?;
                    traversal.constrain(filter.map(Predicate::into_fn), *limit)
                }
            }
            FromStep::Seed { seed_type, .. } => {
                return Err(Error::InvalidQuery(format!(
                    "seed by type {seed_type} must be the last element of `from`"
                )));
            }
        };
    }
    Ok(traversal)
}

fn resolve_seed(models: &Models, seed: &FromStep) -> Result<Seq<'static, VertexId>> {
    match seed {
        FromStep::Name(id) => {
            if !models.graph().has_vertex(id) {
                return Err(Error::Reference(format!("seed vertex {id} does not exist")));
            }
            Ok(Seq::once(VertexId::from(id.as_str())))
        }
        FromStep::Seed { seed_type, filter, limit } => {
            let factory = models.factory(seed_type)?;
            let mut found = match filter {
                Some(filter) => {
                    let predicate = Predicate::compile(filter)?;
                    factory.find(move |i| i.vertex().is_some_and(|v| predicate.test(&v)))
                }
                None => factory.find_all(),
            };
            if let Some(limit) = limit.filter(|&n| n > 0) {
                found = found.limit(limit);
            }
            Ok(found.map(|i| i.id().clone()))
        }
        FromStep::Step { what, .. } => Err(Error::InvalidQuery(format!(
            "last element of `from` must be a seed, got hop {what}"
        ))),
    }
}
