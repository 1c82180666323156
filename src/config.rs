//! Configuration for the schema layer and the query engine.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::model::VertexId;
use crate::{Error, Result};

/// How `Factory::create` mints vertex ids.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IdStrategy {
    /// Random v4 UUIDs.
    #[default]
    Uuid,
    /// `{prefix}{n}` with a per-`Models` counter starting at 1.
    Sequential { prefix: String },
}

/// Configuration for one `Models` instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphConfig {
    #[serde(default)]
    pub id_strategy: IdStrategy,
}

impl GraphConfig {
    pub fn sequential(prefix: impl Into<String>) -> Self {
        Self { id_strategy: IdStrategy::Sequential { prefix: prefix.into() } }
    }
}

/// Mints ids according to an [`IdStrategy`].
#[derive(Debug)]
pub(crate) struct IdGenerator {
    strategy: IdStrategy,
    next: AtomicU64,
}

impl IdGenerator {
    pub(crate) fn new(strategy: IdStrategy) -> Self {
        Self { strategy, next: AtomicU64::new(1) }
    }

    pub(crate) fn mint(&self) -> VertexId {
        match &self.strategy {
            IdStrategy::Uuid => VertexId(uuid::Uuid::new_v4().to_string()),
            IdStrategy::Sequential { prefix } => {
                let n = self.next.fetch_add(1, Ordering::Relaxed);
                VertexId(format!("{prefix}{n}"))
            }
        }
    }
}

/// Configuration for a schema query engine.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Key for schema signatures. Both issuer and executor need the same one.
    pub secret: Vec<u8>,
}

impl QueryConfig {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self { secret: secret.into() }
    }

    /// Read the secret from an environment variable.
    pub fn from_env(var: &str) -> Result<Self> {
        match std::env::var(var) {
            Ok(secret) if !secret.is_empty() => Ok(Self::new(secret)),
            _ => Err(Error::Config(format!("environment variable {var} is not set"))),
        }
    }
}

// Keep the secret out of logs.
impl std::fmt::Debug for QueryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryConfig").field("secret", &"<redacted>").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_ids() {
        let ids = IdGenerator::new(IdStrategy::Sequential { prefix: "p".into() });
        assert_eq!(ids.mint(), VertexId::from("p1"));
        assert_eq!(ids.mint(), VertexId::from("p2"));
    }

    #[test]
    fn test_uuid_ids_are_distinct() {
        let ids = IdGenerator::new(IdStrategy::Uuid);
        assert_ne!(ids.mint(), ids.mint());
    }

    #[test]
    fn test_config_deserializes() {
        let cfg: GraphConfig =
            serde_json::from_str(r#"{"id_strategy":{"kind":"sequential","prefix":"v"}}"#).unwrap();
        assert_eq!(cfg, GraphConfig::sequential("v"));
        let cfg: GraphConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.id_strategy, IdStrategy::Uuid);
    }

    #[test]
    fn test_secret_is_redacted() {
        let cfg = QueryConfig::new("hunter2");
        assert!(!format!("{cfg:?}").contains("hunter2"));
    }

    #[test]
    fn test_missing_env_secret() {
        assert!(matches!(
            QueryConfig::from_env("SYNO_TEST_SECRET_THAT_IS_NEVER_SET"),
            Err(Error::Config(_))
        ));
    }
}
