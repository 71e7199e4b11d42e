//! Query configuration
//!
//! Resolved once at startup and passed down explicitly to plan composition
//! and projection building.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::{QueryError, QueryResult};

/// What happens to a row whose optional singular relation is absent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyRelationPolicy {
    /// Inner join; the row is not returned
    #[default]
    DropRow,
    /// Left join; the relation reconstructs to an empty optional
    Absent,
}

/// Query composition configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Maximum values per `IN` group (default: 1000)
    #[serde(default = "default_in_chunk_size")]
    pub in_chunk_size: usize,

    /// Bind large value sets as one array parameter when the store supports it
    #[serde(default)]
    pub table_value_binding: bool,

    /// Handling of absent optional relations (default: drop_row)
    #[serde(default)]
    pub empty_optional_relation: EmptyRelationPolicy,
}

fn default_in_chunk_size() -> usize {
    1000
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            in_chunk_size: default_in_chunk_size(),
            table_value_binding: false,
            empty_optional_relation: EmptyRelationPolicy::default(),
        }
    }
}

impl QueryConfig {
    /// Create a config with the given `IN` chunk size
    pub fn with_in_chunk_size(in_chunk_size: usize) -> Self {
        Self {
            in_chunk_size,
            ..Default::default()
        }
    }

    /// Create a config with the given empty relation policy
    pub fn with_empty_relation_policy(policy: EmptyRelationPolicy) -> Self {
        Self {
            empty_optional_relation: policy,
            ..Default::default()
        }
    }

    /// Parse and validate a JSON document
    pub fn from_json_str(json: &str) -> QueryResult<Self> {
        let config: QueryConfig =
            serde_json::from_str(json).map_err(|e| QueryError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a JSON file
    pub fn load(path: impl AsRef<Path>) -> QueryResult<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|e| {
            QueryError::InvalidConfig(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config = Self::from_json_str(&json)?;
        tracing::info!(
            path = %path.display(),
            in_chunk_size = config.in_chunk_size,
            "loaded query config"
        );
        Ok(config)
    }

    pub fn validate(&self) -> QueryResult<()> {
        if self.in_chunk_size == 0 {
            return Err(QueryError::InvalidConfig(
                "in_chunk_size must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}
