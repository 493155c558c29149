//! Input contract for one aggregation call.

use serde::{Deserialize, Serialize};

use super::lenient;
use super::technique::TechniqueResponse;
use crate::config::AggregationConfig;

/// The query the technique responses were produced for.
///
/// Carried through to the result untouched; aggregation never reads the
/// query text itself.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryConfig {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub document_ids: Vec<String>,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub domain_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
    /// Per-technique timeout in milliseconds, enforced by the executors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

impl QueryConfig {
    #[must_use]
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }
}

/// Everything needed to aggregate one query's technique responses.
///
/// When `config` is absent the caller's resolved configuration applies; when
/// present it is used as-is, with built-in defaults for any missing field.
/// Responses are read leniently; `config` is not.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateRequest {
    #[serde(default, deserialize_with = "lenient::list")]
    pub responses: Vec<TechniqueResponse>,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub query_config: QueryConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<AggregationConfig>,
}
