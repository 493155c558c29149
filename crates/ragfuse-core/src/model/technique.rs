//! Technique tags and per-technique responses.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

use super::chunk::SourceChunk;
use super::lenient;

/// Tag naming one retrieval method.
///
/// The set is open: upstream collaborators may introduce techniques this
/// crate has never heard of, so the tag is a string rather than an enum. The
/// well-known tags are exposed as constants. Ordering is lexicographic, which
/// makes `Technique` a stable key for sorted maps.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Technique(String);

impl Technique {
    pub const SEMANTIC_SEARCH: &'static str = "semantic_search";
    pub const LEXICAL_SEARCH: &'static str = "lexical_search";
    pub const HYBRID_SEARCH: &'static str = "hybrid_search";
    pub const CONTEXTUAL_RETRIEVAL: &'static str = "contextual_retrieval";
    pub const RERANKING: &'static str = "reranking";
    pub const AGENTIC_RAG: &'static str = "agentic_rag";
    pub const QUERY_EXPANSION: &'static str = "query_expansion";
    pub const MULTI_QUERY: &'static str = "multi_query";

    /// All tags this crate knows by name, in presentation order.
    pub const KNOWN: [&'static str; 8] = [
        Self::SEMANTIC_SEARCH,
        Self::LEXICAL_SEARCH,
        Self::HYBRID_SEARCH,
        Self::CONTEXTUAL_RETRIEVAL,
        Self::RERANKING,
        Self::AGENTIC_RAG,
        Self::QUERY_EXPANSION,
        Self::MULTI_QUERY,
    ];

    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true for one of the [`Technique::KNOWN`] tags.
    #[must_use]
    pub fn is_known(&self) -> bool {
        Self::KNOWN.contains(&self.0.as_str())
    }
}

impl fmt::Display for Technique {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Technique {
    fn from(tag: &str) -> Self {
        Self(tag.to_string())
    }
}

impl From<String> for Technique {
    fn from(tag: String) -> Self {
        Self(tag)
    }
}

impl Borrow<str> for Technique {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Lifecycle status of one technique execution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
    Timeout,
    Cancelled,
}

impl fmt::Display for ResponseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Execution bookkeeping attached to a response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseMetadata {
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub execution_time_ms: u64,
    #[serde(
        default,
        deserialize_with = "lenient::or_default",
        skip_serializing_if = "Option::is_none"
    )]
    pub tokens_used: Option<u64>,
    #[serde(
        default,
        deserialize_with = "lenient::or_default",
        skip_serializing_if = "Option::is_none"
    )]
    pub cost_usd: Option<f64>,
}

/// One technique's full answer to a query.
///
/// Produced once per technique execution and never modified afterwards; the
/// aggregation pipeline only reads it and keeps a copy for traceability.
///
/// Malformed fields degrade to defaults. An unreadable `status` becomes
/// `pending`, which keeps the response out of the aggregation math, and
/// source chunk entries that are not objects are skipped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TechniqueResponse {
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub technique: Technique,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub status: ResponseStatus,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub answer: String,
    #[serde(default, deserialize_with = "lenient::list")]
    pub source_chunks: Vec<SourceChunk>,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub metadata: ResponseMetadata,
    #[serde(
        default,
        deserialize_with = "lenient::or_default",
        skip_serializing_if = "Option::is_none"
    )]
    pub confidence_score: Option<f64>,
    #[serde(
        default,
        deserialize_with = "lenient::or_default",
        skip_serializing_if = "Option::is_none"
    )]
    pub error: Option<String>,
}

impl TechniqueResponse {
    /// A completed response carrying `chunks`.
    #[must_use]
    pub fn completed(technique: impl Into<Technique>, chunks: Vec<SourceChunk>) -> Self {
        Self {
            technique: technique.into(),
            status: ResponseStatus::Completed,
            source_chunks: chunks,
            ..Self::default()
        }
    }

    /// A failed response with no chunks.
    #[must_use]
    pub fn failed(technique: impl Into<Technique>, error: impl Into<String>) -> Self {
        Self {
            technique: technique.into(),
            status: ResponseStatus::Failed,
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// A response takes part in aggregation math only when it completed.
    #[must_use]
    pub fn is_successful(&self) -> bool {
        self.status == ResponseStatus::Completed
    }

    #[must_use]
    pub fn with_answer(mut self, answer: impl Into<String>) -> Self {
        self.answer = answer.into();
        self
    }

    #[must_use]
    pub fn with_execution_time(mut self, execution_time_ms: u64) -> Self {
        self.metadata.execution_time_ms = execution_time_ms;
        self
    }

    #[must_use]
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence_score = Some(confidence);
        self
    }
}
