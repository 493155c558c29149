//! Retrieval chunks: raw ones from a single technique and merged ones
//! carrying cross-technique provenance.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::lenient;
use super::technique::Technique;

/// Open key/value bag attached to a chunk (document title, page number, ...).
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// An atomic retrieval result.
///
/// Every field defaults when absent, `null`, or ill-typed, so a malformed
/// chunk from an upstream technique deserializes with a zero score and empty
/// text rather than failing the whole response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceChunk {
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub document_id: String,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub content: String,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub chunk_index: usize,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub score: f64,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub metadata: Metadata,
}

impl SourceChunk {
    pub fn new(
        id: impl Into<String>,
        document_id: impl Into<String>,
        chunk_index: usize,
        content: impl Into<String>,
        score: f64,
    ) -> Self {
        Self {
            id: id.into(),
            document_id: document_id.into(),
            content: content.into(),
            chunk_index,
            score,
            metadata: Metadata::new(),
        }
    }

    #[must_use]
    pub fn with_metadata(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    /// Raw score with non-finite values mapped to `0.0`.
    #[must_use]
    pub fn finite_score(&self) -> f64 {
        if self.score.is_finite() { self.score } else { 0.0 }
    }

    /// String metadata value for `key`, if present and a string.
    #[must_use]
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(serde_json::Value::as_str)
    }

    /// Integer metadata value for `key`, accepting numbers or numeric strings.
    #[must_use]
    pub fn metadata_u64(&self, key: &str) -> Option<u64> {
        match self.metadata.get(key)? {
            serde_json::Value::Number(n) => n.as_u64(),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

/// Coarse relevance bucket derived from a chunk's confidence level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelevanceTier {
    High,
    Medium,
    #[default]
    Low,
}

impl RelevanceTier {
    pub const HIGH_THRESHOLD: f64 = 0.7;
    pub const MEDIUM_THRESHOLD: f64 = 0.4;

    /// `high` at `>= 0.7`, `medium` at `>= 0.4`, otherwise `low`.
    #[must_use]
    pub fn from_confidence(confidence: f64) -> Self {
        if confidence >= Self::HIGH_THRESHOLD {
            Self::High
        } else if confidence >= Self::MEDIUM_THRESHOLD {
            Self::Medium
        } else {
            Self::Low
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

impl fmt::Display for RelevanceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derived, presentation-friendly view over a merged chunk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedMetadata {
    pub relevance_tier: RelevanceTier,
    /// Trust score in `[0, 1]`, written by the confidence scorer.
    pub confidence_level: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_number: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_title: Option<String>,
}

impl NormalizedMetadata {
    /// Lift the well-known keys out of a chunk's metadata bag.
    #[must_use]
    pub fn from_chunk(chunk: &SourceChunk) -> Self {
        Self {
            relevance_tier: RelevanceTier::Low,
            confidence_level: 0.0,
            document_title: chunk
                .metadata_str("document_title")
                .or_else(|| chunk.metadata_str("title"))
                .map(str::to_string),
            page_number: chunk.metadata_u64("page_number"),
            section_title: chunk.metadata_str("section_title").map(str::to_string),
        }
    }
}

/// A canonical chunk merged from one or more equivalent source chunks.
///
/// The canonical chunk's own `id`, `content` and `metadata` are those of the
/// first chunk seen; the provenance maps hold one entry per technique that
/// found any of the merged chunks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregatedSourceChunk {
    #[serde(flatten)]
    pub chunk: SourceChunk,
    pub aggregated_score: f64,
    /// Technique -> raw score that technique assigned.
    pub technique_scores: BTreeMap<Technique, f64>,
    /// Technique -> 1-based rank within that technique's own result list.
    pub technique_ranks: BTreeMap<Technique, usize>,
    /// Contributing techniques in discovery order.
    pub found_by_techniques: Vec<Technique>,
    pub normalized_metadata: NormalizedMetadata,
}

impl AggregatedSourceChunk {
    /// Seed a canonical record from one technique's chunk at `rank` (1-based).
    #[must_use]
    pub fn from_source(chunk: &SourceChunk, technique: &Technique, rank: usize) -> Self {
        let mut technique_scores = BTreeMap::new();
        technique_scores.insert(technique.clone(), chunk.finite_score());
        let mut technique_ranks = BTreeMap::new();
        technique_ranks.insert(technique.clone(), rank);

        Self {
            normalized_metadata: NormalizedMetadata::from_chunk(chunk),
            chunk: chunk.clone(),
            aggregated_score: 0.0,
            technique_scores,
            technique_ranks,
            found_by_techniques: vec![technique.clone()],
        }
    }

    /// Union another record's provenance into this one.
    ///
    /// When both records carry an entry for the same technique (a technique
    /// that returned two near-duplicate chunks), the higher score and the
    /// better rank are kept. Canonical text and identity are left untouched.
    pub fn absorb(&mut self, other: &Self) {
        for (technique, &score) in &other.technique_scores {
            self.technique_scores
                .entry(technique.clone())
                .and_modify(|s| *s = s.max(score))
                .or_insert(score);
        }
        for (technique, &rank) in &other.technique_ranks {
            self.technique_ranks
                .entry(technique.clone())
                .and_modify(|r| *r = (*r).min(rank))
                .or_insert(rank);
        }
        for technique in &other.found_by_techniques {
            if !self.found_by_techniques.contains(technique) {
                self.found_by_techniques.push(technique.clone());
            }
        }
    }

    #[must_use]
    pub fn found_by_count(&self) -> usize {
        self.found_by_techniques.len()
    }

    /// Unweighted mean of the raw per-technique scores, `0.0` when empty.
    #[must_use]
    pub fn mean_raw_score(&self) -> f64 {
        if self.technique_scores.is_empty() {
            return 0.0;
        }
        self.technique_scores.values().sum::<f64>() / self.technique_scores.len() as f64
    }

    #[must_use]
    pub const fn confidence_level(&self) -> f64 {
        self.normalized_metadata.confidence_level
    }
}
