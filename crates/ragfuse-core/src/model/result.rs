//! The aggregation output artifact.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::chunk::AggregatedSourceChunk;
use super::request::QueryConfig;
use super::technique::{Technique, TechniqueResponse};
use crate::config::{AggregationConfig, ConfidenceAlgorithm, FusionStrategy};

/// Counts, timings and the configuration one aggregation ran with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregationMetadata {
    pub total_techniques: usize,
    pub successful_techniques: usize,
    pub failed_techniques: usize,
    /// Chunks across all successful responses, before merging.
    pub total_chunks_before_dedup: usize,
    pub duplicates_removed: usize,
    /// Canonical chunks dropped by the confidence floor or the result cap.
    pub chunks_filtered: usize,
    pub final_chunk_count: usize,
    pub aggregation_time_ms: u64,
    pub fusion_strategy: FusionStrategy,
    pub confidence_algorithm: ConfidenceAlgorithm,
    pub config: AggregationConfig,
    pub created_at: DateTime<Utc>,
}

/// Cross-technique statistics over the final ranked set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregationInsights {
    /// Successful technique with the highest sum of its own raw chunk scores.
    pub best_performing_technique: Option<Technique>,
    /// Fraction of final chunks found by more than one technique.
    pub technique_agreement_score: f64,
    /// Mean pairwise Jaccard similarity of the responses' document sets.
    pub coverage_overlap: f64,
    /// Unique documents per final chunk, capped at 1.0.
    pub diversity_score: f64,
    /// Technique -> number of final chunks it contributed to.
    pub technique_contributions: BTreeMap<Technique, usize>,
    pub unique_documents: usize,
}

/// Final result of aggregating one query's technique responses.
///
/// Built once by the orchestrator and never mutated afterwards.
/// `aggregated_chunks` is sorted by `aggregated_score`, highest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedRAGResult {
    pub aggregation_id: String,
    pub query_config: QueryConfig,
    /// Every input response, including failed ones, unmodified.
    pub technique_responses: Vec<TechniqueResponse>,
    pub aggregated_chunks: Vec<AggregatedSourceChunk>,
    pub fused_answer: String,
    pub overall_confidence: f64,
    pub metadata: AggregationMetadata,
    pub insights: AggregationInsights,
}

impl AggregatedRAGResult {
    /// Ids of the ranked chunks, best first.
    #[must_use]
    pub fn chunk_ids(&self) -> Vec<&str> {
        self.aggregated_chunks
            .iter()
            .map(|c| c.chunk.id.as_str())
            .collect()
    }
}
