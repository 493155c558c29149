//! Aggregation pipeline: one query's technique responses in, one
//! [`AggregatedRAGResult`] out.
//!
//! The pipeline is a straight line of stages with no branching or retry:
//!
//! ```text
//! Init -> Deduplicating -> Fusing -> Scoring -> Ranking -> Summarizing -> Done
//!   \
//!    +-> Failed   (no successful responses)
//! ```
//!
//! Each stage is one call into a sibling module. The [`Aggregator`] owns only
//! its configuration; it holds no state between calls and may be shared
//! freely across threads.

use chrono::Utc;
use ragfuse_core::{
    AggregateError, AggregateRequest, AggregatedRAGResult, AggregationConfig, AggregationMetadata,
    QueryConfig, TechniqueResponse,
};
use serde::Serialize;
use std::fmt;
use std::time::Instant;
use tracing::{debug, info, instrument};

use crate::confidence::score_confidence;
use crate::duplicates::{DedupOutcome, collect_candidates, deduplicate};
use crate::fusion::MultiFusion;
use crate::insights::{fuse_answer, generate_insights, overall_confidence};
use crate::rank::rank_and_filter;

/// Pipeline position, reported in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationStage {
    Init,
    Deduplicating,
    Fusing,
    Scoring,
    Ranking,
    Summarizing,
    Done,
    Failed,
}

impl AggregationStage {
    /// The stage that follows `self` on the success path.
    #[must_use]
    pub const fn next(self) -> Self {
        match self {
            Self::Init => Self::Deduplicating,
            Self::Deduplicating => Self::Fusing,
            Self::Fusing => Self::Scoring,
            Self::Scoring => Self::Ranking,
            Self::Ranking => Self::Summarizing,
            Self::Summarizing | Self::Done => Self::Done,
            Self::Failed => Self::Failed,
        }
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Deduplicating => "deduplicating",
            Self::Fusing => "fusing",
            Self::Scoring => "scoring",
            Self::Ranking => "ranking",
            Self::Summarizing => "summarizing",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for AggregationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated aggregation configuration, ready to run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Aggregator {
    config: AggregationConfig,
}

impl Aggregator {
    /// # Errors
    ///
    /// Returns [`AggregateError::InvalidConfig`] if `config` fails
    /// [`AggregationConfig::validate`].
    pub fn new(config: AggregationConfig) -> Result<Self, AggregateError> {
        config.validate()?;
        Ok(Self { config })
    }

    #[must_use]
    pub const fn config(&self) -> &AggregationConfig {
        &self.config
    }

    /// Aggregate one query's technique responses.
    ///
    /// Failed responses are kept verbatim in `technique_responses` but take
    /// no part in any score.
    ///
    /// # Errors
    ///
    /// Returns [`AggregateError::NoSuccessfulResponses`] when no response has
    /// status `completed`, including when `responses` is empty.
    #[instrument(skip_all, fields(responses = responses.len(), strategy = %self.config.fusion_strategy))]
    pub fn aggregate(
        &self,
        responses: Vec<TechniqueResponse>,
        query_config: QueryConfig,
    ) -> Result<AggregatedRAGResult, AggregateError> {
        let started = Instant::now();
        let config = &self.config;
        let mut stage = AggregationStage::Init;

        let total_techniques = responses.len();
        let successful_techniques = responses.iter().filter(|r| r.is_successful()).count();
        if successful_techniques == 0 {
            stage = AggregationStage::Failed;
            debug!(%stage, total = total_techniques, "no successful responses");
            return Err(AggregateError::NoSuccessfulResponses {
                total: total_techniques,
            });
        }

        stage = advance(stage);
        let candidates = collect_candidates(&responses);
        let total_chunks_before_dedup = candidates.len();
        let dedup = if config.enable_deduplication {
            deduplicate(candidates, config.duplicate_threshold)
        } else {
            DedupOutcome {
                chunks: candidates,
                duplicates_removed: 0,
            }
        };
        let mut chunks = dedup.chunks;
        debug!(
            candidates = total_chunks_before_dedup,
            canonical = chunks.len(),
            removed = dedup.duplicates_removed,
            "deduplicated"
        );

        stage = advance(stage);
        MultiFusion::new(config, &responses, &chunks).apply(&mut chunks);

        stage = advance(stage);
        score_confidence(&mut chunks, config.confidence_algorithm);

        stage = advance(stage);
        let ranked = rank_and_filter(chunks, config.min_confidence, config.max_results);
        debug!(kept = ranked.chunks.len(), filtered = ranked.filtered, "ranked");

        stage = advance(stage);
        let insights = generate_insights(&responses, &ranked.chunks);
        let fused_answer = fuse_answer(&responses, &ranked.chunks);
        let overall_confidence = overall_confidence(&responses, &ranked.chunks);

        stage = advance(stage);
        debug_assert!(stage.is_terminal());

        let aggregation_time_ms =
            u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        let metadata = AggregationMetadata {
            total_techniques,
            successful_techniques,
            failed_techniques: total_techniques - successful_techniques,
            total_chunks_before_dedup,
            duplicates_removed: dedup.duplicates_removed,
            chunks_filtered: ranked.filtered,
            final_chunk_count: ranked.chunks.len(),
            aggregation_time_ms,
            fusion_strategy: config.fusion_strategy,
            confidence_algorithm: config.confidence_algorithm,
            config: config.clone(),
            created_at: Utc::now(),
        };

        let result = AggregatedRAGResult {
            aggregation_id: uuid::Uuid::new_v4().to_string(),
            query_config,
            technique_responses: responses,
            aggregated_chunks: ranked.chunks,
            fused_answer,
            overall_confidence,
            metadata,
            insights,
        };

        info!(
            aggregation_id = %result.aggregation_id,
            successful = successful_techniques,
            chunks = result.metadata.final_chunk_count,
            duplicates_removed = result.metadata.duplicates_removed,
            overall_confidence = result.overall_confidence,
            elapsed_ms = aggregation_time_ms,
            "aggregation complete"
        );

        Ok(result)
    }
}

fn advance(stage: AggregationStage) -> AggregationStage {
    let next = stage.next();
    debug!(from = %stage, to = %next, "aggregation stage");
    next
}

/// Aggregate a full request document.
///
/// The request's own `config` block, when present, is used in place of
/// `fallback`.
///
/// # Errors
///
/// Returns [`AggregateError::InvalidConfig`] for an out-of-range config and
/// [`AggregateError::NoSuccessfulResponses`] when no response completed.
pub fn aggregate_request(
    request: AggregateRequest,
    fallback: &AggregationConfig,
) -> Result<AggregatedRAGResult, AggregateError> {
    let config = request.config.unwrap_or_else(|| fallback.clone());
    Aggregator::new(config)?.aggregate(request.responses, request.query_config)
}
