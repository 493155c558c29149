//! N-way fusion of per-technique scores into one `aggregated_score`.
//!
//! Every canonical chunk already carries the raw score and rank each
//! contributing technique gave it. A [`MultiFusion`] turns those maps into a
//! single number using the selected [`FusionStrategy`]:
//!
//! | Strategy                 | `aggregated_score`                                  |
//! |--------------------------|-----------------------------------------------------|
//! | `reciprocal_rank_fusion` | `Σ 1 / (60 + rank_t)`                               |
//! | `weighted_sum`           | `Σ score_t * w_t / Σ w_t`                           |
//! | `comb_sum`               | mean of `score_t`                                   |
//! | `comb_max`               | max of `score_t`                                    |
//! | `adaptive`               | reliability-weighted mean of `score_t`              |
//! | `vote_based`             | `(found_by / max_found_by + mean score_t) / 2`      |
//!
//! Sums run over the techniques that found the chunk only. Every formula is a
//! pure function of the chunk, the configuration and the responses; a
//! non-finite result degrades to `0.0`.

use ragfuse_core::{
    AggregatedSourceChunk, AggregationConfig, FusionStrategy, Technique, TechniqueResponse,
};
use std::collections::BTreeMap;

use super::RRF_K;

/// Execution time at which a technique's time score reaches zero.
const RELIABILITY_TIME_CEILING_MS: f64 = 30_000.0;
/// Result count at which a technique's result-count score saturates.
const RELIABILITY_RESULT_CEILING: f64 = 10.0;
/// Confidence assumed when a response does not report one.
const DEFAULT_RESPONSE_CONFIDENCE: f64 = 0.5;
/// Reliability used for a technique with no successful response on record.
const DEFAULT_RELIABILITY: f64 = 0.5;

/// Fusion context for one aggregation call.
#[derive(Debug, Clone)]
pub struct MultiFusion<'a> {
    strategy: FusionStrategy,
    config: &'a AggregationConfig,
    reliability: BTreeMap<Technique, f64>,
    max_votes: usize,
}

impl<'a> MultiFusion<'a> {
    /// Prepare the shared inputs a strategy needs: technique reliabilities
    /// from the successful `responses` and the largest `found_by` count among
    /// `chunks`.
    #[must_use]
    pub fn new(
        config: &'a AggregationConfig,
        responses: &[TechniqueResponse],
        chunks: &[AggregatedSourceChunk],
    ) -> Self {
        let mut reliability = BTreeMap::new();
        for response in responses.iter().filter(|r| r.is_successful()) {
            reliability
                .entry(response.technique.clone())
                .or_insert_with(|| technique_reliability(response));
        }

        let max_votes = chunks
            .iter()
            .map(AggregatedSourceChunk::found_by_count)
            .max()
            .unwrap_or(0);

        Self {
            strategy: config.fusion_strategy,
            config,
            reliability,
            max_votes,
        }
    }

    #[must_use]
    pub const fn strategy(&self) -> FusionStrategy {
        self.strategy
    }

    /// Write `aggregated_score` on every chunk.
    pub fn apply(&self, chunks: &mut [AggregatedSourceChunk]) {
        for chunk in chunks {
            chunk.aggregated_score = self.score(chunk);
        }
    }

    /// The fused score of one chunk.
    #[must_use]
    pub fn score(&self, chunk: &AggregatedSourceChunk) -> f64 {
        let score = match self.strategy {
            FusionStrategy::ReciprocalRankFusion => rrf_score(chunk),
            FusionStrategy::WeightedSum => self.weighted_sum(chunk),
            FusionStrategy::CombSum => chunk.mean_raw_score(),
            FusionStrategy::CombMax => comb_max(chunk),
            FusionStrategy::Adaptive => self.adaptive(chunk),
            FusionStrategy::VoteBased => self.vote_based(chunk),
        };
        if score.is_finite() { score } else { 0.0 }
    }

    fn weighted_sum(&self, chunk: &AggregatedSourceChunk) -> f64 {
        let (weighted, total_weight) = chunk.technique_scores.iter().fold(
            (0.0, 0.0),
            |(weighted, total), (technique, score)| {
                let weight = self.config.weight_for(technique);
                (score.mul_add(weight, weighted), total + weight)
            },
        );
        if total_weight <= 0.0 {
            0.0
        } else {
            weighted / total_weight
        }
    }

    fn adaptive(&self, chunk: &AggregatedSourceChunk) -> f64 {
        let (weighted, total_reliability) = chunk.technique_scores.iter().fold(
            (0.0, 0.0),
            |(weighted, total), (technique, score)| {
                let reliability = self
                    .reliability
                    .get(technique)
                    .copied()
                    .unwrap_or(DEFAULT_RELIABILITY);
                (score.mul_add(reliability, weighted), total + reliability)
            },
        );
        if total_reliability <= f64::EPSILON {
            chunk.mean_raw_score()
        } else {
            weighted / total_reliability
        }
    }

    fn vote_based(&self, chunk: &AggregatedSourceChunk) -> f64 {
        let vote = if self.max_votes == 0 {
            0.0
        } else {
            chunk.found_by_count() as f64 / self.max_votes as f64
        };
        (vote + chunk.mean_raw_score()) / 2.0
    }
}

fn rrf_score(chunk: &AggregatedSourceChunk) -> f64 {
    chunk
        .technique_ranks
        .values()
        .map(|&rank| 1.0 / (RRF_K + rank as f64))
        .sum()
}

fn comb_max(chunk: &AggregatedSourceChunk) -> f64 {
    chunk
        .technique_scores
        .values()
        .copied()
        .reduce(f64::max)
        .unwrap_or(0.0)
}

/// Reliability of a technique judged from its own response, in `[0, 1]`.
///
/// Mean of three parts: a time score that falls linearly to zero at 30 s, a
/// result-count score that saturates at 10 chunks, and the response's own
/// confidence (0.5 when unreported).
#[must_use]
pub fn technique_reliability(response: &TechniqueResponse) -> f64 {
    let elapsed = response.metadata.execution_time_ms as f64;
    let time_score = 1.0 - (elapsed / RELIABILITY_TIME_CEILING_MS).min(1.0);
    let result_score =
        (response.source_chunks.len() as f64 / RELIABILITY_RESULT_CEILING).min(1.0);
    let confidence = response
        .confidence_score
        .filter(|c| c.is_finite())
        .map_or(DEFAULT_RESPONSE_CONFIDENCE, |c| c.clamp(0.0, 1.0));
    (time_score + result_score + confidence) / 3.0
}
