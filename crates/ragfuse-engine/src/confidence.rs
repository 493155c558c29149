//! Per-chunk confidence levels.
//!
//! Each algorithm maps a fused chunk to a number in `[0, 1]` and stores it in
//! `normalized_metadata.confidence_level` together with the matching
//! relevance tier. Out-of-range intermediate values are clamped and NaN
//! becomes `0.0`, so the bound holds even when a fusion strategy produces
//! scores above 1 (`comb_max` over unnormalized BM25 scores, for example).

use ragfuse_core::{AggregatedSourceChunk, ConfidenceAlgorithm, RelevanceTier};

/// Found-by count at which `technique_weighted` agreement saturates.
const AGREEMENT_SATURATION: f64 = 5.0;
/// Consensus assumed for a chunk only one technique found.
const SINGLE_SOURCE_CONSENSUS: f64 = 0.5;

/// Population mean and standard deviation of the aggregated scores.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct ScoreStats {
    mean: f64,
    stddev: f64,
}

impl ScoreStats {
    fn from_chunks(chunks: &[AggregatedSourceChunk]) -> Self {
        if chunks.is_empty() {
            return Self::default();
        }
        let n = chunks.len() as f64;
        let mean = chunks.iter().map(|c| c.aggregated_score).sum::<f64>() / n;
        let variance = chunks
            .iter()
            .map(|c| (c.aggregated_score - mean).powi(2))
            .sum::<f64>()
            / n;
        Self {
            mean,
            stddev: variance.sqrt(),
        }
    }
}

/// Set `confidence_level` and `relevance_tier` on every chunk.
pub fn score_confidence(chunks: &mut [AggregatedSourceChunk], algorithm: ConfidenceAlgorithm) {
    let stats = ScoreStats::from_chunks(chunks);
    for chunk in chunks.iter_mut() {
        let confidence = clamp_unit(raw_confidence(chunk, algorithm, stats));
        chunk.normalized_metadata.confidence_level = confidence;
        chunk.normalized_metadata.relevance_tier = RelevanceTier::from_confidence(confidence);
    }
}

fn raw_confidence(
    chunk: &AggregatedSourceChunk,
    algorithm: ConfidenceAlgorithm,
    stats: ScoreStats,
) -> f64 {
    let score = chunk.aggregated_score;
    match algorithm {
        ConfidenceAlgorithm::ScoreBased => score,
        ConfidenceAlgorithm::TechniqueWeighted => {
            let agreement = (chunk.found_by_count() as f64 / AGREEMENT_SATURATION).min(1.0);
            (score + agreement) / 2.0
        }
        ConfidenceAlgorithm::ConsensusBased => (score + consensus(chunk)) / 2.0,
        ConfidenceAlgorithm::Statistical => {
            let z = if stats.stddev <= f64::EPSILON {
                0.0
            } else {
                (score - stats.mean) / stats.stddev
            };
            sigmoid(z)
        }
    }
}

/// `1 - variance` of the raw per-technique scores, `0.5` for a single source.
fn consensus(chunk: &AggregatedSourceChunk) -> f64 {
    let scores: Vec<f64> = chunk.technique_scores.values().copied().collect();
    if scores.len() < 2 {
        return SINGLE_SOURCE_CONSENSUS;
    }
    let n = scores.len() as f64;
    let mean = scores.iter().sum::<f64>() / n;
    let variance = scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n;
    1.0 - clamp_unit(variance)
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
