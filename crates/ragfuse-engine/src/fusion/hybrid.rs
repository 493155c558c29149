//! Two-source hybrid fusion of semantic and lexical hit lists.
//!
//! A hybrid technique retrieves the same query twice, once by vector
//! similarity and once by keyword relevance, and must hand a single ranked
//! list to the aggregator. The two native score scales are unrelated, so each
//! column is normalized on its own before the weighted combination.
//!
//! # Methods
//!
//! | Method                   | Score                                        |
//! |--------------------------|----------------------------------------------|
//! | `weighted_sum`           | `sem * w_sem + lex * w_lex`                  |
//! | `comb_sum`               | same as `weighted_sum`                       |
//! | `reciprocal_rank_fusion` | `w_sem / (60 + sem_rank) + w_lex / (60 + lex_rank)` |
//! | `adaptive`               | `weighted_sum` with weights scaled by each column's mean |
//!
//! A candidate missing from one list gets score `0` and rank `0` for that
//! list; its reciprocal rank term is skipped.
//!
//! # Example
//!
//! ```
//! use ragfuse_core::HybridMethod;
//! use ragfuse_engine::fusion::{HybridOptions, HybridWeights, RankedHit, hybrid_fuse};
//!
//! let semantic = vec![RankedHit::new("a", 0.9, 1), RankedHit::new("b", 0.4, 2)];
//! let lexical = vec![RankedHit::new("b", 7.0, 1)];
//! let options = HybridOptions {
//!     method: HybridMethod::ReciprocalRankFusion,
//!     weights: HybridWeights::new(0.5, 0.5).unwrap(),
//!     normalization: None,
//! };
//! let fused = hybrid_fuse(&semantic, &lexical, &options).unwrap();
//! assert_eq!(fused[0].id, "b");
//! ```

use ragfuse_core::{AggregateError, HybridConfig, HybridMethod, NormalizationMethod, SourceChunk};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::trace;

use super::RRF_K;
use crate::normalize::normalize_scores;

const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// One entry of a ranked hit list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedHit {
    pub id: String,
    #[serde(default)]
    pub score: f64,
    /// 1-based position; `0` means "use the position in the list".
    #[serde(default)]
    pub rank: usize,
}

impl RankedHit {
    #[must_use]
    pub fn new(id: impl Into<String>, score: f64, rank: usize) -> Self {
        Self {
            id: id.into(),
            score,
            rank,
        }
    }
}

/// Semantic and lexical weights, each in `[0, 1]` and summing to 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HybridWeights {
    semantic: f64,
    lexical: f64,
}

impl HybridWeights {
    /// Validate a weight pair.
    ///
    /// # Errors
    ///
    /// Returns [`AggregateError::InvalidHybridWeights`] if either weight is
    /// outside `[0, 1]` or the pair does not sum to 1.0 (within `1e-6`).
    pub fn new(semantic: f64, lexical: f64) -> Result<Self, AggregateError> {
        let valid = (0.0..=1.0).contains(&semantic)
            && (0.0..=1.0).contains(&lexical)
            && ((semantic + lexical) - 1.0).abs() <= WEIGHT_SUM_TOLERANCE;
        if valid {
            Ok(Self { semantic, lexical })
        } else {
            Err(AggregateError::InvalidHybridWeights { semantic, lexical })
        }
    }

    #[must_use]
    pub const fn semantic(&self) -> f64 {
        self.semantic
    }

    #[must_use]
    pub const fn lexical(&self) -> f64 {
        self.lexical
    }
}

impl Default for HybridWeights {
    fn default() -> Self {
        Self {
            semantic: 0.5,
            lexical: 0.5,
        }
    }
}

/// Method, weights and normalization for one pair-scoring call.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HybridOptions {
    pub method: HybridMethod,
    pub weights: HybridWeights,
    /// Applied to each score column separately; `None` keeps raw scores.
    pub normalization: Option<NormalizationMethod>,
}

impl HybridOptions {
    /// Build options from the `[hybrid]` config section.
    ///
    /// # Errors
    ///
    /// Returns [`AggregateError::InvalidHybridWeights`] if the configured
    /// weights leave `[0, 1]` or do not sum to 1.0.
    pub fn from_config(config: &HybridConfig) -> Result<Self, AggregateError> {
        Ok(Self {
            method: config.method,
            weights: HybridWeights::new(config.semantic_weight, config.lexical_weight)?,
            normalization: config.normalization,
        })
    }
}

/// A fused candidate with its per-source breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HybridHit {
    pub id: String,
    pub hybrid_score: f64,
    /// Semantic score after normalization, `0` when absent.
    pub semantic_score: f64,
    /// Lexical score after normalization, `0` when absent.
    pub lexical_score: f64,
    /// 1-based semantic rank, `0` when absent.
    pub semantic_rank: usize,
    /// 1-based lexical rank, `0` when absent.
    pub lexical_rank: usize,
}

// ---------------------------------------------------------------------------
// Fusion
// ---------------------------------------------------------------------------

/// Merge a semantic and a lexical hit list into one list, best first.
///
/// The union is keyed by `id`; semantic hits are enumerated before
/// lexical-only hits, and that insertion order breaks score ties. A repeated
/// `id` within one list keeps its first occurrence. Truncation is left to the
/// caller (see [`rescore_chunks`]).
///
/// # Errors
///
/// Returns [`AggregateError::InvalidHybridWeights`] if `options.weights` was
/// built without [`HybridWeights::new`] and fails its checks.
pub fn hybrid_fuse(
    semantic: &[RankedHit],
    lexical: &[RankedHit],
    options: &HybridOptions,
) -> Result<Vec<HybridHit>, AggregateError> {
    let weights = HybridWeights::new(options.weights.semantic, options.weights.lexical)?;

    let mut hits: Vec<HybridHit> = Vec::with_capacity(semantic.len() + lexical.len());
    let mut index: HashMap<&str, usize> = HashMap::new();

    for (pos, hit) in semantic.iter().enumerate() {
        if index.contains_key(hit.id.as_str()) {
            continue;
        }
        index.insert(hit.id.as_str(), hits.len());
        hits.push(HybridHit {
            id: hit.id.clone(),
            hybrid_score: 0.0,
            semantic_score: finite(hit.score),
            lexical_score: 0.0,
            semantic_rank: effective_rank(hit, pos),
            lexical_rank: 0,
        });
    }

    let mut seen_lexical: HashSet<&str> = HashSet::new();
    for (pos, hit) in lexical.iter().enumerate() {
        if !seen_lexical.insert(hit.id.as_str()) {
            continue;
        }
        if let Some(&slot) = index.get(hit.id.as_str()) {
            hits[slot].lexical_score = finite(hit.score);
            hits[slot].lexical_rank = effective_rank(hit, pos);
        } else {
            index.insert(hit.id.as_str(), hits.len());
            hits.push(HybridHit {
                id: hit.id.clone(),
                hybrid_score: 0.0,
                semantic_score: 0.0,
                lexical_score: finite(hit.score),
                semantic_rank: 0,
                lexical_rank: effective_rank(hit, pos),
            });
        }
    }

    if let Some(method) = options.normalization {
        let sem: Vec<f64> = hits.iter().map(|h| h.semantic_score).collect();
        let lex: Vec<f64> = hits.iter().map(|h| h.lexical_score).collect();
        let sem = normalize_scores(&sem, method);
        let lex = normalize_scores(&lex, method);
        for (hit, (s, l)) in hits.iter_mut().zip(sem.into_iter().zip(lex)) {
            hit.semantic_score = s;
            hit.lexical_score = l;
        }
    }

    let (w_sem, w_lex) = match options.method {
        HybridMethod::Adaptive => adaptive_weights(&hits, weights),
        _ => (weights.semantic, weights.lexical),
    };

    for hit in &mut hits {
        let score = match options.method {
            HybridMethod::WeightedSum | HybridMethod::CombSum | HybridMethod::Adaptive => hit
                .semantic_score
                .mul_add(w_sem, hit.lexical_score * w_lex),
            HybridMethod::ReciprocalRankFusion => {
                rrf_term(w_sem, hit.semantic_rank) + rrf_term(w_lex, hit.lexical_rank)
            }
        };
        hit.hybrid_score = finite(score);
    }

    hits.sort_by(|a, b| b.hybrid_score.total_cmp(&a.hybrid_score));

    trace!(
        method = %options.method,
        candidates = hits.len(),
        "hybrid fusion complete"
    );

    Ok(hits)
}

/// Rewrite a hybrid technique's chunks in fused order.
///
/// Each returned chunk is the first chunk in `chunks` whose `id` matches a
/// fused hit, with `score` replaced by the hit's `hybrid_score`. Hits with no
/// matching chunk are skipped. At most `final_limit` chunks are returned.
#[must_use]
pub fn rescore_chunks(
    chunks: &[SourceChunk],
    fused: &[HybridHit],
    final_limit: usize,
) -> Vec<SourceChunk> {
    let mut by_id: HashMap<&str, &SourceChunk> = HashMap::with_capacity(chunks.len());
    for chunk in chunks {
        by_id.entry(chunk.id.as_str()).or_insert(chunk);
    }

    fused
        .iter()
        .filter_map(|hit| {
            by_id.get(hit.id.as_str()).map(|chunk| SourceChunk {
                score: hit.hybrid_score,
                ..(*chunk).clone()
            })
        })
        .take(final_limit)
        .collect()
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn effective_rank(hit: &RankedHit, pos: usize) -> usize {
    if hit.rank == 0 { pos + 1 } else { hit.rank }
}

fn rrf_term(weight: f64, rank: usize) -> f64 {
    if rank == 0 {
        0.0
    } else {
        weight / (RRF_K + rank as f64)
    }
}

/// Scale each weight by its column's share of the summed column means.
fn adaptive_weights(hits: &[HybridHit], weights: HybridWeights) -> (f64, f64) {
    let sem_mean = contributing_mean(hits.iter().map(|h| h.semantic_score));
    let lex_mean = contributing_mean(hits.iter().map(|h| h.lexical_score));
    let total = sem_mean + lex_mean;
    if total <= f64::EPSILON {
        return (weights.semantic, weights.lexical);
    }
    (
        weights.semantic * (sem_mean / total),
        weights.lexical * (lex_mean / total),
    )
}

fn contributing_mean(scores: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = scores
        .filter(|s| *s > 0.0)
        .fold((0.0, 0_usize), |(sum, count), s| (sum + s, count + 1));
    if count == 0 { 0.0 } else { sum / count as f64 }
}

fn finite(score: f64) -> f64 {
    if score.is_finite() { score } else { 0.0 }
}
