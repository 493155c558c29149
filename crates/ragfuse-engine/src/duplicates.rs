//! Near-duplicate collapsing across technique responses.
//!
//! Different techniques frequently return the same underlying passage, either
//! as literally the same chunk or as a neighbouring chunk of the same
//! document. Two chunks are treated as the same passage when either:
//!
//! 1. they share a non-empty `document_id` and their `chunk_index` values
//!    differ by at most one, or
//! 2. the Jaccard similarity of their lower-cased whitespace token sets is at
//!    least the configured threshold.
//!
//! # Merge order
//!
//! Candidates are visited in input order. Each unprocessed candidate becomes
//! a canonical record and absorbs every later unprocessed candidate similar
//! to *it* (not to chunks it has already absorbed). A chunk similar to two
//! canonical records therefore lands in whichever comes first. The outcome
//! depends on input order, and re-running the pass over its own output
//! performs no further merges.

use ragfuse_core::{AggregatedSourceChunk, SourceChunk, TechniqueResponse};
use std::collections::BTreeSet;
use tracing::trace;

/// Canonical chunks produced by one deduplication pass.
#[derive(Debug, Clone, PartialEq)]
pub struct DedupOutcome {
    pub chunks: Vec<AggregatedSourceChunk>,
    /// Candidates merged into an earlier canonical record.
    pub duplicates_removed: usize,
}

/// Lift every chunk of every successful response into a provenance record.
///
/// A chunk's rank is its 1-based position in its own response. Responses are
/// visited in input order, chunks in list order.
#[must_use]
pub fn collect_candidates(responses: &[TechniqueResponse]) -> Vec<AggregatedSourceChunk> {
    responses
        .iter()
        .filter(|r| r.is_successful())
        .flat_map(|response| {
            response
                .source_chunks
                .iter()
                .enumerate()
                .map(|(pos, chunk)| {
                    AggregatedSourceChunk::from_source(chunk, &response.technique, pos + 1)
                })
        })
        .collect()
}

/// Collapse similar candidates into canonical records.
///
/// `threshold` is the Jaccard similarity at or above which two chunks'
/// content counts as the same passage.
#[must_use]
pub fn deduplicate(candidates: Vec<AggregatedSourceChunk>, threshold: f64) -> DedupOutcome {
    let tokens: Vec<BTreeSet<String>> = candidates
        .iter()
        .map(|c| token_set(&c.chunk.content))
        .collect();

    let mut processed = vec![false; candidates.len()];
    let mut chunks = Vec::with_capacity(candidates.len());
    let mut duplicates_removed = 0;

    for i in 0..candidates.len() {
        if processed[i] {
            continue;
        }
        processed[i] = true;
        let mut canonical = candidates[i].clone();

        for j in (i + 1)..candidates.len() {
            if processed[j] {
                continue;
            }
            if is_similar(
                &candidates[i].chunk,
                &candidates[j].chunk,
                jaccard(&tokens[i], &tokens[j]),
                threshold,
            ) {
                trace!(
                    canonical = %candidates[i].chunk.id,
                    merged = %candidates[j].chunk.id,
                    "merging duplicate chunk"
                );
                canonical.absorb(&candidates[j]);
                processed[j] = true;
                duplicates_removed += 1;
            }
        }

        chunks.push(canonical);
    }

    DedupOutcome {
        chunks,
        duplicates_removed,
    }
}

/// True when `a` and `b` describe the same passage under `threshold`.
#[must_use]
pub fn are_similar(a: &SourceChunk, b: &SourceChunk, threshold: f64) -> bool {
    let overlap = jaccard(&token_set(&a.content), &token_set(&b.content));
    is_similar(a, b, overlap, threshold)
}

fn is_similar(a: &SourceChunk, b: &SourceChunk, content_overlap: f64, threshold: f64) -> bool {
    is_adjacent(a, b) || content_overlap >= threshold
}

fn is_adjacent(a: &SourceChunk, b: &SourceChunk) -> bool {
    !a.document_id.is_empty()
        && a.document_id == b.document_id
        && a.chunk_index.abs_diff(b.chunk_index) <= 1
}

/// Lower-cased whitespace tokens of `text`.
#[must_use]
pub fn token_set(text: &str) -> BTreeSet<String> {
    text.split_whitespace().map(str::to_lowercase).collect()
}

/// Jaccard similarity `|A ∩ B| / |A ∪ B|`; `0.0` when both sets are empty.
#[must_use]
pub fn jaccard<T: Ord>(a: &BTreeSet<T>, b: &BTreeSet<T>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count() as f64;
    let union_size = a.union(b).count() as f64;
    intersection / union_size
}
