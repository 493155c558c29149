//! Confidence floor, ordering and result cap.

use ragfuse_core::AggregatedSourceChunk;

/// Surviving chunks, best first, plus how many were dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct RankOutcome {
    pub chunks: Vec<AggregatedSourceChunk>,
    /// Dropped by the confidence floor or the result cap.
    pub filtered: usize,
}

/// Drop chunks below `min_confidence`, sort by `aggregated_score` descending
/// (ties keep first-seen order) and keep at most `max_results`.
#[must_use]
pub fn rank_and_filter(
    chunks: Vec<AggregatedSourceChunk>,
    min_confidence: f64,
    max_results: usize,
) -> RankOutcome {
    let before = chunks.len();
    let mut kept: Vec<AggregatedSourceChunk> = chunks
        .into_iter()
        .filter(|c| c.confidence_level() >= min_confidence)
        .collect();

    kept.sort_by(|a, b| b.aggregated_score.total_cmp(&a.aggregated_score));
    kept.truncate(max_results);

    RankOutcome {
        filtered: before - kept.len(),
        chunks: kept,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragfuse_core::{SourceChunk, Technique};

    fn scored(id: &str, aggregated: f64, confidence: f64) -> AggregatedSourceChunk {
        let mut chunk = AggregatedSourceChunk::from_source(
            &SourceChunk::new(id, id, 0, id, aggregated),
            &Technique::from("semantic_search"),
            1,
        );
        chunk.aggregated_score = aggregated;
        chunk.normalized_metadata.confidence_level = confidence;
        chunk
    }

    fn ids(outcome: &RankOutcome) -> Vec<&str> {
        outcome.chunks.iter().map(|c| c.chunk.id.as_str()).collect()
    }

    #[test]
    fn sorts_descending_with_stable_ties() {
        let outcome = rank_and_filter(
            vec![
                scored("a", 0.2, 0.5),
                scored("b", 0.9, 0.5),
                scored("c", 0.2, 0.5),
            ],
            0.1,
            20,
        );
        assert_eq!(ids(&outcome), vec!["b", "a", "c"]);
        assert_eq!(outcome.filtered, 0);
    }

    #[test]
    fn floor_applies_before_cap() {
        let outcome = rank_and_filter(
            vec![
                scored("low", 0.99, 0.05),
                scored("a", 0.5, 0.1),
                scored("b", 0.4, 0.8),
                scored("c", 0.3, 0.8),
            ],
            0.1,
            2,
        );
        assert_eq!(ids(&outcome), vec!["a", "b"]);
        assert_eq!(outcome.filtered, 2);
    }

    #[test]
    fn empty_input_is_empty_output() {
        let outcome = rank_and_filter(Vec::new(), 0.1, 20);
        assert!(outcome.chunks.is_empty());
        assert_eq!(outcome.filtered, 0);
    }
}
