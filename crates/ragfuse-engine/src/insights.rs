//! Cross-technique statistics, fused answer text, and overall confidence.
//!
//! Everything here reads only successful responses and the final ranked
//! chunk list. Empty inputs degrade to fixed constants instead of NaN:
//!
//! | Quantity                    | Empty-input value |
//! |-----------------------------|-------------------|
//! | `technique_agreement_score` | 0.0               |
//! | `coverage_overlap`          | 1.0 (< 2 responses) |
//! | `diversity_score`           | 0.0               |
//! | `overall_confidence` parts  | 0.0               |

use ragfuse_core::{
    AggregatedSourceChunk, AggregationInsights, SourceChunk, Technique, TechniqueResponse,
};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;

use crate::duplicates::jaccard;

/// Ranked chunks that feed the fused answer and the overall confidence.
pub const TOP_CHUNKS: usize = 3;
/// Characters of each top chunk quoted under a technique's answer.
pub const SNIPPET_CHARS: usize = 200;

/// Compute agreement, coverage and diversity statistics.
#[must_use]
pub fn generate_insights(
    responses: &[TechniqueResponse],
    ranked: &[AggregatedSourceChunk],
) -> AggregationInsights {
    let successful: Vec<&TechniqueResponse> =
        responses.iter().filter(|r| r.is_successful()).collect();

    let mut technique_contributions: BTreeMap<Technique, usize> = BTreeMap::new();
    for chunk in ranked {
        for technique in &chunk.found_by_techniques {
            *technique_contributions.entry(technique.clone()).or_default() += 1;
        }
    }

    let unique_documents = ranked
        .iter()
        .map(|c| c.chunk.document_id.as_str())
        .collect::<BTreeSet<_>>()
        .len();

    AggregationInsights {
        best_performing_technique: best_performing_technique(&successful),
        technique_agreement_score: agreement_score(ranked),
        coverage_overlap: coverage_overlap(&successful),
        diversity_score: diversity_score(unique_documents, ranked.len()),
        technique_contributions,
        unique_documents,
    }
}

/// Highest sum of own raw chunk scores; the earliest response wins ties.
fn best_performing_technique(successful: &[&TechniqueResponse]) -> Option<Technique> {
    let mut best: Option<(&Technique, f64)> = None;
    for response in successful {
        let total: f64 = response.source_chunks.iter().map(SourceChunk::finite_score).sum();
        if best.is_none_or(|(_, best_total)| total > best_total) {
            best = Some((&response.technique, total));
        }
    }
    best.map(|(technique, _)| technique.clone())
}

fn agreement_score(ranked: &[AggregatedSourceChunk]) -> f64 {
    if ranked.is_empty() {
        return 0.0;
    }
    let agreed = ranked.iter().filter(|c| c.found_by_count() > 1).count();
    agreed as f64 / ranked.len() as f64
}

/// Mean pairwise Jaccard similarity of the responses' document sets.
fn coverage_overlap(successful: &[&TechniqueResponse]) -> f64 {
    if successful.len() < 2 {
        return 1.0;
    }
    let doc_sets: Vec<BTreeSet<&str>> = successful
        .iter()
        .map(|r| {
            r.source_chunks
                .iter()
                .map(|c| c.document_id.as_str())
                .collect()
        })
        .collect();

    let mut total = 0.0;
    let mut pairs = 0_usize;
    for (i, a) in doc_sets.iter().enumerate() {
        for b in &doc_sets[i + 1..] {
            total += jaccard(a, b);
            pairs += 1;
        }
    }
    total / pairs as f64
}

fn diversity_score(unique_documents: usize, chunk_count: usize) -> f64 {
    if chunk_count == 0 {
        return 0.0;
    }
    (unique_documents as f64 / chunk_count as f64).min(1.0)
}

/// Build the answer text shown with the result.
///
/// The first successful response (in input order) with a non-blank answer
/// is used, followed by a bullet list quoting the first 200 characters of
/// each of the top three ranked chunks. Without any answer, the top three
/// chunks' full content is joined by blank lines.
#[must_use]
pub fn fuse_answer(responses: &[TechniqueResponse], ranked: &[AggregatedSourceChunk]) -> String {
    let top = &ranked[..ranked.len().min(TOP_CHUNKS)];

    let answer = responses
        .iter()
        .filter(|r| r.is_successful())
        .map(|r| r.answer.trim())
        .find(|a| !a.is_empty());

    match answer {
        Some(answer) => {
            let mut out = answer.to_string();
            if !top.is_empty() {
                out.push_str("\n\nKey sources:");
                for chunk in top {
                    let snippet: String =
                        chunk.chunk.content.chars().take(SNIPPET_CHARS).collect();
                    let _ = write!(out, "\n- {}", snippet.trim());
                }
            }
            out
        }
        None => top
            .iter()
            .map(|c| c.chunk.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n"),
    }
}

/// Mean top-three confidence averaged with the response success rate.
#[must_use]
pub fn overall_confidence(
    responses: &[TechniqueResponse],
    ranked: &[AggregatedSourceChunk],
) -> f64 {
    let top = &ranked[..ranked.len().min(TOP_CHUNKS)];
    let top_confidence = if top.is_empty() {
        0.0
    } else {
        top.iter().map(AggregatedSourceChunk::confidence_level).sum::<f64>() / top.len() as f64
    };
    let success_rate = if responses.is_empty() {
        0.0
    } else {
        responses.iter().filter(|r| r.is_successful()).count() as f64 / responses.len() as f64
    };
    ((top_confidence + success_rate) / 2.0).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragfuse_core::SourceChunk;

    fn assert_approx_eq(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= 1e-10,
            "actual ({actual}) != expected ({expected})"
        );
    }

    fn ranked_chunk(
        id: &str,
        doc: &str,
        content: &str,
        found_by: &[&str],
    ) -> AggregatedSourceChunk {
        let mut chunk = AggregatedSourceChunk::from_source(
            &SourceChunk::new(id, doc, 0, content, 0.5),
            &Technique::from(found_by[0]),
            1,
        );
        for technique in &found_by[1..] {
            chunk.absorb(&AggregatedSourceChunk::from_source(
                &SourceChunk::new(id, doc, 0, content, 0.5),
                &Technique::from(*technique),
                1,
            ));
        }
        chunk
    }

    fn response(technique: &str, docs_scores: &[(&str, f64)]) -> TechniqueResponse {
        TechniqueResponse::completed(
            technique,
            docs_scores
                .iter()
                .enumerate()
                .map(|(i, (doc, score))| {
                    SourceChunk::new(format!("{technique}-{i}"), *doc, i, "x", *score)
                })
                .collect(),
        )
    }

    #[test]
    fn best_technique_has_highest_score_sum() {
        let responses = vec![
            response("semantic_search", &[("d1", 0.9), ("d2", 0.2)]),
            response("lexical_search", &[("d1", 0.6), ("d3", 0.6)]),
            TechniqueResponse::failed("agentic_rag", "timeout"),
        ];
        let insights = generate_insights(&responses, &[]);
        assert_eq!(
            insights.best_performing_technique.as_ref().map(Technique::as_str),
            Some("lexical_search")
        );
    }

    #[test]
    fn best_technique_tie_goes_to_first() {
        let responses = vec![
            response("semantic_search", &[("d1", 0.5)]),
            response("lexical_search", &[("d1", 0.5)]),
        ];
        let insights = generate_insights(&responses, &[]);
        assert_eq!(
            insights.best_performing_technique.as_ref().map(Technique::as_str),
            Some("semantic_search")
        );
    }

    #[test]
    fn coverage_is_mean_pairwise_jaccard() {
        let responses = vec![
            response("a", &[("d1", 0.1), ("d2", 0.1)]),
            response("b", &[("d2", 0.1), ("d3", 0.1)]),
            response("c", &[("d1", 0.1), ("d2", 0.1)]),
        ];
        // ab = 1/3, ac = 1, bc = 1/3
        let insights = generate_insights(&responses, &[]);
        assert_approx_eq(insights.coverage_overlap, (1.0 / 3.0 + 1.0 + 1.0 / 3.0) / 3.0);
    }

    #[test]
    fn coverage_with_single_response_is_one() {
        let insights = generate_insights(&[response("a", &[("d1", 0.1)])], &[]);
        assert_approx_eq(insights.coverage_overlap, 1.0);
    }

    #[test]
    fn agreement_diversity_and_contributions() {
        let ranked = vec![
            ranked_chunk("c1", "d1", "alpha", &["semantic_search", "lexical_search"]),
            ranked_chunk("c2", "d1", "beta", &["semantic_search"]),
            ranked_chunk("c3", "d2", "gamma", &["reranking"]),
            ranked_chunk("c4", "d3", "delta", &["lexical_search", "reranking"]),
        ];
        let insights = generate_insights(&[], &ranked);
        assert_approx_eq(insights.technique_agreement_score, 0.5);
        assert_approx_eq(insights.diversity_score, 0.75);
        assert_eq!(insights.unique_documents, 3);
        assert_eq!(insights.technique_contributions.get("semantic_search"), Some(&2));
        assert_eq!(insights.technique_contributions.get("reranking"), Some(&2));
        assert_eq!(insights.best_performing_technique, None);
    }

    #[test]
    fn empty_ranked_set_degrades_to_zero() {
        let insights = generate_insights(&[], &[]);
        assert_approx_eq(insights.technique_agreement_score, 0.0);
        assert_approx_eq(insights.diversity_score, 0.0);
        assert_eq!(insights.unique_documents, 0);
    }

    #[test]
    fn fused_answer_prefers_first_technique_answer() {
        let long = "y".repeat(300);
        let ranked = vec![
            ranked_chunk("c1", "d1", &long, &["semantic_search"]),
            ranked_chunk("c2", "d2", "second", &["semantic_search"]),
        ];
        let responses = vec![
            response("semantic_search", &[]).with_answer("   "),
            TechniqueResponse::failed("agentic_rag", "x").with_answer("ignored"),
            response("lexical_search", &[]).with_answer("Plant garlic in autumn."),
            response("reranking", &[]).with_answer("Later answer"),
        ];
        let answer = fuse_answer(&responses, &ranked);
        let expected = format!(
            "Plant garlic in autumn.\n\nKey sources:\n- {}\n- second",
            "y".repeat(200)
        );
        assert_eq!(answer, expected);
    }

    #[test]
    fn fused_answer_without_answers_joins_top_three() {
        let ranked = vec![
            ranked_chunk("c1", "d1", "one", &["a"]),
            ranked_chunk("c2", "d2", "two", &["a"]),
            ranked_chunk("c3", "d3", "three", &["a"]),
            ranked_chunk("c4", "d4", "four", &["a"]),
        ];
        let answer = fuse_answer(&[response("a", &[])], &ranked);
        assert_eq!(answer, "one\n\ntwo\n\nthree");
    }

    #[test]
    fn overall_confidence_blends_top_three_and_success_rate() {
        let mut ranked = vec![
            ranked_chunk("c1", "d1", "one", &["a"]),
            ranked_chunk("c2", "d2", "two", &["a"]),
            ranked_chunk("c3", "d3", "three", &["a"]),
            ranked_chunk("c4", "d4", "four", &["a"]),
        ];
        for (chunk, level) in ranked.iter_mut().zip([0.9, 0.6, 0.3, 0.0]) {
            chunk.normalized_metadata.confidence_level = level;
        }
        let responses = vec![response("a", &[]), TechniqueResponse::failed("b", "down")];
        assert_approx_eq(overall_confidence(&responses, &ranked), (0.6 + 0.5) / 2.0);
    }
}
