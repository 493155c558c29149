//! End-to-end aggregation scenarios.
//!
//! Each test builds technique responses by hand, runs the full pipeline and
//! checks the published numbers: RRF arithmetic, merge-then-fuse ordering,
//! vote scoring, failure handling and run-to-run determinism.

use ragfuse_core::{
    AggregateError, AggregateRequest, AggregatedRAGResult, AggregationConfig, ConfidenceAlgorithm,
    FusionStrategy, QueryConfig, RelevanceTier, ResponseStatus, SourceChunk, TechniqueResponse,
};
use ragfuse_engine::{Aggregator, aggregate_request};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn assert_approx_eq(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() <= 1e-10,
        "actual ({actual}) != expected ({expected})"
    );
}

fn aggregator(strategy: FusionStrategy, algorithm: ConfidenceAlgorithm) -> Aggregator {
    Aggregator::new(AggregationConfig {
        fusion_strategy: strategy,
        confidence_algorithm: algorithm,
        ..AggregationConfig::default()
    })
    .expect("valid config")
}

fn run(aggregator: &Aggregator, responses: Vec<TechniqueResponse>) -> AggregatedRAGResult {
    aggregator
        .aggregate(responses, QueryConfig::new("when to plant garlic"))
        .expect("aggregation succeeds")
}

fn adjacent_pair() -> Vec<TechniqueResponse> {
    vec![
        TechniqueResponse::completed(
            "semantic_search",
            vec![SourceChunk::new("c1", "doc-1", 3, "plant garlic in autumn", 0.9)],
        ),
        TechniqueResponse::completed(
            "lexical_search",
            vec![SourceChunk::new("c2", "doc-1", 4, "harvest when leaves brown", 0.8)],
        ),
    ]
}

fn garden_corpus() -> Vec<TechniqueResponse> {
    vec![
        TechniqueResponse::completed(
            "semantic_search",
            vec![
                SourceChunk::new("s1", "guide", 0, "Garlic prefers loose well drained soil", 0.92),
                SourceChunk::new("s2", "almanac", 12, "Plant cloves six weeks before frost", 0.81),
                SourceChunk::new("s3", "forum", 3, "Mulch heavily over winter", 0.55),
            ],
        )
        .with_answer("Plant garlic in autumn, about six weeks before the ground freezes.")
        .with_execution_time(120),
        TechniqueResponse::completed(
            "lexical_search",
            vec![
                SourceChunk::new("l1", "almanac", 13, "Cloves go in pointy end up", 0.74),
                SourceChunk::new("l2", "blog", 0, "garlic prefers loose well drained soil", 0.88),
            ],
        )
        .with_execution_time(15),
        TechniqueResponse::completed(
            "reranking",
            vec![SourceChunk::new("r1", "forum", 4, "Remove mulch in spring", 0.77)],
        )
        .with_confidence(0.8)
        .with_execution_time(900),
        TechniqueResponse::failed("agentic_rag", "llm quota exceeded"),
    ]
}

// ---------------------------------------------------------------------------
// Formulas
// ---------------------------------------------------------------------------

#[test]
fn rrf_two_first_ranks_sum_to_two_over_sixty_one() {
    let result = run(
        &aggregator(
            FusionStrategy::ReciprocalRankFusion,
            ConfidenceAlgorithm::ConsensusBased,
        ),
        adjacent_pair(),
    );
    assert_eq!(result.aggregated_chunks.len(), 1);
    assert_approx_eq(result.aggregated_chunks[0].aggregated_score, 2.0 / 61.0);
}

#[test]
fn adjacent_chunks_merge_before_fusion() {
    for strategy in [FusionStrategy::CombSum, FusionStrategy::WeightedSum] {
        let result = run(
            &aggregator(strategy, ConfidenceAlgorithm::ConsensusBased),
            adjacent_pair(),
        );
        assert_eq!(result.metadata.duplicates_removed, 1, "{strategy}");
        assert_eq!(result.aggregated_chunks.len(), 1, "{strategy}");

        let merged = &result.aggregated_chunks[0];
        assert_eq!(merged.chunk.id, "c1");
        assert_eq!(merged.chunk.content, "plant garlic in autumn");
        assert_eq!(merged.found_by_count(), 2);
        assert_approx_eq(merged.aggregated_score, 0.85);
    }
}

#[test]
fn vote_based_single_chunk_is_mean_of_one_and_raw_score() {
    let responses = vec![TechniqueResponse::completed(
        "semantic_search",
        vec![SourceChunk::new("c1", "doc-1", 0, "only chunk", 0.4)],
    )];
    let result = run(
        &aggregator(FusionStrategy::VoteBased, ConfidenceAlgorithm::ConsensusBased),
        responses,
    );
    assert_approx_eq(result.aggregated_chunks[0].aggregated_score, (1.0 + 0.4) / 2.0);
}

#[test]
fn comb_max_takes_the_strongest_technique() {
    let result = run(
        &aggregator(FusionStrategy::CombMax, ConfidenceAlgorithm::ScoreBased),
        adjacent_pair(),
    );
    let merged = &result.aggregated_chunks[0];
    assert_approx_eq(merged.aggregated_score, 0.9);
    assert_approx_eq(merged.confidence_level(), 0.9);
    assert_eq!(merged.normalized_metadata.relevance_tier, RelevanceTier::High);
}

// ---------------------------------------------------------------------------
// Failure handling
// ---------------------------------------------------------------------------

#[test]
fn empty_responses_are_rejected() {
    let err = Aggregator::default()
        .aggregate(Vec::new(), QueryConfig::default())
        .unwrap_err();
    assert_eq!(err, AggregateError::NoSuccessfulResponses { total: 0 });
}

#[test]
fn all_failed_responses_are_rejected() {
    let responses = vec![
        TechniqueResponse::failed("semantic_search", "embedding service down"),
        TechniqueResponse {
            status: ResponseStatus::Timeout,
            ..TechniqueResponse::completed("lexical_search", vec![])
        },
    ];
    let err = Aggregator::default()
        .aggregate(responses, QueryConfig::default())
        .unwrap_err();
    assert_eq!(err, AggregateError::NoSuccessfulResponses { total: 2 });
}

#[test]
fn failed_responses_are_preserved_but_excluded() {
    let corpus = garden_corpus();
    let result = run(&Aggregator::default(), corpus.clone());

    assert_eq!(result.technique_responses, corpus);
    assert_eq!(result.metadata.failed_techniques, 1);
    assert!(
        result
            .aggregated_chunks
            .iter()
            .all(|c| !c.technique_scores.contains_key("agentic_rag"))
    );
    assert!(!result.insights.technique_contributions.contains_key("agentic_rag"));
}

#[test]
fn malformed_chunks_default_instead_of_failing() {
    let request: AggregateRequest = serde_json::from_str(
        r#"{
            "responses": [
                {"technique": "semantic_search", "status": "completed",
                 "source_chunks": [{"id": "a"}, {"id": "b", "document_id": "d", "score": 0.5}]}
            ],
            "query_config": {"query": "q"}
        }"#,
    )
    .expect("request parses");
    let config = AggregationConfig {
        min_confidence: 0.0,
        ..AggregationConfig::default()
    };
    let result = aggregate_request(request, &config).expect("aggregation succeeds");
    assert_eq!(result.metadata.total_chunks_before_dedup, 2);
    assert!(
        result
            .aggregated_chunks
            .iter()
            .all(|c| c.aggregated_score.is_finite())
    );
}

#[test]
fn null_and_ill_typed_chunk_fields_do_not_reject_the_request() {
    let request: AggregateRequest = serde_json::from_str(
        r#"{
            "responses": [
                {"technique": "semantic_search", "status": "completed",
                 "source_chunks": [
                    {"id": "good", "document_id": "d1", "chunk_index": 0,
                     "content": "plant garlic in autumn", "score": 0.9},
                    {"id": "bad", "document_id": null, "chunk_index": -1,
                     "content": null, "score": null, "metadata": null},
                    null
                 ]},
                {"technique": "lexical_search", "status": "exploded",
                 "source_chunks": [{"id": "ignored", "score": 5.0}]},
                {"technique": "reranking", "status": "completed", "answer": null,
                 "confidence_score": "high",
                 "source_chunks": [{"id": "good", "document_id": "d1",
                                    "content": "plant garlic in autumn", "score": "0.8"}]}
            ],
            "query_config": {"query": "q"}
        }"#,
    )
    .expect("request parses");
    let config = AggregationConfig {
        min_confidence: 0.0,
        ..AggregationConfig::default()
    };
    let result = aggregate_request(request, &config).expect("aggregation succeeds");

    let meta = &result.metadata;
    assert_eq!(meta.total_techniques, 3);
    assert_eq!(meta.successful_techniques, 2);
    assert_eq!(meta.total_chunks_before_dedup, 3);

    let ids: Vec<&str> = result
        .aggregated_chunks
        .iter()
        .map(|c| c.chunk.id.as_str())
        .collect();
    assert!(ids.contains(&"good"), "{ids:?}");
    assert!(ids.contains(&"bad"), "{ids:?}");
    assert!(!ids.contains(&"ignored"), "{ids:?}");

    let bad = result
        .aggregated_chunks
        .iter()
        .find(|c| c.chunk.id == "bad")
        .expect("bad chunk kept");
    assert!(bad.chunk.content.is_empty());
    assert_eq!(bad.chunk.chunk_index, 0);
    assert_eq!(bad.technique_scores.get("semantic_search"), Some(&0.0));
    assert!(
        result
            .aggregated_chunks
            .iter()
            .all(|c| c.aggregated_score.is_finite() && c.confidence_level().is_finite())
    );
}

// ---------------------------------------------------------------------------
// Whole-result properties
// ---------------------------------------------------------------------------

#[test]
fn output_is_sorted_and_within_cap() {
    for strategy in FusionStrategy::ALL {
        let config = AggregationConfig {
            fusion_strategy: *strategy,
            max_results: 3,
            min_confidence: 0.0,
            ..AggregationConfig::default()
        };
        let result = run(&Aggregator::new(config).expect("valid"), garden_corpus());
        assert!(result.aggregated_chunks.len() <= 3);
        for pair in result.aggregated_chunks.windows(2) {
            assert!(
                pair[0].aggregated_score >= pair[1].aggregated_score,
                "{strategy}: not sorted"
            );
        }
    }
}

#[test]
fn garden_corpus_merges_text_and_position_duplicates() {
    let result = run(&Aggregator::default(), garden_corpus());
    // l2 repeats s1's text, l1 is adjacent to s2, r1 is adjacent to s3.
    assert_eq!(result.metadata.total_chunks_before_dedup, 6);
    assert_eq!(result.metadata.duplicates_removed, 3);
    assert_eq!(result.chunk_ids(), vec!["s1", "s2", "s3"]);
    assert_approx_eq(result.insights.technique_agreement_score, 1.0);
    assert!(result.fused_answer.starts_with("Plant garlic in autumn"));
    assert!(result.fused_answer.contains("Key sources:"));
    assert!((0.0..=1.0).contains(&result.overall_confidence));
    assert_eq!(
        result
            .insights
            .best_performing_technique
            .as_ref()
            .map(ragfuse_core::Technique::as_str),
        Some("semantic_search")
    );
}

#[test]
fn repeated_runs_are_identical_apart_from_id_and_timing() {
    fn stable_view(result: &AggregatedRAGResult) -> serde_json::Value {
        let mut value = serde_json::to_value(result).expect("serializes");
        let object = value.as_object_mut().expect("object");
        object.remove("aggregation_id");
        let metadata = object
            .get_mut("metadata")
            .and_then(serde_json::Value::as_object_mut)
            .expect("metadata object");
        metadata.remove("aggregation_time_ms");
        metadata.remove("created_at");
        value
    }

    for algorithm in ConfidenceAlgorithm::ALL {
        let aggregator = aggregator(FusionStrategy::Adaptive, *algorithm);
        let first = run(&aggregator, garden_corpus());
        let second = run(&aggregator, garden_corpus());
        assert_ne!(first.aggregation_id, second.aggregation_id);
        assert_eq!(stable_view(&first), stable_view(&second), "{algorithm}");
    }
}
