//! `ragfuse aggregate`: fuse one query's technique responses.

use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};
use clap::Args;
use ragfuse_core::{
    AggregateRequest, AggregatedRAGResult, AggregationConfig, ConfidenceAlgorithm, FusionStrategy,
    Technique,
};
use ragfuse_engine::aggregate_request;
use std::io::{self, Write};
use std::path::Path;
use tracing::debug;

use super::{load_config, read_json};

#[derive(Args, Debug)]
#[command(
    about = "Aggregate technique responses into one ranked result",
    long_about = "Read an aggregation request (technique responses plus query) as JSON, \
                  deduplicate and fuse the retrieved chunks, score confidence, and print \
                  the ranked result.\n\n\
                  Configuration precedence: flags > request `config` block > \
                  .ragfuse/config.toml > user config > built-in defaults.",
    after_help = "EXAMPLES:\n    # Aggregate a request file with the configured defaults\n    ragfuse aggregate --input request.json\n\n\
                  # Read from stdin and switch the fusion formula\n    cat request.json | ragfuse aggregate --strategy comb_max\n\n\
                  # Keep everything, no merging\n    ragfuse aggregate -i request.json --no-dedup --min-confidence 0\n\n\
                  # Machine-readable output\n    ragfuse aggregate -i request.json --format json"
)]
pub struct AggregateArgs {
    /// Request JSON file, or `-` for stdin.
    #[arg(short, long, default_value = "-")]
    pub input: String,

    /// Fusion strategy (reciprocal_rank_fusion, weighted_sum, comb_sum, comb_max, adaptive, vote_based).
    #[arg(long)]
    pub strategy: Option<FusionStrategy>,

    /// Confidence algorithm (score_based, technique_weighted, consensus_based, statistical).
    #[arg(long)]
    pub confidence: Option<ConfidenceAlgorithm>,

    /// Maximum number of chunks to return.
    #[arg(short = 'n', long)]
    pub max_results: Option<usize>,

    /// Drop chunks whose confidence level is below this value.
    #[arg(long)]
    pub min_confidence: Option<f64>,

    /// Disable duplicate merging.
    #[arg(long)]
    pub no_dedup: bool,

    /// Jaccard similarity at which two chunks count as the same passage.
    #[arg(long)]
    pub duplicate_threshold: Option<f64>,
}

impl AggregateArgs {
    fn apply_overrides(&self, config: &mut AggregationConfig) {
        if let Some(strategy) = self.strategy {
            config.fusion_strategy = strategy;
        }
        if let Some(algorithm) = self.confidence {
            config.confidence_algorithm = algorithm;
        }
        if let Some(max) = self.max_results {
            config.max_results = max;
        }
        if let Some(min) = self.min_confidence {
            config.min_confidence = min;
        }
        if self.no_dedup {
            config.enable_deduplication = false;
        }
        if let Some(threshold) = self.duplicate_threshold {
            config.duplicate_threshold = threshold;
        }
    }
}

/// Execute `ragfuse aggregate`.
///
/// # Errors
///
/// Returns an error if the config or request cannot be loaded, the merged
/// configuration is out of range, or no technique response succeeded.
pub fn run_aggregate(
    args: &AggregateArgs,
    output: OutputMode,
    project_root: &Path,
) -> anyhow::Result<()> {
    let file_config = load_config(project_root)?;
    let mut request: AggregateRequest = read_json(&args.input)?;

    let mut config = request
        .config
        .take()
        .unwrap_or_else(|| file_config.aggregation.clone());
    args.apply_overrides(&mut config);
    debug!(
        strategy = %config.fusion_strategy,
        algorithm = %config.confidence_algorithm,
        "effective aggregation config"
    );
    request.config = Some(config);

    let result = aggregate_request(request, &file_config.aggregation)?;
    render_mode(output, &result, render_text, render_pretty)
}

fn render_text(result: &AggregatedRAGResult, w: &mut dyn Write) -> io::Result<()> {
    writeln!(w, "rank  score  confidence  tier  id  document  techniques")?;
    for (i, chunk) in result.aggregated_chunks.iter().enumerate() {
        let techniques: Vec<&str> = chunk
            .found_by_techniques
            .iter()
            .map(Technique::as_str)
            .collect();
        writeln!(
            w,
            "{}  {:.4}  {:.2}  {}  {}  {}  {}",
            i + 1,
            chunk.aggregated_score,
            chunk.confidence_level(),
            chunk.normalized_metadata.relevance_tier,
            chunk.chunk.id,
            chunk.chunk.document_id,
            techniques.join(",")
        )?;
    }
    writeln!(
        w,
        "overall_confidence {:.2}  techniques {}/{}  duplicates_removed {}  filtered {}",
        result.overall_confidence,
        result.metadata.successful_techniques,
        result.metadata.total_techniques,
        result.metadata.duplicates_removed,
        result.metadata.chunks_filtered
    )
}

fn render_pretty(result: &AggregatedRAGResult, w: &mut dyn Write) -> io::Result<()> {
    let meta = &result.metadata;
    pretty_section(w, &format!("Aggregation {}", result.aggregation_id))?;
    pretty_kv(w, "Query", &result.query_config.query)?;
    pretty_kv(
        w,
        "Strategy",
        format!("{} / {}", meta.fusion_strategy, meta.confidence_algorithm),
    )?;
    pretty_kv(
        w,
        "Techniques",
        format!(
            "{} of {} succeeded",
            meta.successful_techniques, meta.total_techniques
        ),
    )?;
    pretty_kv(
        w,
        "Chunks",
        format!(
            "{} kept from {} ({} merged, {} filtered)",
            meta.final_chunk_count,
            meta.total_chunks_before_dedup,
            meta.duplicates_removed,
            meta.chunks_filtered
        ),
    )?;
    pretty_kv(w, "Confidence", format!("{:.2}", result.overall_confidence))?;
    pretty_kv(w, "Elapsed", format!("{} ms", meta.aggregation_time_ms))?;

    writeln!(w)?;
    pretty_section(w, "Answer")?;
    if result.fused_answer.is_empty() {
        writeln!(w, "(no answer)")?;
    } else {
        writeln!(w, "{}", result.fused_answer)?;
    }

    writeln!(w)?;
    pretty_section(w, "Sources")?;
    if result.aggregated_chunks.is_empty() {
        writeln!(w, "(none above the confidence floor)")?;
    }
    for (i, chunk) in result.aggregated_chunks.iter().enumerate() {
        let techniques: Vec<&str> = chunk
            .found_by_techniques
            .iter()
            .map(Technique::as_str)
            .collect();
        writeln!(
            w,
            "{:>2}. [{:.4}] {} ({}#{})  {} {:.2}",
            i + 1,
            chunk.aggregated_score,
            chunk.chunk.id,
            chunk.chunk.document_id,
            chunk.chunk.chunk_index,
            chunk.normalized_metadata.relevance_tier,
            chunk.confidence_level()
        )?;
        writeln!(w, "    found by {}", techniques.join(", "))?;
    }

    let insights = &result.insights;
    writeln!(w)?;
    pretty_section(w, "Insights")?;
    pretty_kv(
        w,
        "Best",
        insights
            .best_performing_technique
            .as_ref()
            .map_or("-", Technique::as_str),
    )?;
    pretty_kv(
        w,
        "Agreement",
        format!("{:.2}", insights.technique_agreement_score),
    )?;
    pretty_kv(w, "Coverage", format!("{:.2}", insights.coverage_overlap))?;
    pretty_kv(w, "Diversity", format!("{:.2}", insights.diversity_score))?;
    pretty_kv(w, "Documents", insights.unique_documents.to_string())
}
