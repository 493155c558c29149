//! `ragfuse hybrid`: fuse a semantic and a lexical hit list.

use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};
use clap::Args;
use ragfuse_core::{HybridConfig, HybridMethod, NormalizationMethod};
use ragfuse_engine::{HybridHit, HybridOptions, HybridWeights, RankedHit, hybrid_fuse};
use serde::{Deserialize, Serialize};
use std::io::{self, Write};
use std::path::Path;
use std::str::FromStr;

use super::{load_config, read_json};

#[derive(Args, Debug)]
#[command(
    about = "Fuse semantic and lexical hit lists",
    long_about = "Read `{\"semantic\": [...], \"lexical\": [...]}` ranked hit lists and print one \
                  fused ranking. Each hit is `{\"id\", \"score\", \"rank\"}`; a missing rank \
                  means the hit's position in its list.",
    after_help = "EXAMPLES:\n    # Weighted sum with the configured weights\n    ragfuse hybrid --input hits.json\n\n\
                  # Rank-only fusion favoring the semantic list\n    ragfuse hybrid -i hits.json --method reciprocal_rank_fusion --semantic-weight 0.7\n\n\
                  # Top five, z-scored\n    ragfuse hybrid -i hits.json --normalize z_score -n 5"
)]
pub struct HybridArgs {
    /// Hit-list JSON file, or `-` for stdin.
    #[arg(short, long, default_value = "-")]
    pub input: String,

    /// Pair scoring method (weighted_sum, comb_sum, reciprocal_rank_fusion, adaptive).
    #[arg(long)]
    pub method: Option<HybridMethod>,

    /// Semantic weight in [0, 1]; the lexical weight becomes its complement.
    #[arg(long)]
    pub semantic_weight: Option<f64>,

    /// Per-list score normalization (min_max, z_score, rank_based, none).
    #[arg(long)]
    pub normalize: Option<NormalizeArg>,

    /// Maximum number of fused hits to print.
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,
}

/// `--normalize` value; `none` turns normalization off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizeArg(pub Option<NormalizationMethod>);

impl FromStr for NormalizeArg {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        NormalizationMethod::parse_setting(raw).map(Self)
    }
}

#[derive(Debug, Deserialize)]
struct HitLists {
    #[serde(default)]
    semantic: Vec<RankedHit>,
    #[serde(default)]
    lexical: Vec<RankedHit>,
}

/// JSON envelope for hybrid output.
#[derive(Debug, Serialize)]
pub struct HybridOutput {
    pub method: HybridMethod,
    pub semantic_weight: f64,
    pub lexical_weight: f64,
    pub normalization: Option<NormalizationMethod>,
    pub count: usize,
    /// Best hit first.
    pub results: Vec<HybridHit>,
}

fn resolve_options(args: &HybridArgs, config: &HybridConfig) -> anyhow::Result<HybridOptions> {
    let mut options = HybridOptions::from_config(config)?;
    if let Some(method) = args.method {
        options.method = method;
    }
    if let Some(semantic) = args.semantic_weight {
        options.weights = HybridWeights::new(semantic, 1.0 - semantic)?;
    }
    if let Some(NormalizeArg(normalization)) = args.normalize {
        options.normalization = normalization;
    }
    Ok(options)
}

/// Execute `ragfuse hybrid`.
///
/// # Errors
///
/// Returns an error if the config or hit lists cannot be loaded or the
/// resulting weights are invalid.
pub fn run_hybrid(
    args: &HybridArgs,
    output: OutputMode,
    project_root: &Path,
) -> anyhow::Result<()> {
    let file_config = load_config(project_root)?;
    let options = resolve_options(args, &file_config.hybrid)?;
    let lists: HitLists = read_json(&args.input)?;

    let mut results = hybrid_fuse(&lists.semantic, &lists.lexical, &options)?;
    if let Some(limit) = args.limit {
        results.truncate(limit);
    }

    let envelope = HybridOutput {
        method: options.method,
        semantic_weight: options.weights.semantic(),
        lexical_weight: options.weights.lexical(),
        normalization: options.normalization,
        count: results.len(),
        results,
    };
    render_mode(output, &envelope, render_text, render_pretty)
}

fn render_text(out: &HybridOutput, w: &mut dyn Write) -> io::Result<()> {
    writeln!(w, "rank  id  hybrid  semantic  lexical  semantic_rank  lexical_rank")?;
    for (i, hit) in out.results.iter().enumerate() {
        writeln!(
            w,
            "{}  {}  {:.4}  {:.4}  {:.4}  {}  {}",
            i + 1,
            hit.id,
            hit.hybrid_score,
            hit.semantic_score,
            hit.lexical_score,
            hit.semantic_rank,
            hit.lexical_rank
        )?;
    }
    Ok(())
}

fn render_pretty(out: &HybridOutput, w: &mut dyn Write) -> io::Result<()> {
    pretty_section(w, "Hybrid ranking")?;
    pretty_kv(w, "Method", out.method.as_str())?;
    pretty_kv(
        w,
        "Weights",
        format!(
            "semantic {:.2} / lexical {:.2}",
            out.semantic_weight, out.lexical_weight
        ),
    )?;
    pretty_kv(
        w,
        "Normalization",
        NormalizationMethod::setting_str(out.normalization),
    )?;
    writeln!(w)?;
    if out.results.is_empty() {
        writeln!(w, "(no hits)")?;
    }
    for (i, hit) in out.results.iter().enumerate() {
        writeln!(
            w,
            "{:>2}. {:<24} {:.4}  (semantic {:.4} #{}, lexical {:.4} #{})",
            i + 1,
            hit.id,
            hit.hybrid_score,
            hit.semantic_score,
            hit.semantic_rank,
            hit.lexical_score,
            hit.lexical_rank
        )?;
    }
    Ok(())
}
