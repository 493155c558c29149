//! Aggregation configuration: strategy selectors, thresholds, and loading
//! from `.ragfuse/config.toml` (project) or `<config_dir>/ragfuse/config.toml`
//! (user).

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::error::AggregateError;
use crate::model::Technique;

/// Implements `as_str`, `ALL`, `Display` and `FromStr` for a unit-only enum
/// whose serde names are the same snake_case strings.
macro_rules! named_enum {
    ($ty:ident { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl $ty {
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $name),+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = String;

            fn from_str(raw: &str) -> std::result::Result<Self, Self::Err> {
                let wanted = raw.trim().to_ascii_lowercase().replace('-', "_");
                Self::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str() == wanted)
                    .ok_or_else(|| {
                        let names: Vec<&str> = Self::ALL.iter().map(|v| v.as_str()).collect();
                        format!("unknown {} '{raw}' (expected one of: {})", stringify!($ty), names.join(", "))
                    })
            }
        }
    };
}

/// N-way fusion formula used to compute `aggregated_score`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FusionStrategy {
    #[default]
    ReciprocalRankFusion,
    WeightedSum,
    CombSum,
    CombMax,
    Adaptive,
    VoteBased,
}

named_enum!(FusionStrategy {
    ReciprocalRankFusion => "reciprocal_rank_fusion",
    WeightedSum => "weighted_sum",
    CombSum => "comb_sum",
    CombMax => "comb_max",
    Adaptive => "adaptive",
    VoteBased => "vote_based",
});

/// Algorithm assigning `confidence_level` to each merged chunk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceAlgorithm {
    ScoreBased,
    TechniqueWeighted,
    #[default]
    ConsensusBased,
    Statistical,
}

named_enum!(ConfidenceAlgorithm {
    ScoreBased => "score_based",
    TechniqueWeighted => "technique_weighted",
    ConsensusBased => "consensus_based",
    Statistical => "statistical",
});

/// Two-list (semantic + lexical) scoring formula for hybrid search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HybridMethod {
    #[default]
    WeightedSum,
    CombSum,
    ReciprocalRankFusion,
    Adaptive,
}

named_enum!(HybridMethod {
    WeightedSum => "weighted_sum",
    CombSum => "comb_sum",
    ReciprocalRankFusion => "reciprocal_rank_fusion",
    Adaptive => "adaptive",
});

/// Rescaling applied to one score column before hybrid scoring.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalizationMethod {
    #[default]
    MinMax,
    ZScore,
    RankBased,
}

named_enum!(NormalizationMethod {
    MinMax => "min_max",
    ZScore => "z_score",
    RankBased => "rank_based",
});

impl NormalizationMethod {
    /// Spelling that turns per-column normalization off.
    pub const DISABLED: &'static str = "none";

    /// Parse a normalization setting where `none` means raw scores.
    ///
    /// # Errors
    ///
    /// Returns a message listing the accepted names when `raw` is neither
    /// `none` nor a method name.
    pub fn parse_setting(raw: &str) -> std::result::Result<Option<Self>, String> {
        if raw.trim().eq_ignore_ascii_case(Self::DISABLED) {
            return Ok(None);
        }
        raw.parse::<Self>()
            .map(Some)
            .map_err(|err| format!("{err} or '{}'", Self::DISABLED))
    }

    /// Inverse of [`NormalizationMethod::parse_setting`].
    #[must_use]
    pub fn setting_str(setting: Option<Self>) -> &'static str {
        setting.map_or(Self::DISABLED, Self::as_str)
    }
}

/// How technique executions are scheduled before aggregation.
///
/// Chosen by the caller of `execute_techniques`; config files do not carry it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    #[default]
    Parallel,
    Sequential,
    DependencyResolved,
}

named_enum!(ExecutionMode {
    Parallel => "parallel",
    Sequential => "sequential",
    DependencyResolved => "dependency_resolved",
});

/// Knobs for one aggregation call.
///
/// The defaults pair reciprocal rank fusion with consensus-based confidence,
/// which keeps every confidence level inside `[0, 1]` without extra
/// normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregationConfig {
    #[serde(default)]
    pub fusion_strategy: FusionStrategy,
    #[serde(default)]
    pub confidence_algorithm: ConfidenceAlgorithm,
    #[serde(default = "default_true")]
    pub enable_deduplication: bool,
    /// Jaccard similarity at or above which two chunks are the same passage.
    #[serde(default = "default_duplicate_threshold")]
    pub duplicate_threshold: f64,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,
    /// Per-technique weights; techniques not listed weigh 1.0.
    #[serde(default)]
    pub technique_weights: BTreeMap<Technique, f64>,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            fusion_strategy: FusionStrategy::default(),
            confidence_algorithm: ConfidenceAlgorithm::default(),
            enable_deduplication: default_true(),
            duplicate_threshold: default_duplicate_threshold(),
            max_results: default_max_results(),
            min_confidence: default_min_confidence(),
            technique_weights: BTreeMap::new(),
        }
    }
}

impl AggregationConfig {
    /// Weight for `technique`, `1.0` when not configured.
    #[must_use]
    pub fn weight_for(&self, technique: &Technique) -> f64 {
        self.technique_weights
            .get(technique)
            .copied()
            .unwrap_or(DEFAULT_TECHNIQUE_WEIGHT)
    }

    /// Reject out-of-range values before any scoring happens.
    ///
    /// # Errors
    ///
    /// Returns [`AggregateError::InvalidConfig`] naming the first bad field.
    pub fn validate(&self) -> std::result::Result<(), AggregateError> {
        if !(0.0..=1.0).contains(&self.duplicate_threshold) {
            return Err(AggregateError::InvalidConfig(format!(
                "duplicate_threshold must be within [0, 1], got {}",
                self.duplicate_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(AggregateError::InvalidConfig(format!(
                "min_confidence must be within [0, 1], got {}",
                self.min_confidence
            )));
        }
        if self.max_results == 0 {
            return Err(AggregateError::InvalidConfig(
                "max_results must be greater than 0".to_string(),
            ));
        }
        if let Some((technique, weight)) = self
            .technique_weights
            .iter()
            .find(|(_, w)| !w.is_finite() || **w < 0.0)
        {
            return Err(AggregateError::InvalidConfig(format!(
                "weight for technique '{technique}' must be a non-negative number, got {weight}"
            )));
        }
        Ok(())
    }
}

/// Defaults for two-list hybrid scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HybridConfig {
    #[serde(default)]
    pub method: HybridMethod,
    #[serde(default = "default_half")]
    pub semantic_weight: f64,
    #[serde(default = "default_half")]
    pub lexical_weight: f64,
    /// Per-column normalization applied before scoring; `"none"` keeps raw
    /// scores.
    #[serde(default = "default_normalization", with = "normalization_setting")]
    pub normalization: Option<NormalizationMethod>,
}

impl Default for HybridConfig {
    fn default() -> Self {
        Self {
            method: HybridMethod::default(),
            semantic_weight: default_half(),
            lexical_weight: default_half(),
            normalization: default_normalization(),
        }
    }
}

mod normalization_setting {
    use super::{Deserialize, Deserializer, NormalizationMethod, Serializer};

    // serde's `with` contract fixes the `&Option<T>` parameter.
    #[allow(clippy::ref_option, clippy::trivially_copy_pass_by_ref)]
    pub fn serialize<S: Serializer>(
        setting: &Option<NormalizationMethod>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(NormalizationMethod::setting_str(*setting))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<NormalizationMethod>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NormalizationMethod::parse_setting(&raw).map_err(serde::de::Error::custom)
    }
}

/// Contents of a ragfuse config file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub aggregation: AggregationConfig,
    #[serde(default)]
    pub hybrid: HybridConfig,
}

pub const DEFAULT_TECHNIQUE_WEIGHT: f64 = 1.0;

const fn default_true() -> bool {
    true
}

const fn default_duplicate_threshold() -> f64 {
    0.85
}

const fn default_max_results() -> usize {
    20
}

const fn default_min_confidence() -> f64 {
    0.1
}

const fn default_half() -> f64 {
    0.5
}

const fn default_normalization() -> Option<NormalizationMethod> {
    Some(NormalizationMethod::MinMax)
}

/// Parse a config document from TOML text.
///
/// # Errors
///
/// Returns an error if the text is not valid TOML for [`ProjectConfig`].
pub fn parse_config(content: &str) -> Result<ProjectConfig> {
    toml::from_str::<ProjectConfig>(content).context("Failed to parse ragfuse config")
}

fn load_config_file(path: &Path) -> Result<Option<ProjectConfig>> {
    if !path.exists() {
        return Ok(None);
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<ProjectConfig>(&content)
        .map(Some)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Load `.ragfuse/config.toml` under `project_root`, or defaults when absent.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_project_config(project_root: &Path) -> Result<ProjectConfig> {
    Ok(load_config_file(&project_root.join(".ragfuse/config.toml"))?.unwrap_or_default())
}

/// Load `<config_dir>/ragfuse/config.toml`, or defaults when absent.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_user_config() -> Result<ProjectConfig> {
    let Some(config_dir) = dirs::config_dir() else {
        return Ok(ProjectConfig::default());
    };
    Ok(load_config_file(&config_dir.join("ragfuse/config.toml"))?.unwrap_or_default())
}

/// Effective file configuration for `project_root`.
///
/// A project config file, when present, replaces the user config file
/// entirely; otherwise the user file applies; otherwise built-in defaults.
/// The aggregation section is validated before it is returned.
///
/// # Errors
///
/// Returns an error if a config file is unreadable, unparseable, or holds
/// out-of-range aggregation values.
pub fn resolve_config(project_root: &Path) -> Result<ProjectConfig> {
    let project_path = project_root.join(".ragfuse/config.toml");
    let config = match load_config_file(&project_path)? {
        Some(config) => {
            tracing::debug!(path = %project_path.display(), "using project config");
            config
        }
        None => load_user_config()?,
    };
    config
        .aggregation
        .validate()
        .context("Invalid [aggregation] section")?;
    Ok(config)
}
