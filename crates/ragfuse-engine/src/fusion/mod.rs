//! Rank and score fusion.
//!
//! Two layers share the reciprocal rank constant:
//!
//! - [`hybrid`] merges exactly two ranked lists (semantic and lexical) inside a
//!   single hybrid technique, with weights in `[0, 1]` that must sum to 1.0.
//! - [`scoring`] merges the per-technique scores already attached to each
//!   deduplicated chunk into one `aggregated_score`.

pub mod hybrid;
pub mod scoring;

/// Damping constant for reciprocal rank fusion. Fixed, not configurable.
pub const RRF_K: f64 = 60.0;

pub use hybrid::{HybridHit, HybridOptions, HybridWeights, RankedHit, hybrid_fuse, rescore_chunks};
pub use scoring::{MultiFusion, technique_reliability};
