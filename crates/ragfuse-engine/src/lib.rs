#![forbid(unsafe_code)]
//! ragfuse-engine library.
//!
//! Turns the independent outputs of several retrieval techniques into one
//! ranked, deduplicated, confidence-scored result set:
//!
//! ```text
//! responses -> duplicates -> fusion::scoring -> confidence -> rank -> insights
//! ```
//!
//! [`fusion::hybrid`] handles the two-list (semantic + lexical) case that a
//! hybrid technique runs before its response reaches the aggregator, and
//! [`execute`] schedules technique executors that produce the responses.
//!
//! # Conventions
//!
//! - **Errors**: `AggregateError` for the aggregation surface, `anyhow::Result`
//!   for technique executors.
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).
//! - **Purity**: Nothing here performs I/O or keeps global state; every entry
//!   point is safe to call concurrently for independent queries.

pub mod aggregate;
pub mod confidence;
pub mod duplicates;
pub mod execute;
pub mod fusion;
pub mod insights;
pub mod normalize;
pub mod rank;

pub use aggregate::{AggregationStage, Aggregator, aggregate_request};
pub use execute::{BatchSummary, TechniqueExecutor, execute_techniques};
pub use fusion::{
    HybridHit, HybridOptions, HybridWeights, MultiFusion, RRF_K, RankedHit, hybrid_fuse,
    rescore_chunks,
};
