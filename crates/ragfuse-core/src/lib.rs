#![forbid(unsafe_code)]
//! ragfuse-core library.
//!
//! Shared vocabulary for the aggregation engine: the retrieval data model,
//! aggregation configuration, and error codes. Nothing in this crate scores or
//! ranks anything; the algorithms live in `ragfuse-engine`.
//!
//! # Conventions
//!
//! - **Errors**: Typed errors via `thiserror` for library surfaces,
//!   `anyhow::Result` for file loading.
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).

pub mod config;
pub mod error;
pub mod model;

pub use config::{
    AggregationConfig, ConfidenceAlgorithm, ExecutionMode, FusionStrategy, HybridConfig,
    HybridMethod, NormalizationMethod, ProjectConfig,
};
pub use error::{AggregateError, ErrorCode};
pub use model::{
    AggregateRequest, AggregatedRAGResult, AggregatedSourceChunk, AggregationInsights,
    AggregationMetadata, NormalizedMetadata, QueryConfig, RelevanceTier, ResponseMetadata,
    ResponseStatus, SourceChunk, Technique, TechniqueResponse,
};
