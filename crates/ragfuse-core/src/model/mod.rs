//! Retrieval data model shared by every pipeline stage.

pub mod chunk;
mod lenient;
pub mod request;
pub mod result;
pub mod technique;

pub use chunk::{AggregatedSourceChunk, Metadata, NormalizedMetadata, RelevanceTier, SourceChunk};
pub use request::{AggregateRequest, QueryConfig};
pub use result::{AggregatedRAGResult, AggregationInsights, AggregationMetadata};
pub use technique::{ResponseMetadata, ResponseStatus, Technique, TechniqueResponse};
