//! Core data structures shared across the pipeline.
//!
//! All model objects are created by the orchestrator during a single
//! search call, flow through the pipeline by value, and are discarded
//! when the response is returned. The only state that outlives a
//! search is configuration and per-adapter rate-limiter tokens.

mod progress;
mod query;
mod record;
mod result;

pub use progress::{null_sink, progress_channel, ProgressEvent, ProgressSink, ProgressStatus};
pub use query::{
    QueryAnalysis, QueryType, ResearchContext, ResearchField, SearchOptions, SearchRequest,
};
pub use record::{
    AccessType, PaperRecord, PaperUrls, RecordBuilder, ReliabilityBand, ReliabilityComponents,
    ReliabilityScore,
};
pub use result::{
    AccessCounts, BandCounts, PaperEnvelope, ReasoningResult, ReasoningStep, ResearchResult,
    ResearchStatistics, ResultEnvelope, StepKind, Timeline,
};
