//! # litscout
//!
//! A federated academic-literature discovery engine: one query fans
//! out across many scholarly data providers, and the returned records
//! are merged, deduplicated, scored for relevance and reliability,
//! expanded through the citation graph, enriched with open-access
//! URLs, and analyzed into a structured reasoning summary.
//!
//! ## Architecture
//!
//! - [`models`]: records, query analysis, progress events, results
//! - [`sources`]: adapter trait, the five transport-family templates,
//!   and the registry built from configuration
//! - [`expand`]: pure query analysis and variation generation
//! - [`engine`]: the thirteen-phase orchestrator
//! - [`rank`]: relevance ranking and reliability scoring
//! - [`reason`]: the eight-pass analytical reasoner
//! - [`citations`]: citation-network expansion
//! - [`fulltext`]: open-access URL resolution
//! - [`utils`]: deduplication, rate-limited HTTP, retry, text helpers
//! - [`config`]: startup settings from environment and file

pub mod citations;
pub mod config;
pub mod engine;
pub mod expand;
pub mod fulltext;
pub mod models;
pub mod rank;
pub mod reason;
pub mod sources;
pub mod utils;

// Re-export the common entry points.
pub use config::Settings;
pub use engine::{EngineError, ResearchEngine};
pub use models::{PaperRecord, ProgressEvent, ResearchResult, SearchOptions};
pub use sources::{Source, SourceRegistry};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
