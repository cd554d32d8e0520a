//! Query analysis and search request models.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Research field detected from a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ResearchField {
    MedicineBiology,
    Physics,
    Chemistry,
    ComputerScience,
    Engineering,
    SocialScience,
    #[default]
    General,
}

impl ResearchField {
    pub fn id(&self) -> &'static str {
        match self {
            ResearchField::MedicineBiology => "medicine_biology",
            ResearchField::Physics => "physics",
            ResearchField::Chemistry => "chemistry",
            ResearchField::ComputerScience => "computer_science",
            ResearchField::Engineering => "engineering",
            ResearchField::SocialScience => "social_science",
            ResearchField::General => "general",
        }
    }
}

impl std::fmt::Display for ResearchField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

/// Intent class detected from a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum QueryType {
    Review,
    MetaAnalysis,
    Methodology,
    Comparison,
    #[default]
    Exploratory,
}

/// The result of analyzing a raw query string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryAnalysis {
    /// The query as the caller supplied it.
    pub original: String,

    /// Stop-word-filtered keyword list.
    pub keywords: Vec<String>,

    /// Detected research field.
    pub field: ResearchField,

    /// Field-specific related concepts (at most eight).
    pub related_concepts: Vec<String>,

    /// Detected query intent.
    pub query_type: QueryType,
}

/// Read-only context threaded through one search.
///
/// Created by the orchestrator before phase 1 and never mutated after.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchContext {
    pub query: String,
    pub analysis: QueryAnalysis,
    /// Open-ended metadata bag for downstream consumers.
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl ResearchContext {
    pub fn new(query: impl Into<String>, analysis: QueryAnalysis) -> Self {
        Self {
            query: query.into(),
            analysis,
            metadata: HashMap::new(),
        }
    }
}

/// Options recognized by [`crate::engine::ResearchEngine::search`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchOptions {
    /// Cap on records requested from any single adapter.
    pub max_per_source: usize,

    /// Whether to expand the corpus through the citation network.
    pub expand_citations: bool,

    /// Whether preprint servers participate in the fan-out.
    pub include_preprints: bool,

    /// Records scoring below this reliability are dropped from the
    /// final ranking.
    pub min_reliability: f64,

    /// Earliest acceptable publication year.
    pub year_start: Option<i32>,

    /// Latest acceptable publication year.
    pub year_end: Option<i32>,

    /// Restrict the fan-out to this subset of source ids.
    pub sources: Option<Vec<String>>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            max_per_source: 100,
            expand_citations: true,
            include_preprints: true,
            min_reliability: 0.0,
            year_start: None,
            year_end: None,
            sources: None,
        }
    }
}

/// The request shape every adapter receives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    pub max_results: usize,
    pub year_start: Option<i32>,
    pub year_end: Option<i32>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            max_results: 100,
            year_start: None,
            year_end: None,
        }
    }

    pub fn max_results(mut self, max: usize) -> Self {
        self.max_results = max;
        self
    }

    pub fn years(mut self, start: Option<i32>, end: Option<i32>) -> Self {
        self.year_start = start;
        self.year_end = end;
        self
    }
}
