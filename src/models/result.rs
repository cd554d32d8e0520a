//! Reasoning output, statistics, and the final research result.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{AccessType, PaperRecord, PaperUrls, ReliabilityBand};

/// The eight analytical passes, in contract order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    Categorization,
    ThemeIdentification,
    ConflictDetection,
    CrossValidation,
    GapIdentification,
    ChronologicalAnalysis,
    CitationPatternAnalysis,
    Synthesis,
}

/// One pass of the multi-turn reasoner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningStep {
    /// 1-based step number; matches definition order.
    pub step: u8,
    pub kind: StepKind,
    pub description: String,
    /// Free-form result payload.
    pub result: serde_json::Value,
    /// Confidence in [0, 1].
    pub confidence: f64,
    pub rationale: String,
}

/// Aggregate output of the reasoner.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ReasoningResult {
    pub steps: Vec<ReasoningStep>,
    pub overall_confidence: f64,
    pub key_insights: Vec<String>,
    /// Titles of recommended papers, most relevant first.
    pub recommended: Vec<String>,
}

/// Counters accumulated while a search runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchStatistics {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,

    /// Records gathered before deduplication.
    pub raw_records: usize,

    /// Records surviving deduplication.
    pub unique_records: usize,

    pub duplicates_removed: usize,

    /// Ids of every source actually queried.
    pub sources_searched: Vec<String>,

    /// Record count contributed by each completed phase, in phase order.
    pub phase_counts: Vec<(String, usize)>,

    /// True when the global deadline cut the search short.
    pub truncated: bool,
}

impl ResearchStatistics {
    pub fn begin() -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            raw_records: 0,
            unique_records: 0,
            duplicates_removed: 0,
            sources_searched: Vec::new(),
            phase_counts: Vec::new(),
            truncated: false,
        }
    }

    pub fn search_time_seconds(&self) -> f64 {
        let end = self.finished_at.unwrap_or_else(Utc::now);
        (end - self.started_at).num_milliseconds() as f64 / 1000.0
    }
}

/// Everything a search returns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchResult {
    pub query: String,
    /// Ranked records, most relevant first.
    pub records: Vec<PaperRecord>,
    pub reasoning: ReasoningResult,
    pub statistics: ResearchStatistics,
}

impl ResearchResult {
    /// Build the logical JSON envelope served to clients.
    pub fn envelope(&self, include_scihub: bool) -> ResultEnvelope {
        let mut reliability = BandCounts::default();
        let mut access = AccessCounts::default();
        let mut earliest: Option<i32> = None;
        let mut latest: Option<i32> = None;

        for record in &self.records {
            if let Some(score) = &record.reliability {
                match score.band {
                    ReliabilityBand::High => reliability.high += 1,
                    ReliabilityBand::Medium => reliability.medium += 1,
                    ReliabilityBand::Low => reliability.low += 1,
                }
            }
            match record.access {
                AccessType::Open => access.open += 1,
                AccessType::Paywalled => access.paywalled += 1,
                AccessType::Unknown => {}
            }
            if let Some(year) = record.year {
                earliest = Some(earliest.map_or(year, |e: i32| e.min(year)));
                latest = Some(latest.map_or(year, |l: i32| l.max(year)));
            }
        }

        ResultEnvelope {
            query: self.query.clone(),
            papers: self
                .records
                .iter()
                .map(|r| PaperEnvelope::from_record(r, include_scihub))
                .collect(),
            total_found: self.records.len(),
            sources_searched: self.statistics.sources_searched.clone(),
            duplicates_removed: self.statistics.duplicates_removed,
            search_time_seconds: self.statistics.search_time_seconds(),
            reliability,
            access,
            timeline: Timeline { earliest, latest },
        }
    }
}

/// Reliability band tallies over the result set.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct BandCounts {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

/// Access tallies over the result set.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct AccessCounts {
    pub open: usize,
    pub paywalled: usize,
}

/// Publication-year span of the result set.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Timeline {
    pub earliest: Option<i32>,
    pub latest: Option<i32>,
}

/// Serialized form of one paper, record fields plus derived URLs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaperEnvelope {
    #[serde(flatten)]
    pub record: PaperRecord,
    pub urls: PaperUrls,
}

impl PaperEnvelope {
    fn from_record(record: &PaperRecord, include_scihub: bool) -> Self {
        Self {
            record: record.clone(),
            urls: record.urls(include_scihub),
        }
    }
}

/// Logical HTTP envelope of a completed search.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultEnvelope {
    pub query: String,
    pub papers: Vec<PaperEnvelope>,
    pub total_found: usize,
    pub sources_searched: Vec<String>,
    pub duplicates_removed: usize,
    pub search_time_seconds: f64,
    pub reliability: BandCounts,
    pub access: AccessCounts,
    pub timeline: Timeline,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RecordBuilder, ReliabilityComponents, ReliabilityScore};

    fn scored(title: &str, year: i32, score: f64, access: AccessType) -> PaperRecord {
        let mut record = RecordBuilder::new(title, "test").year(year).access(access).build();
        record.reliability = Some(ReliabilityScore::new(score, ReliabilityComponents::default()));
        record
    }

    #[test]
    fn test_envelope_tallies() {
        let result = ResearchResult {
            query: "q".into(),
            records: vec![
                scored("a", 2019, 0.9, AccessType::Open),
                scored("b", 2023, 0.6, AccessType::Paywalled),
                scored("c", 2021, 0.2, AccessType::Unknown),
            ],
            reasoning: ReasoningResult::default(),
            statistics: ResearchStatistics::begin(),
        };

        let envelope = result.envelope(false);
        assert_eq!(envelope.total_found, 3);
        assert_eq!(
            envelope.reliability,
            BandCounts {
                high: 1,
                medium: 1,
                low: 1
            }
        );
        assert_eq!(envelope.access, AccessCounts { open: 1, paywalled: 1 });
        assert_eq!(
            envelope.timeline,
            Timeline {
                earliest: Some(2019),
                latest: Some(2023)
            }
        );
    }

    #[test]
    fn test_envelope_empty_timeline() {
        let result = ResearchResult {
            query: "q".into(),
            records: vec![],
            reasoning: ReasoningResult::default(),
            statistics: ResearchStatistics::begin(),
        };
        let envelope = result.envelope(false);
        assert_eq!(envelope.timeline, Timeline::default());
    }

    #[test]
    fn test_statistics_timing() {
        let mut stats = ResearchStatistics::begin();
        assert!(stats.search_time_seconds() >= 0.0);
        stats.finished_at = Some(stats.started_at + chrono::Duration::seconds(3));
        assert_eq!(stats.search_time_seconds(), 3.0);
    }
}
