//! Record model representing one academic work across all sources.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Access status of a paper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AccessType {
    Open,
    Paywalled,
    #[default]
    Unknown,
}

impl AccessType {
    /// Precedence used when merging duplicate records: open beats
    /// paywalled beats unknown.
    fn merge_rank(self) -> u8 {
        match self {
            AccessType::Open => 2,
            AccessType::Paywalled => 1,
            AccessType::Unknown => 0,
        }
    }
}

/// Discrete trust band derived from the continuous reliability score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReliabilityBand {
    High,
    Medium,
    Low,
}

impl ReliabilityBand {
    /// Band thresholds: high >= 0.80, medium >= 0.50, low otherwise.
    pub fn from_score(score: f64) -> Self {
        if score >= 0.80 {
            ReliabilityBand::High
        } else if score >= 0.50 {
            ReliabilityBand::Medium
        } else {
            ReliabilityBand::Low
        }
    }
}

/// Per-component breakdown of a reliability score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct ReliabilityComponents {
    pub peer_review: f64,
    pub journal_reputation: f64,
    pub citation_impact: f64,
    pub cross_source: f64,
    pub recency: f64,
    /// Contradiction penalty already subtracted from the total.
    pub penalty: f64,
}

/// Reliability score with its component breakdown and band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReliabilityScore {
    pub score: f64,
    pub band: ReliabilityBand,
    pub components: ReliabilityComponents,
}

impl ReliabilityScore {
    pub fn new(score: f64, components: ReliabilityComponents) -> Self {
        let score = score.clamp(0.0, 1.0);
        Self {
            score,
            band: ReliabilityBand::from_score(score),
            components,
        }
    }
}

/// One academic work, in the unified shape shared by every source.
///
/// A record is only admitted into the pipeline when it carries at least
/// one stable identifier (DOI, PubMed ID, arXiv ID) or a non-empty
/// title; adapters drop anything weaker at their boundary. The three
/// identifiers are sticky: once set they are never overwritten, not
/// even by the dedup merge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperRecord {
    /// Digital Object Identifier, normalized lowercase, no scheme prefix.
    pub doi: Option<String>,

    /// PubMed identifier (numeric string).
    pub pmid: Option<String>,

    /// arXiv identifier with any version suffix stripped.
    pub arxiv_id: Option<String>,

    /// Paper title.
    pub title: String,

    /// Abstract text (may be empty).
    pub abstract_text: String,

    /// Author names in publication order.
    pub authors: Vec<String>,

    /// Publication year, when known.
    pub year: Option<i32>,

    /// Journal or venue name.
    pub journal: Option<String>,

    /// Publisher name.
    pub publisher: Option<String>,

    /// Keyword set (sorted for stable serialization).
    pub keywords: BTreeSet<String>,

    /// Identifiers of every source the record has been observed in,
    /// in discovery order, without duplicates. Monotonically growing.
    pub sources_found_in: Vec<String>,

    /// Source that first discovered the record.
    pub primary_source: String,

    /// Citation count, when a source reports one.
    pub citations: Option<u32>,

    /// Access status.
    pub access: AccessType,

    /// Best-known PDF URL.
    pub pdf_url: Option<String>,

    /// Relevance score in [0, 1], assigned by the ranker.
    #[serde(default)]
    pub relevance: f64,

    /// Reliability score, assigned by the reliability scorer.
    pub reliability: Option<ReliabilityScore>,

    /// Whether the work is known to be retracted.
    #[serde(default)]
    pub retracted: bool,
}

impl PaperRecord {
    /// Create a minimal record discovered by `source`.
    pub fn new(title: impl Into<String>, source: impl Into<String>) -> Self {
        let source = source.into();
        Self {
            doi: None,
            pmid: None,
            arxiv_id: None,
            title: title.into(),
            abstract_text: String::new(),
            authors: Vec::new(),
            year: None,
            journal: None,
            publisher: None,
            keywords: BTreeSet::new(),
            sources_found_in: vec![source.clone()],
            primary_source: source,
            citations: None,
            access: AccessType::Unknown,
            pdf_url: None,
            relevance: 0.0,
            reliability: None,
            retracted: false,
        }
    }

    /// A record must carry at least one identifier or a non-empty title
    /// to be worth keeping.
    pub fn is_identifiable(&self) -> bool {
        self.doi.as_deref().is_some_and(|d| !d.is_empty())
            || self.pmid.as_deref().is_some_and(|p| !p.is_empty())
            || self.arxiv_id.as_deref().is_some_and(|a| !a.is_empty())
            || !self.title.trim().is_empty()
    }

    /// Record that `source` has also observed this work. Keeps
    /// discovery order and set semantics.
    pub fn add_source(&mut self, source: &str) {
        if !self.sources_found_in.iter().any(|s| s == source) {
            self.sources_found_in.push(source.to_string());
        }
    }

    /// Normalized surname of the first author, used by the title-layer
    /// duplicate check. Handles both "Jane Smith" and "Smith, Jane".
    pub fn first_author_surname(&self) -> Option<String> {
        let first = self.authors.first()?;
        let surname = match first.split_once(',') {
            Some((last, _)) => last,
            None => first.split_whitespace().last()?,
        };
        let surname = surname.trim().to_lowercase();
        if surname.is_empty() {
            None
        } else {
            Some(surname)
        }
    }

    /// Fold `other` into `self` following the duplicate-merge rules:
    /// identifiers are sticky, the longer abstract and author list win,
    /// the larger citation count wins, access follows open > paywalled
    /// > unknown, keyword and source sets union, and the primary source
    /// of `self` (first seen) is retained.
    pub fn merge_from(&mut self, other: PaperRecord) {
        if self.title.trim().is_empty() {
            self.title = other.title;
        }
        if other.abstract_text.len() > self.abstract_text.len() {
            self.abstract_text = other.abstract_text;
        }
        if self.doi.is_none() {
            self.doi = other.doi;
        }
        if self.pmid.is_none() {
            self.pmid = other.pmid;
        }
        if self.arxiv_id.is_none() {
            self.arxiv_id = other.arxiv_id;
        }
        if self.year.is_none() {
            self.year = other.year;
        }
        if self.journal.is_none() {
            self.journal = other.journal;
        }
        if self.publisher.is_none() {
            self.publisher = other.publisher;
        }
        if other.authors.len() > self.authors.len() {
            self.authors = other.authors;
        }
        self.citations = match (self.citations, other.citations) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        if self.pdf_url.is_none() {
            self.pdf_url = other.pdf_url;
        }
        if other.access.merge_rank() > self.access.merge_rank() {
            self.access = other.access;
        }
        self.keywords.extend(other.keywords);
        for source in &other.sources_found_in {
            self.add_source(source);
        }
        self.retracted |= other.retracted;
    }

    /// Construct the identifier-derived URL set for serialization.
    pub fn urls(&self, include_scihub: bool) -> PaperUrls {
        PaperUrls {
            doi: self.doi.as_ref().map(|d| format!("https://doi.org/{d}")),
            pdf: self.pdf_url.clone(),
            pubmed: self
                .pmid
                .as_ref()
                .map(|p| format!("https://pubmed.ncbi.nlm.nih.gov/{p}/")),
            arxiv: self
                .arxiv_id
                .as_ref()
                .map(|a| format!("https://arxiv.org/abs/{a}")),
            scihub: if include_scihub {
                self.doi.as_ref().map(|d| format!("https://sci-hub.se/{d}"))
            } else {
                None
            },
        }
    }
}

/// Identifier-derived URLs exposed on the serialized paper.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PaperUrls {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pdf: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pubmed: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arxiv: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scihub: Option<String>,
}

/// Builder for [`PaperRecord`], used by adapters and tests.
#[derive(Debug, Clone)]
pub struct RecordBuilder {
    record: PaperRecord,
}

impl RecordBuilder {
    pub fn new(title: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            record: PaperRecord::new(title, source),
        }
    }

    pub fn doi(mut self, doi: impl Into<String>) -> Self {
        self.record.doi = Some(doi.into());
        self
    }

    pub fn pmid(mut self, pmid: impl Into<String>) -> Self {
        self.record.pmid = Some(pmid.into());
        self
    }

    pub fn arxiv_id(mut self, id: impl Into<String>) -> Self {
        self.record.arxiv_id = Some(id.into());
        self
    }

    pub fn abstract_text(mut self, text: impl Into<String>) -> Self {
        self.record.abstract_text = text.into();
        self
    }

    pub fn authors<I, S>(mut self, authors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.record.authors = authors.into_iter().map(Into::into).collect();
        self
    }

    pub fn year(mut self, year: i32) -> Self {
        self.record.year = Some(year);
        self
    }

    pub fn journal(mut self, journal: impl Into<String>) -> Self {
        self.record.journal = Some(journal.into());
        self
    }

    pub fn publisher(mut self, publisher: impl Into<String>) -> Self {
        self.record.publisher = Some(publisher.into());
        self
    }

    pub fn keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.record.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    pub fn citations(mut self, count: u32) -> Self {
        self.record.citations = Some(count);
        self
    }

    pub fn access(mut self, access: AccessType) -> Self {
        self.record.access = access;
        self
    }

    pub fn pdf_url(mut self, url: impl Into<String>) -> Self {
        self.record.pdf_url = Some(url.into());
        self
    }

    pub fn retracted(mut self, retracted: bool) -> Self {
        self.record.retracted = retracted;
        self
    }

    pub fn build(self) -> PaperRecord {
        self.record
    }
}
