//! Source adapters over external scholarly data providers.
//!
//! Every provider is wrapped in one adapter implementing the [`Source`]
//! trait. The forty-odd providers the engine talks to collapse into
//! five transport families, each represented here by a reusable
//! template plus a table of per-source descriptors:
//!
//! - REST with query parameters or API-key auth ([`rest`]), covering
//!   CrossRef, OpenAlex, Europe PMC, BASE, CORE, Springer, IEEE,
//!   Scopus, and Web of Science through descriptors;
//! - Atom feeds ([`arxiv`]);
//! - NCBI E-utilities ([`pubmed`]);
//! - HTML scraping ([`scholar`]);
//! - DSL-over-POST ([`dsl`]), covering Dimensions and Lens.
//!
//! A composite [`publisher::PublisherAdapter`] routes per-publisher
//! searches through the DOI registry's server-side filter, which is how
//! dozens of publishers are supported without bespoke clients.

mod arxiv;
mod base;
mod core;
mod crossref;
mod dsl;
mod europe_pmc;
mod ieee;
mod openalex;
mod publisher;
mod pubmed;
mod registry;
mod rest;
mod scholar;
mod scopus;
mod semantic;
mod springer;
mod wos;

pub use publisher::PublisherAdapter;
pub use registry::{SourceCapabilities, SourceRegistry};
pub use rest::{AuthStyle, RestDescriptor, RestSource};

use crate::models::{PaperRecord, SearchRequest};
use crate::utils::text::{normalize_arxiv_id, normalize_doi};
use async_trait::async_trait;

/// Transport/role family of a source, used by the orchestrator to pick
/// the fan-out set for each phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceFamily {
    /// High-coverage academic indexes queried first.
    PriorityAcademic,
    /// Google-Scholar-class broad web search.
    ScholarSearch,
    /// Citation graphs queried for impact metadata.
    CitationDatabase,
    /// Preprint servers.
    Preprint,
    /// Alternative and aggregator indexes queried late.
    Aggregator,
}

/// Interface implemented by every source adapter.
///
/// Adapters must tag every returned record with their own id, drop
/// records carrying no usable identifier, and translate every internal
/// failure into a [`SourceError`] — the orchestrator converts those to
/// empty results and keeps going.
#[async_trait]
pub trait Source: Send + Sync + std::fmt::Debug {
    /// Stable identifier, e.g. "crossref".
    fn id(&self) -> &str;

    /// Human-readable name.
    fn name(&self) -> &str;

    fn family(&self) -> SourceFamily;

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::SEARCH
    }

    /// Whether the adapter's required credentials are present. An
    /// unavailable adapter is omitted from the registry at startup.
    fn available(&self) -> bool {
        true
    }

    /// Search the provider. Respects the adapter's rate limit.
    async fn search(&self, request: &SearchRequest) -> Result<Vec<PaperRecord>, SourceError>;

    /// Search filtered server-side by publisher name. Adapters without
    /// a server-side filter fall back to a plain search.
    async fn search_by_publisher(
        &self,
        request: &SearchRequest,
        _publisher: &str,
    ) -> Result<Vec<PaperRecord>, SourceError> {
        self.search(request).await
    }

    /// Papers citing the given work (DOI or provider id).
    async fn get_citations(&self, _id: &str) -> Result<Vec<PaperRecord>, SourceError> {
        Err(SourceError::NotImplemented)
    }

    /// Papers referenced by the given work.
    async fn get_references(&self, _id: &str) -> Result<Vec<PaperRecord>, SourceError> {
        Err(SourceError::NotImplemented)
    }
}

/// Errors raised inside adapters.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("operation not implemented for this source")]
    NotImplemented,

    #[error("network error: {0}")]
    Network(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("rate limit exceeded")]
    RateLimit,

    #[error("missing credential: {0}")]
    MissingCredential(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("{0}")]
    Other(String),
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        SourceError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(err: serde_json::Error) -> Self {
        SourceError::Parse(format!("JSON: {err}"))
    }
}

impl From<quick_xml::DeError> for SourceError {
    fn from(err: quick_xml::DeError) -> Self {
        SourceError::Parse(format!("XML: {err}"))
    }
}

/// Enforce the adapter-boundary contract on a batch of records:
/// identifiers normalized, unidentifiable records dropped, provenance
/// stamped with the adapter's id, result capped at `max`.
pub(crate) fn finalize_records(
    mut records: Vec<PaperRecord>,
    source_id: &str,
    max: usize,
) -> Vec<PaperRecord> {
    records.truncate(max);
    records.retain(PaperRecord::is_identifiable);
    for record in &mut records {
        if let Some(doi) = record.doi.take() {
            let doi = normalize_doi(&doi);
            record.doi = (!doi.is_empty()).then_some(doi);
        }
        if let Some(arxiv) = record.arxiv_id.take() {
            let arxiv = normalize_arxiv_id(&arxiv);
            record.arxiv_id = (!arxiv.is_empty()).then_some(arxiv);
        }
        record.primary_source = source_id.to_string();
        record.sources_found_in = vec![source_id.to_string()];
    }
    records
}
