//! Registry of constructed source adapters.
//!
//! Built once at startup from [`Settings`]; immutable afterwards.
//! Key-gated adapters whose credential is absent are omitted here and
//! logged once, so the orchestrator only ever sees usable sources.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::Settings;
use crate::sources::arxiv::ArxivSource;
use crate::sources::dsl::{DimensionsSource, LensSource};
use crate::sources::pubmed::PubMedSource;
use crate::sources::scholar::GoogleScholarSource;
use crate::sources::semantic::SemanticScholarSource;
use crate::sources::{
    base, core, crossref, europe_pmc, ieee, openalex, scopus, springer, wos, PublisherAdapter,
    RestSource, Source, SourceError, SourceFamily,
};

bitflags::bitflags! {
    /// Optional capabilities a source can expose beyond plain search.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SourceCapabilities: u32 {
        const SEARCH = 1 << 0;
        const PUBLISHER_FILTER = 1 << 1;
        const CITATIONS = 1 << 2;
        const REFERENCES = 1 << 3;
    }
}

#[derive(Debug, Clone)]
pub struct SourceRegistry {
    sources: Vec<Arc<dyn Source>>,
    index: HashMap<String, usize>,
    publisher: Option<PublisherAdapter>,
}

impl SourceRegistry {
    /// Construct every adapter the configuration allows.
    pub fn from_settings(settings: &Settings) -> Self {
        let mut registry = Self {
            sources: Vec::new(),
            index: HashMap::new(),
            publisher: None,
        };
        let email = settings.contact_email.as_deref();

        registry.try_register(
            PubMedSource::new(
                settings.ncbi_api_key.clone(),
                settings.contact_email.clone(),
            )
            .map(|s| Arc::new(s) as Arc<dyn Source>),
        );
        registry.try_register(
            ArxivSource::new().map(|s| Arc::new(s) as Arc<dyn Source>),
        );
        registry.try_register(
            RestSource::new(crossref::descriptor(), None, email)
                .map(|s| Arc::new(s) as Arc<dyn Source>),
        );
        registry.try_register(
            RestSource::new(openalex::descriptor(), None, email)
                .map(|s| Arc::new(s) as Arc<dyn Source>),
        );
        registry.try_register(
            RestSource::new(europe_pmc::descriptor(), None, email)
                .map(|s| Arc::new(s) as Arc<dyn Source>),
        );
        registry.try_register(
            RestSource::new(base::descriptor(), None, email)
                .map(|s| Arc::new(s) as Arc<dyn Source>),
        );
        registry.try_register(
            SemanticScholarSource::new(settings.semantic_scholar_api_key.clone())
                .map(|s| Arc::new(s) as Arc<dyn Source>),
        );
        registry.try_register(
            RestSource::new(core::descriptor(), settings.core_api_key.clone(), email)
                .map(|s| Arc::new(s) as Arc<dyn Source>),
        );
        registry.try_register(
            RestSource::new(springer::descriptor(), settings.springer_api_key.clone(), email)
                .map(|s| Arc::new(s) as Arc<dyn Source>),
        );
        registry.try_register(
            RestSource::new(ieee::descriptor(), settings.ieee_api_key.clone(), email)
                .map(|s| Arc::new(s) as Arc<dyn Source>),
        );
        registry.try_register(
            RestSource::new(
                scopus::descriptor(),
                settings
                    .scopus_api_key
                    .clone()
                    .or_else(|| settings.elsevier_api_key.clone()),
                email,
            )
            .map(|s| Arc::new(s) as Arc<dyn Source>),
        );
        registry.try_register(
            RestSource::new(wos::descriptor(), settings.wos_api_key.clone(), email)
                .map(|s| Arc::new(s) as Arc<dyn Source>),
        );
        registry.try_register(
            DimensionsSource::new(settings.dimensions_api_key.clone())
                .map(|s| Arc::new(s) as Arc<dyn Source>),
        );
        registry.try_register(
            LensSource::new(settings.lens_api_key.clone())
                .map(|s| Arc::new(s) as Arc<dyn Source>),
        );
        registry.try_register(
            GoogleScholarSource::new(
                settings.serpapi_key.clone(),
                settings.google_scholar_enabled,
            )
            .map(|s| Arc::new(s) as Arc<dyn Source>),
        );

        registry.publisher = registry.get("crossref").cloned().map(PublisherAdapter::new);
        registry
    }

    /// An empty registry tests populate with [`SourceRegistry::register`].
    pub fn empty() -> Self {
        Self {
            sources: Vec::new(),
            index: HashMap::new(),
            publisher: None,
        }
    }

    fn try_register(&mut self, source: Result<Arc<dyn Source>, SourceError>) {
        match source {
            Ok(source) if source.available() => self.register(source),
            Ok(source) => {
                tracing::info!(source = source.id(), "credential missing, adapter omitted");
            }
            Err(error) => {
                tracing::warn!(%error, "adapter construction failed, omitted");
            }
        }
    }

    /// Register a source, keeping insertion order. A later source with
    /// the same id replaces the earlier one.
    pub fn register(&mut self, source: Arc<dyn Source>) {
        match self.index.get(source.id()) {
            Some(&i) => self.sources[i] = source,
            None => {
                self.index.insert(source.id().to_string(), self.sources.len());
                self.sources.push(source);
            }
        }
    }

    /// Override or install the publisher delegate (tests).
    pub fn set_publisher_adapter(&mut self, adapter: PublisherAdapter) {
        self.publisher = Some(adapter);
    }

    pub fn get(&self, id: &str) -> Option<&Arc<dyn Source>> {
        self.index.get(id).map(|&i| &self.sources[i])
    }

    /// All sources in registration order.
    pub fn all(&self) -> impl Iterator<Item = &Arc<dyn Source>> {
        self.sources.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.sources.iter().map(|s| s.id())
    }

    pub fn in_family(&self, family: SourceFamily) -> Vec<Arc<dyn Source>> {
        self.sources
            .iter()
            .filter(|s| s.family() == family)
            .cloned()
            .collect()
    }

    pub fn with_capability(&self, capability: SourceCapabilities) -> Vec<Arc<dyn Source>> {
        self.sources
            .iter()
            .filter(|s| s.capabilities().contains(capability))
            .cloned()
            .collect()
    }

    /// Sources that can walk the citation graph.
    pub fn citation_fetchers(&self) -> Vec<Arc<dyn Source>> {
        self.with_capability(SourceCapabilities::CITATIONS)
    }

    /// The composite publisher adapter, present when the DOI registry
    /// adapter is.
    pub fn publisher_adapter(&self) -> Option<&PublisherAdapter> {
        self.publisher.as_ref()
    }

    /// The adapter used for late re-queries of query variations: the
    /// broadest open index available.
    pub fn broad_adapter(&self) -> Option<&Arc<dyn Source>> {
        self.get("openalex").or_else(|| self.get("crossref"))
    }

    pub fn has(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bare_settings() -> Settings {
        Settings::default()
    }

    #[test]
    fn test_keyless_registry_has_open_sources_only() {
        let registry = SourceRegistry::from_settings(&bare_settings());

        for id in ["pubmed", "arxiv", "crossref", "openalex", "europe_pmc", "base"] {
            assert!(registry.has(id), "expected open source '{id}'");
        }
        // Key-gated adapters are omitted without credentials.
        for id in ["semantic_scholar", "core", "dimensions", "lens", "scopus", "wos", "google_scholar"] {
            assert!(!registry.has(id), "expected '{id}' to be omitted");
        }
    }

    #[test]
    fn test_keys_enable_adapters() {
        let settings = Settings {
            semantic_scholar_api_key: Some("k".into()),
            dimensions_api_key: Some("k".into()),
            serpapi_key: Some("k".into()),
            ..Settings::default()
        };
        let registry = SourceRegistry::from_settings(&settings);

        assert!(registry.has("semantic_scholar"));
        assert!(registry.has("dimensions"));
        assert!(registry.has("google_scholar"));
        assert!(!registry.has("core"));
    }

    #[test]
    fn test_families_and_views() {
        let settings = Settings {
            semantic_scholar_api_key: Some("k".into()),
            ..Settings::default()
        };
        let registry = SourceRegistry::from_settings(&settings);

        let priority = registry.in_family(SourceFamily::PriorityAcademic);
        assert!(priority.iter().any(|s| s.id() == "pubmed"));
        assert!(priority.iter().any(|s| s.id() == "crossref"));

        let preprints = registry.in_family(SourceFamily::Preprint);
        assert_eq!(preprints.len(), 1);
        assert_eq!(preprints[0].id(), "arxiv");

        assert!(!registry.citation_fetchers().is_empty());
        assert!(registry.publisher_adapter().is_some());
        assert_eq!(registry.broad_adapter().unwrap().id(), "openalex");
    }

    #[test]
    fn test_register_replaces_same_id() {
        let settings = bare_settings();
        let mut registry = SourceRegistry::from_settings(&settings);
        let before = registry.len();

        let replacement = registry.get("arxiv").unwrap().clone();
        registry.register(replacement);
        assert_eq!(registry.len(), before);
    }
}
