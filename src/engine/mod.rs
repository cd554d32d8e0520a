//! The research orchestrator.
//!
//! Drives thirteen phases in strict order: query analysis, six
//! fan-out rounds across the adapter families, citation-network
//! expansion, a variation re-query, then deduplication, ranking,
//! full-text enrichment, and the reasoner. Fan-outs share a bounded
//! worker pool; an adapter failure or timeout costs only that
//! adapter's records. The search call is total: barring an empty
//! query it always returns a `ResearchResult`, partial if the global
//! deadline fires.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::time::Instant;

use crate::citations::{CitationNetworkBuilder, NETWORK_SOURCE};
use crate::config::Settings;
use crate::expand;
use crate::fulltext::FullTextResolver;
use crate::models::{
    null_sink, AccessType, PaperRecord, ProgressEvent, ProgressSink, ResearchContext,
    ResearchResult, ResearchStatistics, SearchOptions, SearchRequest,
};
use crate::rank::{relevance, reliability};
use crate::reason;
use crate::sources::{Source, SourceError, SourceFamily, SourceRegistry};
use crate::utils::dedup_records;

/// Per-adapter transport timeout within a phase.
const ADAPTER_TIMEOUT_SECS: u64 = 30;
/// Variations re-queried against the broad adapter in phase nine.
const VARIATION_REQUERIES: usize = 3;
/// Cap on records pushed through full-text resolution.
const FULLTEXT_LIMIT: usize = 100;

/// Errors surfaced across the programmatic boundary. Everything else
/// degrades to a partial result.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("query must not be empty")]
    EmptyQuery,

    #[error("engine initialization failed: {0}")]
    Init(String),
}

pub struct ResearchEngine {
    settings: Settings,
    registry: SourceRegistry,
    resolver: FullTextResolver,
}

/// Mutable state shared by the workers of one search.
struct SearchState {
    sink: ProgressSink,
    deadline: Instant,
    pool: Semaphore,
    records: Mutex<Vec<PaperRecord>>,
    raw_count: AtomicUsize,
    sources_searched: Mutex<Vec<String>>,
    truncated: AtomicBool,
}

impl SearchState {
    fn emit(&self, event: ProgressEvent) {
        (self.sink)(event);
    }

    fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Check the global deadline, latching the truncation flag.
    fn deadline_expired(&self) -> bool {
        if self.truncated.load(Ordering::SeqCst) {
            return true;
        }
        if self.remaining().is_zero() {
            self.truncated.store(true, Ordering::SeqCst);
            return true;
        }
        false
    }

    fn mark_searched(&self, source: &str) {
        let mut searched = self.sources_searched.lock().expect("sources lock");
        if !searched.iter().any(|s| s == source) {
            searched.push(source.to_string());
        }
    }

    fn absorb(&self, records: Vec<PaperRecord>) -> usize {
        let count = records.len();
        self.raw_count.fetch_add(count, Ordering::SeqCst);
        self.records.lock().expect("records lock").extend(records);
        count
    }
}

/// One unit of fan-out work: a labelled adapter call.
struct FanOutUnit {
    label: String,
    future: Pin<Box<dyn Future<Output = Result<Vec<PaperRecord>, SourceError>> + Send>>,
}

impl ResearchEngine {
    pub fn new(settings: Settings) -> Result<Self, EngineError> {
        let registry = SourceRegistry::from_settings(&settings);
        Self::with_registry(settings, registry)
    }

    /// Build on an externally assembled registry (tests, embedders).
    pub fn with_registry(
        settings: Settings,
        registry: SourceRegistry,
    ) -> Result<Self, EngineError> {
        let resolver =
            FullTextResolver::new(&settings).map_err(|e| EngineError::Init(e.to_string()))?;
        Ok(Self {
            settings,
            registry,
            resolver,
        })
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    /// Run one federated search. Always returns a result for a
    /// non-empty query; partial results carry `truncated` statistics.
    pub async fn search(
        &self,
        query: &str,
        options: SearchOptions,
        progress: Option<ProgressSink>,
    ) -> Result<ResearchResult, EngineError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(EngineError::EmptyQuery);
        }

        let mut statistics = ResearchStatistics::begin();
        let state = SearchState {
            sink: progress.unwrap_or_else(null_sink),
            deadline: Instant::now() + Duration::from_secs(self.settings.search_timeout_secs),
            pool: Semaphore::new(self.settings.workers),
            records: Mutex::new(Vec::new()),
            raw_count: AtomicUsize::new(0),
            sources_searched: Mutex::new(Vec::new()),
            truncated: AtomicBool::new(false),
        };

        // Phase 1: analyze the query and derive variations.
        state.emit(ProgressEvent::phase_running("analysis", "analyzing query"));
        let analysis = expand::analyze(query);
        let variations = expand::variations(&analysis);
        let context = ResearchContext::new(query, analysis.clone());
        state.emit(ProgressEvent::phase_complete(
            "analysis",
            variations.len(),
            format!("detected field {}", analysis.field),
        ));
        statistics
            .phase_counts
            .push(("analysis".to_string(), variations.len()));

        let request = SearchRequest {
            query: query.to_string(),
            max_results: options
                .max_per_source
                .min(self.settings.max_papers_per_source),
            year_start: options.year_start,
            year_end: options.year_end,
        };

        // Phases 2-9: the network rounds, each skipped once the global
        // deadline has fired.
        self.run_network_phases(&state, &options, &request, &variations, &mut statistics)
            .await;

        // Phase 10: deduplicate the accumulated raw set.
        state.emit(ProgressEvent::phase_running("deduplication", "collapsing duplicates"));
        let raw = std::mem::take(&mut *state.records.lock().expect("records lock"));
        statistics.raw_records = raw.len();
        let mut records = dedup_records(raw);
        if options.year_start.is_some() || options.year_end.is_some() {
            // Some providers ignore year filters server-side.
            records.retain(|r| match r.year {
                Some(year) => {
                    options.year_start.is_none_or(|start| year >= start)
                        && options.year_end.is_none_or(|end| year <= end)
                }
                None => true,
            });
        }
        statistics.unique_records = records.len();
        statistics.duplicates_removed =
            statistics.raw_records.saturating_sub(statistics.unique_records);
        state.emit(ProgressEvent::phase_complete(
            "deduplication",
            records.len(),
            format!("{} duplicates removed", statistics.duplicates_removed),
        ));
        statistics
            .phase_counts
            .push(("deduplication".to_string(), records.len()));

        // Phase 11: relevance ranking and reliability scoring.
        state.emit(ProgressEvent::phase_running("ranking", "scoring records"));
        relevance::rank(&mut records, &analysis);
        reliability::score_all(&mut records);
        if options.min_reliability > 0.0 {
            records.retain(|r| {
                r.reliability
                    .map(|s| s.score >= options.min_reliability)
                    .unwrap_or(false)
            });
        }
        state.emit(ProgressEvent::phase_complete("ranking", records.len(), "ranked"));
        statistics
            .phase_counts
            .push(("ranking".to_string(), records.len()));

        // Phase 12: full-text enrichment, skipped on truncation.
        if !state.deadline_expired() {
            let resolved = self.resolve_fulltext(&state, &mut records).await;
            statistics
                .phase_counts
                .push(("fulltext".to_string(), resolved));
        }

        // Phase 13: the reasoner.
        state.emit(ProgressEvent::phase_running("reasoning", "running analysis passes"));
        let reasoning = reason::run(&records, &context);
        state.emit(ProgressEvent::phase_complete(
            "reasoning",
            reasoning.steps.len(),
            "analysis complete",
        ));
        statistics
            .phase_counts
            .push(("reasoning".to_string(), reasoning.steps.len()));

        statistics.sources_searched = state.sources_searched.lock().expect("sources lock").clone();
        statistics.truncated = state.truncated.load(Ordering::SeqCst);
        statistics.finished_at = Some(chrono::Utc::now());

        Ok(ResearchResult {
            query: query.to_string(),
            records,
            reasoning,
            statistics,
        })
    }

    async fn run_network_phases(
        &self,
        state: &SearchState,
        options: &SearchOptions,
        request: &SearchRequest,
        variations: &[String],
        statistics: &mut ResearchStatistics,
    ) {
        // Phase 2: priority academic indexes.
        if !state.deadline_expired() {
            let units = self.family_units(SourceFamily::PriorityAcademic, options, request);
            let count = self.fan_out(state, "priority_sources", units).await;
            statistics.phase_counts.push(("priority_sources".to_string(), count));
        }

        // Phase 3: Google-Scholar-class search.
        if !state.deadline_expired() {
            let units = self.family_units(SourceFamily::ScholarSearch, options, request);
            let count = self.fan_out(state, "scholar_search", units).await;
            statistics.phase_counts.push(("scholar_search".to_string(), count));
        }

        // Phase 4: citation databases.
        if !state.deadline_expired() {
            let units = self.family_units(SourceFamily::CitationDatabase, options, request);
            let count = self.fan_out(state, "citation_databases", units).await;
            statistics.phase_counts.push(("citation_databases".to_string(), count));
        }

        // Phase 5: publisher-filtered fan-out through the composite
        // adapter.
        if !state.deadline_expired() {
            let count = self.publisher_phase(state, options, request).await;
            statistics.phase_counts.push(("publisher_search".to_string(), count));
        }

        // Phase 6: preprint servers.
        if options.include_preprints && !state.deadline_expired() {
            let units = self.family_units(SourceFamily::Preprint, options, request);
            let count = self.fan_out(state, "preprints", units).await;
            statistics.phase_counts.push(("preprints".to_string(), count));
        }

        // Phase 7: citation-network expansion from top-cited seeds.
        if options.expand_citations && !state.deadline_expired() {
            let count = self.citation_phase(state).await;
            statistics.phase_counts.push(("citation_network".to_string(), count));
        }

        // Phase 8: alternative and aggregator indexes.
        if !state.deadline_expired() {
            let units = self.family_units(SourceFamily::Aggregator, options, request);
            let count = self.fan_out(state, "aggregators", units).await;
            statistics.phase_counts.push(("aggregators".to_string(), count));
        }

        // Phase 9: re-issue top variations against one broad adapter.
        if !state.deadline_expired() {
            let count = self.variation_phase(state, options, request, variations).await;
            statistics.phase_counts.push(("query_variations".to_string(), count));
        }
    }

    fn source_allowed(&self, options: &SearchOptions, id: &str) -> bool {
        options
            .sources
            .as_ref()
            .is_none_or(|allowed| allowed.iter().any(|s| s == id))
    }

    fn family_units(
        &self,
        family: SourceFamily,
        options: &SearchOptions,
        request: &SearchRequest,
    ) -> Vec<FanOutUnit> {
        self.registry
            .in_family(family)
            .into_iter()
            .filter(|source| self.source_allowed(options, source.id()))
            .map(|source| {
                let request = request.clone();
                FanOutUnit {
                    label: source.id().to_string(),
                    future: Box::pin(async move { source.search(&request).await }),
                }
            })
            .collect()
    }

    async fn publisher_phase(
        &self,
        state: &SearchState,
        options: &SearchOptions,
        request: &SearchRequest,
    ) -> usize {
        let Some(adapter) = self.registry.publisher_adapter() else {
            return 0;
        };
        if !self.source_allowed(options, adapter.delegate_id()) {
            return 0;
        }

        let units = crate::sources::PublisherAdapter::publishers()
            .iter()
            .map(|publisher| {
                let adapter = adapter.clone();
                let request = request.clone();
                FanOutUnit {
                    label: format!("publisher:{publisher}"),
                    future: Box::pin(async move { adapter.search(&request, publisher).await }),
                }
            })
            .collect();

        self.fan_out(state, "publisher_search", units).await
    }

    async fn citation_phase(&self, state: &SearchState) -> usize {
        state.emit(ProgressEvent::phase_running(
            "citation_network",
            "expanding citation network",
        ));
        state.emit(ProgressEvent::source_running("citation_network", NETWORK_SOURCE));

        let snapshot = state.records.lock().expect("records lock").clone();
        let builder = CitationNetworkBuilder::new(self.registry.citation_fetchers());

        let count = match tokio::time::timeout(state.remaining(), builder.expand(&snapshot)).await {
            Ok(discovered) => {
                let count = state.absorb(discovered);
                state.emit(ProgressEvent::source_complete(
                    "citation_network",
                    NETWORK_SOURCE,
                    count,
                ));
                count
            }
            Err(_) => {
                state.emit(ProgressEvent::source_error(
                    "citation_network",
                    NETWORK_SOURCE,
                    "citation expansion timed out",
                ));
                0
            }
        };

        state.emit(ProgressEvent::phase_complete(
            "citation_network",
            count,
            "citation network expanded",
        ));
        count
    }

    async fn variation_phase(
        &self,
        state: &SearchState,
        options: &SearchOptions,
        request: &SearchRequest,
        variations: &[String],
    ) -> usize {
        let Some(broad) = self.registry.broad_adapter() else {
            return 0;
        };
        if !self.source_allowed(options, broad.id()) {
            return 0;
        }

        // The original query already ran everywhere; re-issue the next
        // few variations only.
        let units = variations
            .iter()
            .skip(1)
            .take(VARIATION_REQUERIES)
            .map(|variation| {
                let source = broad.clone();
                let request = SearchRequest {
                    query: variation.clone(),
                    ..request.clone()
                };
                FanOutUnit {
                    label: source.id().to_string(),
                    future: Box::pin(async move { source.search(&request).await }),
                }
            })
            .collect();

        self.fan_out(state, "query_variations", units).await
    }

    /// Run a batch of adapter calls through the worker pool, emitting
    /// `running` and exactly one terminal event per unit. Returns the
    /// number of records absorbed.
    async fn fan_out(&self, state: &SearchState, phase: &str, units: Vec<FanOutUnit>) -> usize {
        state.emit(ProgressEvent::phase_running(
            phase,
            format!("querying {} sources", units.len()),
        ));

        let tasks = units.into_iter().map(|unit| async move {
            let _permit = state.pool.acquire().await.expect("worker pool is never closed");

            let remaining = state.remaining();
            if remaining.is_zero() {
                state.emit(ProgressEvent::source_error(
                    phase,
                    &unit.label,
                    "skipped: search deadline exceeded",
                ));
                return 0;
            }

            state.emit(ProgressEvent::source_running(phase, &unit.label));
            state.mark_searched(&unit.label);

            let per_call = remaining.min(Duration::from_secs(ADAPTER_TIMEOUT_SECS));
            match tokio::time::timeout(per_call, unit.future).await {
                Ok(Ok(records)) => {
                    let count = state.absorb(records);
                    state.emit(ProgressEvent::source_complete(phase, &unit.label, count));
                    count
                }
                Ok(Err(error)) => {
                    tracing::debug!(source = unit.label, %error, "adapter failed");
                    state.emit(ProgressEvent::source_error(phase, &unit.label, error.to_string()));
                    0
                }
                Err(_) => {
                    state.emit(ProgressEvent::source_error(phase, &unit.label, "timed out"));
                    0
                }
            }
        });

        let counts = futures_util::future::join_all(tasks).await;
        let total: usize = counts.into_iter().sum();

        state.emit(ProgressEvent::phase_complete(
            phase,
            total,
            format!("{total} records gathered"),
        ));
        total
    }

    /// Phase 12: write open-access URLs back onto records lacking one.
    async fn resolve_fulltext(&self, state: &SearchState, records: &mut [PaperRecord]) -> usize {
        state.emit(ProgressEvent::phase_running("fulltext", "resolving open-access URLs"));

        let mut resolved = 0;
        for record in records.iter_mut().take(FULLTEXT_LIMIT) {
            if record.pdf_url.is_some() || state.remaining().is_zero() {
                continue;
            }
            let _permit = state.pool.acquire().await.expect("worker pool is never closed");
            let result = self.resolver.resolve(record).await;
            if result.found {
                record.pdf_url = result.url;
                if record.access == AccessType::Unknown {
                    record.access = result.access;
                }
                resolved += 1;
            }
        }

        state.emit(ProgressEvent::phase_complete(
            "fulltext",
            resolved,
            format!("{resolved} records enriched"),
        ));
        resolved
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_query_is_the_only_error() {
        let engine =
            ResearchEngine::with_registry(Settings::default(), SourceRegistry::empty()).unwrap();
        assert!(matches!(
            engine.search("", SearchOptions::default(), None).await,
            Err(EngineError::EmptyQuery)
        ));
        assert!(matches!(
            engine.search("   ", SearchOptions::default(), None).await,
            Err(EngineError::EmptyQuery)
        ));
    }

    #[tokio::test]
    async fn test_empty_registry_still_returns_a_result() {
        let engine =
            ResearchEngine::with_registry(Settings::default(), SourceRegistry::empty()).unwrap();
        let result = engine
            .search("widgets", SearchOptions::default(), None)
            .await
            .unwrap();

        assert_eq!(result.query, "widgets");
        assert!(result.records.is_empty());
        assert_eq!(result.reasoning.steps.len(), 8);
        assert_eq!(result.statistics.raw_records, 0);
        assert!(!result.statistics.truncated);
    }
}
