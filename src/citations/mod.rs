//! Citation network expansion.
//!
//! Starting from the most-cited seeds of the gathered corpus, walk the
//! citation graph in both directions through whichever registered
//! sources expose it, and pull in works the keyword fan-out missed.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::models::PaperRecord;
use crate::sources::Source;
use crate::utils::text::normalize_doi;

/// Provenance id stamped on records discovered through the graph walk.
pub const NETWORK_SOURCE: &str = "citation_network";

/// How many top-cited records seed the expansion.
const MAX_SEEDS: usize = 20;
/// Cap on discovered records, applied to each direction independently.
const DEFAULT_DIRECTION_CAP: usize = 50;
/// A common reference must appear in at least this many records.
const COMMON_REFERENCE_THRESHOLD: usize = 3;
/// Bound on the emitted common-reference list.
const MAX_COMMON_REFERENCES: usize = 50;

pub struct CitationNetworkBuilder {
    fetchers: Vec<Arc<dyn Source>>,
    direction_cap: usize,
}

impl CitationNetworkBuilder {
    /// `fetchers` are tried in order until one answers; they come from
    /// the registry's citation-capable view.
    pub fn new(fetchers: Vec<Arc<dyn Source>>) -> Self {
        Self {
            fetchers,
            direction_cap: DEFAULT_DIRECTION_CAP,
        }
    }

    pub fn with_direction_cap(mut self, cap: usize) -> Self {
        self.direction_cap = cap;
        self
    }

    /// Pick the expansion seeds: the most-cited records carrying a DOI
    /// or PubMed id.
    fn seeds(corpus: &[PaperRecord]) -> Vec<&PaperRecord> {
        let mut eligible: Vec<&PaperRecord> = corpus
            .iter()
            .filter(|r| r.doi.is_some() || r.pmid.is_some())
            .collect();
        eligible.sort_by(|a, b| b.citations.unwrap_or(0).cmp(&a.citations.unwrap_or(0)));
        eligible.truncate(MAX_SEEDS);
        eligible
    }

    /// Expand the corpus through the citation graph. Returns only the
    /// newly discovered records, already stamped with
    /// [`NETWORK_SOURCE`] provenance.
    pub async fn expand(&self, corpus: &[PaperRecord]) -> Vec<PaperRecord> {
        if self.fetchers.is_empty() {
            return Vec::new();
        }

        let mut known_dois: HashSet<String> = corpus
            .iter()
            .filter_map(|r| r.doi.as_deref().map(normalize_doi))
            .collect();

        let mut discovered = Vec::new();
        let mut citing_budget = self.direction_cap;
        let mut reference_budget = self.direction_cap;

        for seed in Self::seeds(corpus) {
            if citing_budget == 0 && reference_budget == 0 {
                break;
            }
            let Some(id) = seed.doi.as_deref().or(seed.pmid.as_deref()) else {
                continue;
            };

            if citing_budget > 0 {
                let found = self.fetch(id, Direction::Citing).await;
                citing_budget -= self.admit(found, &mut known_dois, &mut discovered, citing_budget);
            }
            if reference_budget > 0 {
                let found = self.fetch(id, Direction::References).await;
                reference_budget -=
                    self.admit(found, &mut known_dois, &mut discovered, reference_budget);
            }
        }

        discovered
    }

    /// Collect reference DOIs across the given records and emit those
    /// shared by several of them. These frequently surface
    /// foundational works the keyword search never returned.
    pub async fn common_references(&self, records: &[PaperRecord]) -> Vec<(String, usize)> {
        if self.fetchers.is_empty() {
            return Vec::new();
        }

        let mut counts: HashMap<String, usize> = HashMap::new();
        for record in records {
            let Some(id) = record.doi.as_deref().or(record.pmid.as_deref()) else {
                continue;
            };
            for reference in self.fetch(id, Direction::References).await {
                if let Some(doi) = reference.doi.as_deref() {
                    *counts.entry(normalize_doi(doi)).or_insert(0) += 1;
                }
            }
        }

        let mut common: Vec<(String, usize)> = counts
            .into_iter()
            .filter(|(_, count)| *count >= COMMON_REFERENCE_THRESHOLD)
            .collect();
        common.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        common.truncate(MAX_COMMON_REFERENCES);
        common
    }

    async fn fetch(&self, id: &str, direction: Direction) -> Vec<PaperRecord> {
        for fetcher in &self.fetchers {
            let result = match direction {
                Direction::Citing => fetcher.get_citations(id).await,
                Direction::References => fetcher.get_references(id).await,
            };
            match result {
                Ok(records) => return records,
                Err(error) => {
                    tracing::debug!(source = fetcher.id(), %error, ?direction, "citation fetch failed");
                }
            }
        }
        Vec::new()
    }

    /// Admit records not already known by DOI, up to `budget`; returns
    /// how many were taken.
    fn admit(
        &self,
        found: Vec<PaperRecord>,
        known_dois: &mut HashSet<String>,
        discovered: &mut Vec<PaperRecord>,
        budget: usize,
    ) -> usize {
        let mut taken = 0;
        for mut record in found {
            if taken >= budget {
                break;
            }
            let Some(doi) = record.doi.as_deref().map(normalize_doi) else {
                continue;
            };
            if !known_dois.insert(doi) {
                continue;
            }
            record.primary_source = NETWORK_SOURCE.to_string();
            record.add_source(NETWORK_SOURCE);
            discovered.push(record);
            taken += 1;
        }
        taken
    }
}

#[derive(Debug, Clone, Copy)]
enum Direction {
    Citing,
    References,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RecordBuilder, SearchRequest};
    use crate::sources::{SourceCapabilities, SourceError, SourceFamily};
    use async_trait::async_trait;

    /// Graph stub: every lookup returns the same fixed neighbor set,
    /// `citer-N` in one direction and `ref-N` in the other.
    #[derive(Debug)]
    struct StubGraph {
        fanout: usize,
    }

    impl StubGraph {
        fn papers(&self, suffix: &str) -> Vec<PaperRecord> {
            (0..self.fanout)
                .map(|i| {
                    RecordBuilder::new(format!("{suffix} {i}"), "stub")
                        .doi(format!("10.9/{suffix}-{i}"))
                        .build()
                })
                .collect()
        }
    }

    #[async_trait]
    impl Source for StubGraph {
        fn id(&self) -> &str {
            "stub"
        }
        fn name(&self) -> &str {
            "Stub"
        }
        fn family(&self) -> SourceFamily {
            SourceFamily::CitationDatabase
        }
        fn capabilities(&self) -> SourceCapabilities {
            SourceCapabilities::CITATIONS | SourceCapabilities::REFERENCES
        }
        async fn search(&self, _: &SearchRequest) -> Result<Vec<PaperRecord>, SourceError> {
            Ok(vec![])
        }
        async fn get_citations(&self, _id: &str) -> Result<Vec<PaperRecord>, SourceError> {
            Ok(self.papers("citer"))
        }
        async fn get_references(&self, _id: &str) -> Result<Vec<PaperRecord>, SourceError> {
            Ok(self.papers("ref"))
        }
    }

    fn corpus(n: usize) -> Vec<PaperRecord> {
        (0..n)
            .map(|i| {
                RecordBuilder::new(format!("Seed {i}"), "pubmed")
                    .doi(format!("10.1/seed{i}"))
                    .citations(i as u32)
                    .build()
            })
            .collect()
    }

    #[tokio::test]
    async fn test_expand_tags_provenance_and_dedups() {
        let builder = CitationNetworkBuilder::new(vec![Arc::new(StubGraph { fanout: 2 })]);
        let corpus = corpus(3);

        let discovered = builder.expand(&corpus).await;
        assert!(!discovered.is_empty());
        for record in &discovered {
            assert_eq!(record.primary_source, NETWORK_SOURCE);
            assert!(record.sources_found_in.contains(&NETWORK_SOURCE.to_string()));
        }

        // Expanding again over corpus + discovered yields nothing new.
        let mut extended = corpus;
        extended.extend(discovered);
        let again = builder.expand(&extended).await;
        assert!(again.is_empty());
    }

    #[tokio::test]
    async fn test_direction_caps_apply_independently() {
        let builder = CitationNetworkBuilder::new(vec![Arc::new(StubGraph { fanout: 10 })])
            .with_direction_cap(5);
        let discovered = builder.expand(&corpus(4)).await;

        let citers = discovered.iter().filter(|r| r.title.starts_with("citer")).count();
        let references = discovered.iter().filter(|r| r.title.starts_with("ref")).count();
        assert_eq!(citers, 5);
        assert_eq!(references, 5);
    }

    #[tokio::test]
    async fn test_common_references() {
        // Every record shares the same references in this stub, so all
        // of them clear the >= 3 threshold.
        #[derive(Debug)]
        struct SharedRefs;

        #[async_trait]
        impl Source for SharedRefs {
            fn id(&self) -> &str {
                "shared"
            }
            fn name(&self) -> &str {
                "Shared"
            }
            fn family(&self) -> SourceFamily {
                SourceFamily::CitationDatabase
            }
            async fn search(&self, _: &SearchRequest) -> Result<Vec<PaperRecord>, SourceError> {
                Ok(vec![])
            }
            async fn get_references(&self, _: &str) -> Result<Vec<PaperRecord>, SourceError> {
                Ok(vec![
                    RecordBuilder::new("Classic", "shared").doi("10.1/classic").build(),
                    RecordBuilder::new("Niche", "shared").doi("10.1/niche").build(),
                ])
            }
        }

        let builder = CitationNetworkBuilder::new(vec![Arc::new(SharedRefs)]);
        let common = builder.common_references(&corpus(4)).await;

        assert_eq!(common.len(), 2);
        assert_eq!(common[0].1, 4);
        assert!(common.iter().all(|(_, count)| *count >= 3));
    }

    #[tokio::test]
    async fn test_no_fetchers_is_a_noop() {
        let builder = CitationNetworkBuilder::new(vec![]);
        assert!(builder.expand(&corpus(3)).await.is_empty());
        assert!(builder.common_references(&corpus(3)).await.is_empty());
    }
}
