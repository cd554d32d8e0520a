//! Composite publisher adapter.
//!
//! Publisher-scoped search is served by delegating to the DOI
//! registry's server-side publisher-name filter instead of keeping a
//! bespoke client per publisher. One delegate plus a name table covers
//! every publisher in [`PublisherAdapter::publishers`].

use std::sync::Arc;

use crate::models::{PaperRecord, SearchRequest};
use crate::sources::{Source, SourceError};

/// Publishers routed through the registry filter during the publisher
/// fan-out phase.
const PUBLISHERS: &[&str] = &[
    "Springer",
    "Elsevier",
    "Wiley",
    "American Chemical Society",
    "Royal Society of Chemistry",
    "IEEE",
    "Oxford University Press",
    "Cambridge University Press",
    "PLOS",
    "Frontiers",
    "BMC",
    "Taylor & Francis",
    "SAGE",
    "MDPI",
    "Nature Portfolio",
    "American Physical Society",
];

#[derive(Debug, Clone)]
pub struct PublisherAdapter {
    delegate: Arc<dyn Source>,
}

impl PublisherAdapter {
    /// `delegate` should support a server-side publisher filter; a
    /// delegate without one degrades to plain search.
    pub fn new(delegate: Arc<dyn Source>) -> Self {
        Self { delegate }
    }

    pub fn publishers() -> &'static [&'static str] {
        PUBLISHERS
    }

    /// Id of the underlying registry adapter.
    pub fn delegate_id(&self) -> &str {
        self.delegate.id()
    }

    pub async fn search(
        &self,
        request: &SearchRequest,
        publisher: &str,
    ) -> Result<Vec<PaperRecord>, SourceError> {
        self.delegate.search_by_publisher(request, publisher).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RecordBuilder;
    use crate::sources::registry::SourceCapabilities;
    use crate::sources::SourceFamily;
    use async_trait::async_trait;

    #[derive(Debug)]
    struct FilterEcho;

    #[async_trait]
    impl Source for FilterEcho {
        fn id(&self) -> &str {
            "echo"
        }
        fn name(&self) -> &str {
            "Echo"
        }
        fn family(&self) -> SourceFamily {
            SourceFamily::PriorityAcademic
        }
        fn capabilities(&self) -> SourceCapabilities {
            SourceCapabilities::SEARCH | SourceCapabilities::PUBLISHER_FILTER
        }
        async fn search(&self, _: &SearchRequest) -> Result<Vec<PaperRecord>, SourceError> {
            Ok(vec![])
        }
        async fn search_by_publisher(
            &self,
            _: &SearchRequest,
            publisher: &str,
        ) -> Result<Vec<PaperRecord>, SourceError> {
            Ok(vec![RecordBuilder::new(format!("From {publisher}"), "echo").build()])
        }
    }

    #[tokio::test]
    async fn test_delegates_publisher_filter() {
        let adapter = PublisherAdapter::new(Arc::new(FilterEcho));
        let records = adapter
            .search(&SearchRequest::new("q"), "Wiley")
            .await
            .unwrap();
        assert_eq!(records[0].title, "From Wiley");
    }

    #[test]
    fn test_publisher_table_nonempty() {
        assert!(PublisherAdapter::publishers().len() >= 10);
        assert!(PublisherAdapter::publishers().contains(&"Elsevier"));
    }
}
