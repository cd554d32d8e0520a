//! Semantic Scholar Graph API adapter.
//!
//! Reference adapter for the citation-graph role: besides search it
//! serves both directions of the citation network expansion.

use async_trait::async_trait;

use crate::models::{AccessType, PaperRecord, RecordBuilder, SearchRequest};
use crate::sources::registry::SourceCapabilities;
use crate::sources::{finalize_records, Source, SourceError, SourceFamily};
use crate::utils::{api_retry_config, with_retry, HttpClient};

pub const RPM: u32 = 1200;

const FIELDS: &str =
    "title,abstract,authors,year,venue,externalIds,citationCount,openAccessPdf,isOpenAccess";

/// Cap applied to one citation/reference fetch.
const CITATION_PAGE: usize = 50;

#[derive(Debug)]
pub struct SemanticScholarSource {
    client: HttpClient,
    base_url: String,
    api_key: Option<String>,
}

impl SemanticScholarSource {
    pub fn new(api_key: Option<String>) -> Result<Self, SourceError> {
        Ok(Self {
            client: HttpClient::per_minute(RPM, None)?,
            base_url: "https://api.semanticscholar.org/graph/v1".to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        })
    }

    /// Point the adapter at a different endpoint (tests).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// The Graph API addresses papers as `DOI:...` / `PMID:...`; accept
    /// bare identifiers and add the right prefix.
    fn canonical_id(id: &str) -> String {
        let id = id.trim();
        if id.contains(':') {
            id.to_string()
        } else if id.chars().all(|c| c.is_ascii_digit()) {
            format!("PMID:{id}")
        } else {
            format!("DOI:{id}")
        }
    }

    async fn fetch_json(&self, url: String) -> Result<serde_json::Value, SourceError> {
        with_retry(api_retry_config(), || {
            let url = url.clone();
            async move {
                let mut builder = self.client.get(&url);
                if let Some(key) = self.api_key.as_deref() {
                    builder = builder.header("x-api-key", key);
                }

                let response = builder
                    .send()
                    .await
                    .map_err(|e| SourceError::Network(format!("Semantic Scholar: {e}")))?;

                if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
                    return Err(SourceError::RateLimit);
                }
                if !response.status().is_success() {
                    return Err(SourceError::Api(format!(
                        "Semantic Scholar returned HTTP {}",
                        response.status()
                    )));
                }

                response
                    .json::<serde_json::Value>()
                    .await
                    .map_err(|e| SourceError::Parse(format!("Semantic Scholar: {e}")))
            }
        })
        .await
    }

    fn parse_paper(paper: &serde_json::Value) -> PaperRecord {
        let title = paper["title"].as_str().unwrap_or_default();
        let mut builder = RecordBuilder::new(title, "semantic_scholar");

        if let Some(doi) = paper["externalIds"]["DOI"].as_str() {
            builder = builder.doi(doi);
        }
        if let Some(pmid) = paper["externalIds"]["PubMed"].as_str() {
            builder = builder.pmid(pmid);
        }
        if let Some(arxiv) = paper["externalIds"]["ArXiv"].as_str() {
            builder = builder.arxiv_id(arxiv);
        }
        if let Some(text) = paper["abstract"].as_str() {
            builder = builder.abstract_text(text);
        }
        if let Some(authors) = paper["authors"].as_array() {
            builder = builder.authors(authors.iter().filter_map(|a| a["name"].as_str()));
        }
        if let Some(year) = paper["year"].as_i64() {
            builder = builder.year(year as i32);
        }
        if let Some(venue) = paper["venue"].as_str() {
            if !venue.is_empty() {
                builder = builder.journal(venue);
            }
        }
        if let Some(citations) = paper["citationCount"].as_u64() {
            builder = builder.citations(citations as u32);
        }
        if let Some(pdf) = paper["openAccessPdf"]["url"].as_str() {
            builder = builder.pdf_url(pdf);
        }
        if paper["isOpenAccess"].as_bool() == Some(true) {
            builder = builder.access(AccessType::Open);
        }

        builder.build()
    }

    /// Citation and reference payloads nest the actual paper under a
    /// per-edge wrapper key.
    fn parse_edge_list(body: &serde_json::Value, wrapper: &str) -> Vec<PaperRecord> {
        body["data"]
            .as_array()
            .map(|edges| {
                edges
                    .iter()
                    .map(|edge| Self::parse_paper(&edge[wrapper]))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl Source for SemanticScholarSource {
    fn id(&self) -> &str {
        "semantic_scholar"
    }

    fn name(&self) -> &str {
        "Semantic Scholar"
    }

    fn family(&self) -> SourceFamily {
        SourceFamily::CitationDatabase
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::SEARCH | SourceCapabilities::CITATIONS | SourceCapabilities::REFERENCES
    }

    fn available(&self) -> bool {
        self.api_key.is_some()
    }

    async fn search(&self, request: &SearchRequest) -> Result<Vec<PaperRecord>, SourceError> {
        let mut url = format!(
            "{}/paper/search?query={}&limit={}&fields={}",
            self.base_url,
            urlencoding::encode(&request.query),
            request.max_results.min(100),
            FIELDS
        );
        match (request.year_start, request.year_end) {
            (Some(start), Some(end)) => url.push_str(&format!("&year={start}-{end}")),
            (Some(start), None) => url.push_str(&format!("&year={start}-")),
            (None, Some(end)) => url.push_str(&format!("&year=-{end}")),
            (None, None) => {}
        }

        let body = self.fetch_json(url).await?;
        let records = body["data"]
            .as_array()
            .map(|papers| papers.iter().map(Self::parse_paper).collect())
            .unwrap_or_default();

        Ok(finalize_records(records, self.id(), request.max_results))
    }

    async fn get_citations(&self, id: &str) -> Result<Vec<PaperRecord>, SourceError> {
        let url = format!(
            "{}/paper/{}/citations?limit={}&fields={}",
            self.base_url,
            urlencoding::encode(&Self::canonical_id(id)),
            CITATION_PAGE,
            FIELDS
        );
        let body = self.fetch_json(url).await?;
        Ok(finalize_records(
            Self::parse_edge_list(&body, "citingPaper"),
            self.id(),
            CITATION_PAGE,
        ))
    }

    async fn get_references(&self, id: &str) -> Result<Vec<PaperRecord>, SourceError> {
        let url = format!(
            "{}/paper/{}/references?limit={}&fields={}",
            self.base_url,
            urlencoding::encode(&Self::canonical_id(id)),
            CITATION_PAGE,
            FIELDS
        );
        let body = self.fetch_json(url).await?;
        Ok(finalize_records(
            Self::parse_edge_list(&body, "citedPaper"),
            self.id(),
            CITATION_PAGE,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_id() {
        assert_eq!(SemanticScholarSource::canonical_id("10.1/x"), "DOI:10.1/x");
        assert_eq!(SemanticScholarSource::canonical_id("123456"), "PMID:123456");
        assert_eq!(
            SemanticScholarSource::canonical_id("CorpusID:42"),
            "CorpusID:42"
        );
    }

    #[test]
    fn test_parse_paper() {
        let paper: serde_json::Value = serde_json::from_str(
            r#"{
                "title":"BERT pretraining",
                "abstract":"Language models.",
                "authors":[{"name":"Jacob Devlin"}],
                "year":2019,
                "venue":"NAACL",
                "externalIds":{"DOI":"10.1/bert","ArXiv":"1810.04805"},
                "citationCount":60000,
                "isOpenAccess":true,
                "openAccessPdf":{"url":"https://arxiv.org/pdf/1810.04805"}
            }"#,
        )
        .unwrap();

        let record = SemanticScholarSource::parse_paper(&paper);
        assert_eq!(record.arxiv_id.as_deref(), Some("1810.04805"));
        assert_eq!(record.citations, Some(60000));
        assert_eq!(record.access, AccessType::Open);
        assert_eq!(record.journal.as_deref(), Some("NAACL"));
    }

    #[test]
    fn test_parse_edge_list() {
        let body: serde_json::Value = serde_json::from_str(
            r#"{"data":[{"citingPaper":{"title":"Follow-up work","year":2021}}]}"#,
        )
        .unwrap();
        let records = SemanticScholarSource::parse_edge_list(&body, "citingPaper");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].title, "Follow-up work");
    }

    #[test]
    fn test_requires_key() {
        let source = SemanticScholarSource::new(None).unwrap();
        assert!(!source.available());
        let source = SemanticScholarSource::new(Some("key".into())).unwrap();
        assert!(source.available());
    }

    #[tokio::test]
    async fn test_search_against_mock() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", mockito::Matcher::Regex("/paper/search.*".to_string()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"total":1,"data":[{"title":"Mocked paper","year":2020}]}"#)
            .create_async()
            .await;

        let source = SemanticScholarSource::new(Some("key".into()))
            .unwrap()
            .with_base_url(server.url());

        let records = source.search(&SearchRequest::new("mock")).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].primary_source, "semantic_scholar");
    }
}
