//! arXiv adapter, the Atom-feed family reference.

use async_trait::async_trait;
use feed_rs::parser;

use crate::models::{AccessType, PaperRecord, RecordBuilder, SearchRequest};
use crate::sources::registry::SourceCapabilities;
use crate::sources::{finalize_records, Source, SourceError, SourceFamily};
use crate::utils::text::normalize_arxiv_id;
use crate::utils::{api_retry_config, with_retry, HttpClient};

pub const RPM: u32 = 60;

const ARXIV_PDF_URL: &str = "https://arxiv.org/pdf";

#[derive(Debug)]
pub struct ArxivSource {
    client: HttpClient,
    base_url: String,
}

impl ArxivSource {
    pub fn new() -> Result<Self, SourceError> {
        Ok(Self {
            client: HttpClient::per_minute(RPM, None)?,
            base_url: "http://export.arxiv.org/api/query".to_string(),
        })
    }

    /// Point the adapter at a different endpoint (tests).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    fn build_query(request: &SearchRequest) -> String {
        let mut parts = vec![format!("all:{}", request.query)];

        match (request.year_start, request.year_end) {
            (None, None) => {}
            (start, end) => {
                let from = start.map_or("*".to_string(), |y| format!("{y}01010000"));
                let to = end.map_or("*".to_string(), |y| format!("{y}12312359"));
                parts.push(format!("submittedDate:[{from} TO {to}]"));
            }
        }

        parts.join(" AND ")
    }

    fn parse_entry(entry: &feed_rs::model::Entry) -> Option<PaperRecord> {
        // Entry ids look like http://arxiv.org/abs/2301.00001v2
        let arxiv_id = normalize_arxiv_id(entry.id.split("/abs/").last()?);
        if arxiv_id.is_empty() {
            return None;
        }

        let title = entry
            .title
            .as_ref()
            .map(|t| t.content.trim().to_string())
            .unwrap_or_default();
        let abstract_text = entry
            .summary
            .as_ref()
            .map(|s| s.content.trim().to_string())
            .unwrap_or_default();
        let authors: Vec<String> = entry.authors.iter().map(|a| a.name.clone()).collect();
        let year = entry.published.map(|d| {
            use chrono::Datelike;
            d.year()
        });
        let categories: Vec<String> = entry
            .categories
            .iter()
            .map(|c| c.term.clone())
            .collect();

        let mut builder = RecordBuilder::new(title, "arxiv")
            .arxiv_id(&arxiv_id)
            .abstract_text(abstract_text)
            .authors(authors)
            .keywords(categories)
            .access(AccessType::Open)
            .pdf_url(format!("{ARXIV_PDF_URL}/{arxiv_id}.pdf"));
        if let Some(year) = year {
            builder = builder.year(year);
        }

        Some(builder.build())
    }
}

#[async_trait]
impl Source for ArxivSource {
    fn id(&self) -> &str {
        "arxiv"
    }

    fn name(&self) -> &str {
        "arXiv"
    }

    fn family(&self) -> SourceFamily {
        SourceFamily::Preprint
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::SEARCH
    }

    async fn search(&self, request: &SearchRequest) -> Result<Vec<PaperRecord>, SourceError> {
        let url = format!(
            "{}?search_query={}&max_results={}&sortBy=relevance&sortOrder=descending",
            self.base_url,
            urlencoding::encode(&Self::build_query(request)),
            request.max_results.min(200)
        );

        let feed = with_retry(api_retry_config(), || {
            let url = url.clone();
            async move {
                let response = self
                    .client
                    .get(&url)
                    .header("Accept", "application/atom+xml")
                    .send()
                    .await
                    .map_err(|e| SourceError::Network(format!("arXiv: {e}")))?;

                if !response.status().is_success() {
                    return Err(SourceError::Api(format!(
                        "arXiv returned HTTP {}",
                        response.status()
                    )));
                }

                let bytes = response
                    .bytes()
                    .await
                    .map_err(|e| SourceError::Network(format!("arXiv body: {e}")))?;

                parser::parse(bytes.as_ref())
                    .map_err(|e| SourceError::Parse(format!("arXiv Atom feed: {e}")))
            }
        })
        .await?;

        let records = feed.entries.iter().filter_map(Self::parse_entry).collect();
        Ok(finalize_records(records, self.id(), request.max_results))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
        <feed xmlns="http://www.w3.org/2005/Atom">
            <title>arXiv Query Results</title>
            <entry>
                <id>http://arxiv.org/abs/2301.00001v2</id>
                <title>Scaling laws for widgets</title>
                <summary>We study widget scaling.</summary>
                <published>2023-01-02T10:00:00Z</published>
                <author><name>Ada Lovelace</name></author>
                <category term="cs.LG"/>
            </entry>
        </feed>"#;

    #[test]
    fn test_build_query() {
        let request = SearchRequest::new("graph neural networks").years(Some(2020), Some(2022));
        let query = ArxivSource::build_query(&request);
        assert!(query.contains("all:graph neural networks"));
        assert!(query.contains("submittedDate:[202001010000 TO 202212312359]"));

        let open_ended = ArxivSource::build_query(&SearchRequest::new("x").years(Some(2020), None));
        assert!(open_ended.contains("[202001010000 TO *]"));
    }

    #[test]
    fn test_parse_entry() {
        let feed = parser::parse(FEED.as_bytes()).expect("fixture parses");
        let record = ArxivSource::parse_entry(&feed.entries[0]).expect("entry projects");

        assert_eq!(record.arxiv_id.as_deref(), Some("2301.00001"));
        assert_eq!(record.title, "Scaling laws for widgets");
        assert_eq!(record.authors, vec!["Ada Lovelace"]);
        assert_eq!(record.year, Some(2023));
        assert_eq!(record.access, AccessType::Open);
        assert_eq!(
            record.pdf_url.as_deref(),
            Some("https://arxiv.org/pdf/2301.00001.pdf")
        );
        assert!(record.keywords.contains("cs.LG"));
    }

    #[tokio::test]
    async fn test_search_against_mock() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", mockito::Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/atom+xml")
            .with_body(FEED)
            .create_async()
            .await;

        let source = ArxivSource::new().unwrap().with_base_url(server.url());
        let records = source.search(&SearchRequest::new("widgets")).await.unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].primary_source, "arxiv");
    }
}
