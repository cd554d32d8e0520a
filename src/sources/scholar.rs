//! Google-Scholar-class adapter, the HTML-scrape family reference.
//!
//! Two access paths: the SerpAPI JSON proxy when `SERPAPI_KEY` is set,
//! otherwise a direct scrape of the result page when scraping has been
//! explicitly enabled. Scholar tolerates very little traffic, hence
//! the 5 requests/minute budget.

use async_trait::async_trait;
use regex::Regex;
use scraper::{Html, Selector};
use std::sync::OnceLock;

use crate::models::{PaperRecord, RecordBuilder, SearchRequest};
use crate::sources::registry::SourceCapabilities;
use crate::sources::{finalize_records, Source, SourceError, SourceFamily};
use crate::utils::HttpClient;

pub const RPM: u32 = 5;

fn year_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(19|20)\d{2}\b").expect("static regex"))
}

#[derive(Debug)]
pub struct GoogleScholarSource {
    client: HttpClient,
    scrape_url: String,
    serpapi_url: String,
    serpapi_key: Option<String>,
    scrape_enabled: bool,
}

impl GoogleScholarSource {
    pub fn new(serpapi_key: Option<String>, scrape_enabled: bool) -> Result<Self, SourceError> {
        Ok(Self {
            client: HttpClient::per_minute(RPM, None)?,
            scrape_url: "https://scholar.google.com/scholar".to_string(),
            serpapi_url: "https://serpapi.com/search.json".to_string(),
            serpapi_key: serpapi_key.filter(|k| !k.trim().is_empty()),
            scrape_enabled,
        })
    }

    /// Point the adapter at different endpoints (tests).
    pub fn with_urls(mut self, scrape: impl Into<String>, serpapi: impl Into<String>) -> Self {
        self.scrape_url = scrape.into();
        self.serpapi_url = serpapi.into();
        self
    }

    async fn search_serpapi(
        &self,
        request: &SearchRequest,
        key: &str,
    ) -> Result<Vec<PaperRecord>, SourceError> {
        let response = self
            .client
            .get(&self.serpapi_url)
            .query(&[
                ("engine", "google_scholar"),
                ("q", request.query.as_str()),
                ("num", "20"),
                ("api_key", key),
            ])
            .send()
            .await
            .map_err(|e| SourceError::Network(format!("SerpAPI: {e}")))?;

        if !response.status().is_success() {
            return Err(SourceError::Api(format!(
                "SerpAPI returned HTTP {}",
                response.status()
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| SourceError::Parse(format!("SerpAPI: {e}")))?;

        let records = body["organic_results"]
            .as_array()
            .map(|results| {
                results
                    .iter()
                    .map(|result| {
                        let title = result["title"].as_str().unwrap_or_default();
                        let summary = result["publication_info"]["summary"]
                            .as_str()
                            .unwrap_or_default();
                        let mut record = parse_byline(title, summary);
                        if let Some(snippet) = result["snippet"].as_str() {
                            record.abstract_text = snippet.to_string();
                        }
                        if let Some(cited) =
                            result["inline_links"]["cited_by"]["total"].as_u64()
                        {
                            record.citations = Some(cited as u32);
                        }
                        record
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(records)
    }

    async fn search_scrape(&self, request: &SearchRequest) -> Result<Vec<PaperRecord>, SourceError> {
        let response = self
            .client
            .get(&self.scrape_url)
            .query(&[("q", request.query.as_str()), ("hl", "en")])
            .send()
            .await
            .map_err(|e| SourceError::Network(format!("Google Scholar: {e}")))?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(SourceError::RateLimit);
        }
        if !response.status().is_success() {
            return Err(SourceError::Api(format!(
                "Google Scholar returned HTTP {}",
                response.status()
            )));
        }

        let html = response
            .text()
            .await
            .map_err(|e| SourceError::Network(format!("Google Scholar body: {e}")))?;

        Ok(parse_result_page(&html))
    }
}

/// Parse the scraped result page. Kept synchronous: the parsed DOM is
/// not `Send` and must not live across an await point.
fn parse_result_page(html: &str) -> Vec<PaperRecord> {
    let document = Html::parse_document(html);
    let result_sel = Selector::parse("div.gs_ri").expect("static selector");
    let title_sel = Selector::parse("h3.gs_rt a").expect("static selector");
    let byline_sel = Selector::parse("div.gs_a").expect("static selector");
    let snippet_sel = Selector::parse("div.gs_rs").expect("static selector");

    document
        .select(&result_sel)
        .filter_map(|result| {
            let title = result
                .select(&title_sel)
                .next()
                .map(|a| a.text().collect::<String>())?;
            let byline = result
                .select(&byline_sel)
                .next()
                .map(|b| b.text().collect::<String>())
                .unwrap_or_default();

            let mut record = parse_byline(title.trim(), byline.trim());
            if let Some(snippet) = result.select(&snippet_sel).next() {
                record.abstract_text = snippet.text().collect::<String>().trim().to_string();
            }
            Some(record)
        })
        .collect()
}

/// Scholar bylines look like "J Smith, A Lee - Nature, 2020 - nature.com".
fn parse_byline(title: &str, byline: &str) -> PaperRecord {
    let mut builder = RecordBuilder::new(title, "google_scholar");

    let mut segments = byline.split(" - ");
    if let Some(authors) = segments.next() {
        let authors: Vec<&str> = authors
            .split(',')
            .map(str::trim)
            .filter(|a| !a.is_empty() && !a.contains('…'))
            .collect();
        if !authors.is_empty() {
            builder = builder.authors(authors);
        }
    }
    if let Some(venue) = segments.next() {
        let journal = venue
            .split(',')
            .next()
            .map(str::trim)
            .filter(|j| !j.is_empty() && year_re().find(j).is_none());
        if let Some(journal) = journal {
            builder = builder.journal(journal);
        }
    }
    if let Some(year) = year_re()
        .find(byline)
        .and_then(|m| m.as_str().parse::<i32>().ok())
    {
        builder = builder.year(year);
    }

    builder.build()
}

#[async_trait]
impl Source for GoogleScholarSource {
    fn id(&self) -> &str {
        "google_scholar"
    }

    fn name(&self) -> &str {
        "Google Scholar"
    }

    fn family(&self) -> SourceFamily {
        SourceFamily::ScholarSearch
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::SEARCH
    }

    fn available(&self) -> bool {
        self.serpapi_key.is_some() || self.scrape_enabled
    }

    async fn search(&self, request: &SearchRequest) -> Result<Vec<PaperRecord>, SourceError> {
        let records = match self.serpapi_key.clone() {
            Some(key) => self.search_serpapi(request, &key).await?,
            None if self.scrape_enabled => self.search_scrape(request).await?,
            None => {
                return Err(SourceError::MissingCredential(
                    "SERPAPI_KEY or GOOGLE_SCHOLAR_ENABLED".to_string(),
                ))
            }
        };

        Ok(finalize_records(records, self.id(), request.max_results))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_byline() {
        let record = parse_byline(
            "Deep learning",
            "Y LeCun, Y Bengio, G Hinton - Nature, 2015 - nature.com",
        );
        assert_eq!(record.authors, vec!["Y LeCun", "Y Bengio", "G Hinton"]);
        assert_eq!(record.journal.as_deref(), Some("Nature"));
        assert_eq!(record.year, Some(2015));
    }

    #[test]
    fn test_parse_byline_without_venue() {
        let record = parse_byline("Untitled", "A Author");
        assert_eq!(record.authors, vec!["A Author"]);
        assert!(record.journal.is_none());
        assert!(record.year.is_none());
    }

    #[test]
    fn test_parse_result_page() {
        let html = r#"
            <html><body>
              <div class="gs_r"><div class="gs_ri">
                <h3 class="gs_rt"><a href="/x">Widgets at scale</a></h3>
                <div class="gs_a">J Smith, K Lee - JMLR, 2021 - jmlr.org</div>
                <div class="gs_rs">We scale widgets considerably.</div>
              </div></div>
              <div class="gs_r"><div class="gs_ri">
                <h3 class="gs_rt"><a href="/y">Widgets again</a></h3>
                <div class="gs_a">P Querty - 2019</div>
              </div></div>
            </body></html>"#;

        let records = parse_result_page(html);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].title, "Widgets at scale");
        assert_eq!(records[0].abstract_text, "We scale widgets considerably.");
        assert_eq!(records[0].year, Some(2021));
        assert_eq!(records[1].year, Some(2019));
    }

    #[test]
    fn test_availability() {
        let source = GoogleScholarSource::new(None, false).unwrap();
        assert!(!source.available());
        let source = GoogleScholarSource::new(Some("k".into()), false).unwrap();
        assert!(source.available());
        let source = GoogleScholarSource::new(None, true).unwrap();
        assert!(source.available());
    }

    #[tokio::test]
    async fn test_serpapi_search_against_mock() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", mockito::Matcher::Any)
            .with_status(200)
            .with_body(
                r#"{"organic_results":[{
                    "title":"Scaling laws",
                    "snippet":"We observe scaling.",
                    "publication_info":{"summary":"J Kaplan - arXiv, 2020 - arxiv.org"},
                    "inline_links":{"cited_by":{"total":4000}}
                }]}"#,
            )
            .create_async()
            .await;

        let source = GoogleScholarSource::new(Some("key".into()), false)
            .unwrap()
            .with_urls(server.url(), server.url());

        let records = source.search(&SearchRequest::new("scaling")).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].citations, Some(4000));
        assert_eq!(records[0].primary_source, "google_scholar");
    }
}
