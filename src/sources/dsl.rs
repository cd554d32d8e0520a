//! DSL-over-POST family: providers queried with a posted query
//! language rather than URL parameters. Dimensions (its own DSL, JWT
//! auth handshake) and Lens (Elasticsearch-style JSON query, bearer
//! key) are the two instances.

use async_trait::async_trait;
use tokio::sync::OnceCell;

use crate::models::{PaperRecord, RecordBuilder, SearchRequest};
use crate::sources::registry::SourceCapabilities;
use crate::sources::{finalize_records, Source, SourceError, SourceFamily};
use crate::utils::{api_retry_config, with_retry, HttpClient};

pub const DIMENSIONS_RPM: u32 = 120;
pub const LENS_RPM: u32 = 60;

// ===== Dimensions =====

#[derive(Debug)]
pub struct DimensionsSource {
    client: HttpClient,
    base_url: String,
    api_key: Option<String>,
    /// JWT obtained by exchanging the API key; fetched once per process.
    token: OnceCell<String>,
}

impl DimensionsSource {
    pub fn new(api_key: Option<String>) -> Result<Self, SourceError> {
        Ok(Self {
            client: HttpClient::per_minute(DIMENSIONS_RPM, None)?,
            base_url: "https://app.dimensions.ai/api".to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            token: OnceCell::new(),
        })
    }

    /// Point the adapter at a different endpoint (tests).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    async fn token(&self) -> Result<&str, SourceError> {
        let key = self
            .api_key
            .as_deref()
            .ok_or_else(|| SourceError::MissingCredential("DIMENSIONS_API_KEY".to_string()))?;

        self.token
            .get_or_try_init(|| async {
                let response = self
                    .client
                    .post(&format!("{}/auth.json", self.base_url))
                    .json(&serde_json::json!({ "key": key }))
                    .send()
                    .await
                    .map_err(|e| SourceError::Network(format!("Dimensions auth: {e}")))?;

                if !response.status().is_success() {
                    return Err(SourceError::Api(format!(
                        "Dimensions auth returned HTTP {}",
                        response.status()
                    )));
                }

                let body: serde_json::Value = response
                    .json()
                    .await
                    .map_err(|e| SourceError::Parse(format!("Dimensions auth: {e}")))?;

                body["token"]
                    .as_str()
                    .map(str::to_string)
                    .ok_or_else(|| SourceError::Parse("Dimensions auth: no token".to_string()))
            })
            .await
            .map(String::as_str)
    }

    fn build_dsl(request: &SearchRequest) -> String {
        let escaped = request.query.replace('"', "\\\"");
        let mut dsl = format!("search publications for \"{escaped}\"");
        match (request.year_start, request.year_end) {
            (Some(start), Some(end)) => dsl.push_str(&format!(" where year in [{start}:{end}]")),
            (Some(start), None) => dsl.push_str(&format!(" where year >= {start}")),
            (None, Some(end)) => dsl.push_str(&format!(" where year <= {end}")),
            (None, None) => {}
        }
        dsl.push_str(&format!(
            " return publications[title + doi + abstract + year + authors + journal + times_cited] limit {}",
            request.max_results.min(200)
        ));
        dsl
    }

    fn project(body: &serde_json::Value) -> Vec<PaperRecord> {
        let Some(publications) = body["publications"].as_array() else {
            return Vec::new();
        };

        publications
            .iter()
            .map(|publication| {
                let title = publication["title"].as_str().unwrap_or_default();
                let mut builder = RecordBuilder::new(title, "dimensions");

                if let Some(doi) = publication["doi"].as_str() {
                    builder = builder.doi(doi);
                }
                if let Some(text) = publication["abstract"].as_str() {
                    builder = builder.abstract_text(text);
                }
                if let Some(year) = publication["year"].as_i64() {
                    builder = builder.year(year as i32);
                }
                if let Some(authors) = publication["authors"].as_array() {
                    builder = builder.authors(authors.iter().map(person_name));
                }
                if let Some(journal) = publication["journal"]["title"].as_str() {
                    builder = builder.journal(journal);
                }
                if let Some(citations) = publication["times_cited"].as_u64() {
                    builder = builder.citations(citations as u32);
                }

                builder.build()
            })
            .collect()
    }
}

#[async_trait]
impl Source for DimensionsSource {
    fn id(&self) -> &str {
        "dimensions"
    }

    fn name(&self) -> &str {
        "Dimensions"
    }

    fn family(&self) -> SourceFamily {
        SourceFamily::CitationDatabase
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::SEARCH
    }

    fn available(&self) -> bool {
        self.api_key.is_some()
    }

    async fn search(&self, request: &SearchRequest) -> Result<Vec<PaperRecord>, SourceError> {
        let token = self.token().await?.to_string();
        let dsl = Self::build_dsl(request);

        let body = with_retry(api_retry_config(), || {
            let token = token.clone();
            let dsl = dsl.clone();
            async move {
                let response = self
                    .client
                    .post(&format!("{}/dsl.json", self.base_url))
                    .header("Authorization", &format!("JWT {token}"))
                    .body(dsl)
                    .send()
                    .await
                    .map_err(|e| SourceError::Network(format!("Dimensions: {e}")))?;

                if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
                    return Err(SourceError::RateLimit);
                }
                if !response.status().is_success() {
                    return Err(SourceError::Api(format!(
                        "Dimensions returned HTTP {}",
                        response.status()
                    )));
                }

                response
                    .json::<serde_json::Value>()
                    .await
                    .map_err(|e| SourceError::Parse(format!("Dimensions: {e}")))
            }
        })
        .await?;

        Ok(finalize_records(
            Self::project(&body),
            self.id(),
            request.max_results,
        ))
    }
}

// ===== Lens =====

#[derive(Debug)]
pub struct LensSource {
    client: HttpClient,
    base_url: String,
    api_key: Option<String>,
}

impl LensSource {
    pub fn new(api_key: Option<String>) -> Result<Self, SourceError> {
        Ok(Self {
            client: HttpClient::per_minute(LENS_RPM, None)?,
            base_url: "https://api.lens.org/scholarly/search".to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        })
    }

    /// Point the adapter at a different endpoint (tests).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    fn build_body(request: &SearchRequest) -> serde_json::Value {
        let mut must = vec![serde_json::json!({
            "query_string": { "query": request.query }
        })];
        if request.year_start.is_some() || request.year_end.is_some() {
            let mut range = serde_json::Map::new();
            if let Some(start) = request.year_start {
                range.insert("gte".to_string(), start.into());
            }
            if let Some(end) = request.year_end {
                range.insert("lte".to_string(), end.into());
            }
            must.push(serde_json::json!({ "range": { "year_published": range } }));
        }
        serde_json::json!({
            "query": { "bool": { "must": must } },
            "size": request.max_results.min(100)
        })
    }

    fn project(body: &serde_json::Value) -> Vec<PaperRecord> {
        let Some(data) = body["data"].as_array() else {
            return Vec::new();
        };

        data.iter()
            .map(|work| {
                let title = work["title"].as_str().unwrap_or_default();
                let mut builder = RecordBuilder::new(title, "lens");

                if let Some(ids) = work["external_ids"].as_array() {
                    for id in ids {
                        match id["type"].as_str() {
                            Some("doi") => {
                                if let Some(value) = id["value"].as_str() {
                                    builder = builder.doi(value);
                                }
                            }
                            Some("pmid") => {
                                if let Some(value) = id["value"].as_str() {
                                    builder = builder.pmid(value);
                                }
                            }
                            _ => {}
                        }
                    }
                }
                if let Some(text) = work["abstract"].as_str() {
                    builder = builder.abstract_text(text);
                }
                if let Some(year) = work["year_published"].as_i64() {
                    builder = builder.year(year as i32);
                }
                if let Some(authors) = work["authors"].as_array() {
                    builder = builder.authors(authors.iter().map(person_name));
                }
                if let Some(journal) = work["source"]["title"].as_str() {
                    builder = builder.journal(journal);
                }
                if let Some(publisher) = work["source"]["publisher"].as_str() {
                    builder = builder.publisher(publisher);
                }
                if let Some(citations) = work["scholarly_citations_count"].as_u64() {
                    builder = builder.citations(citations as u32);
                }

                builder.build()
            })
            .collect()
    }
}

#[async_trait]
impl Source for LensSource {
    fn id(&self) -> &str {
        "lens"
    }

    fn name(&self) -> &str {
        "Lens"
    }

    fn family(&self) -> SourceFamily {
        SourceFamily::CitationDatabase
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::SEARCH
    }

    fn available(&self) -> bool {
        self.api_key.is_some()
    }

    async fn search(&self, request: &SearchRequest) -> Result<Vec<PaperRecord>, SourceError> {
        let key = self
            .api_key
            .clone()
            .ok_or_else(|| SourceError::MissingCredential("LENS_API_KEY".to_string()))?;
        let body = Self::build_body(request);

        let response_body = with_retry(api_retry_config(), || {
            let key = key.clone();
            let body = body.clone();
            async move {
                let response = self
                    .client
                    .post(&self.base_url)
                    .bearer_auth(key)
                    .json(&body)
                    .send()
                    .await
                    .map_err(|e| SourceError::Network(format!("Lens: {e}")))?;

                if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
                    return Err(SourceError::RateLimit);
                }
                if !response.status().is_success() {
                    return Err(SourceError::Api(format!(
                        "Lens returned HTTP {}",
                        response.status()
                    )));
                }

                response
                    .json::<serde_json::Value>()
                    .await
                    .map_err(|e| SourceError::Parse(format!("Lens: {e}")))
            }
        })
        .await?;

        Ok(finalize_records(
            Self::project(&response_body),
            self.id(),
            request.max_results,
        ))
    }
}

/// "first_name/last_name" author objects used by both providers.
fn person_name(author: &serde_json::Value) -> String {
    let first = author["first_name"].as_str().unwrap_or_default();
    let last = author["last_name"].as_str().unwrap_or_default();
    match (first.is_empty(), last.is_empty()) {
        (false, false) => format!("{first} {last}"),
        (true, false) => last.to_string(),
        (false, true) => first.to_string(),
        (true, true) => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_dsl() {
        let dsl = DimensionsSource::build_dsl(
            &SearchRequest::new("machine \"learning\"")
                .max_results(10)
                .years(Some(2018), Some(2022)),
        );
        assert!(dsl.starts_with("search publications for \"machine \\\"learning\\\"\""));
        assert!(dsl.contains("where year in [2018:2022]"));
        assert!(dsl.ends_with("limit 10"));
    }

    #[test]
    fn test_dimensions_project() {
        let body: serde_json::Value = serde_json::from_str(
            r#"{"publications":[{
                "title":"Grant-funded widgets",
                "doi":"10.1/dim",
                "abstract":"Widgets.",
                "year":2020,
                "authors":[{"first_name":"Ana","last_name":"Diaz"}],
                "journal":{"title":"Widgetology"},
                "times_cited":12
            }]}"#,
        )
        .unwrap();

        let records = DimensionsSource::project(&body);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].authors, vec!["Ana Diaz"]);
        assert_eq!(records[0].citations, Some(12));
    }

    #[test]
    fn test_lens_body_and_project() {
        let body = LensSource::build_body(&SearchRequest::new("q").years(Some(2019), None));
        assert_eq!(body["size"], 100);
        assert_eq!(body["query"]["bool"]["must"][1]["range"]["year_published"]["gte"], 2019);

        let response: serde_json::Value = serde_json::from_str(
            r#"{"data":[{
                "title":"Lens of science",
                "external_ids":[{"type":"doi","value":"10.1/lens"},{"type":"pmid","value":"77"}],
                "year_published":2021,
                "authors":[{"first_name":"Li","last_name":"Wei"}],
                "source":{"title":"Scientometrics","publisher":"Springer"},
                "scholarly_citations_count":9
            }]}"#,
        )
        .unwrap();

        let records = LensSource::project(&response);
        assert_eq!(records[0].doi.as_deref(), Some("10.1/lens"));
        assert_eq!(records[0].pmid.as_deref(), Some("77"));
        assert_eq!(records[0].publisher.as_deref(), Some("Springer"));
    }

    #[test]
    fn test_key_gating() {
        assert!(!DimensionsSource::new(None).unwrap().available());
        assert!(DimensionsSource::new(Some("k".into())).unwrap().available());
        assert!(!LensSource::new(Some("  ".into())).unwrap().available());
    }

    #[tokio::test]
    async fn test_dimensions_auth_then_search() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/auth.json")
            .with_status(200)
            .with_body(r#"{"token":"jwt-token"}"#)
            .create_async()
            .await;
        server
            .mock("POST", "/dsl.json")
            .match_header("authorization", "JWT jwt-token")
            .with_status(200)
            .with_body(r#"{"publications":[{"title":"From DSL","year":2022}]}"#)
            .create_async()
            .await;

        let source = DimensionsSource::new(Some("key".into()))
            .unwrap()
            .with_base_url(server.url());

        let records = source.search(&SearchRequest::new("dsl")).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].primary_source, "dimensions");
    }
}
