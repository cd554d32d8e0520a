//! Open-access full-text resolution.
//!
//! Locates a readable URL for a record by walking a fixed priority
//! chain: an already-known PDF, a constructed arXiv link, PubMed
//! Central, Unpaywall, and (only when explicitly enabled) a
//! paywall-bypass fallback. The resolver never mutates records; the
//! orchestrator writes results back.

use crate::config::Settings;
use crate::models::{AccessType, PaperRecord};
use crate::sources::SourceError;
use crate::utils::HttpClient;

/// Conservative shared budget across the PMC and Unpaywall lookups.
const RESOLVER_RPM: u32 = 120;

/// Outcome of one resolution attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FullTextResult {
    pub found: bool,
    pub url: Option<String>,
    pub access: AccessType,
}

impl FullTextResult {
    fn not_found() -> Self {
        Self {
            found: false,
            url: None,
            access: AccessType::Unknown,
        }
    }

    fn open(url: String) -> Self {
        Self {
            found: true,
            url: Some(url),
            access: AccessType::Open,
        }
    }
}

#[derive(Debug)]
pub struct FullTextResolver {
    client: HttpClient,
    email: Option<String>,
    enable_scihub: bool,
    pmc_idconv_url: String,
    unpaywall_url: String,
}

impl FullTextResolver {
    pub fn new(settings: &Settings) -> Result<Self, SourceError> {
        Ok(Self {
            client: HttpClient::per_minute(RESOLVER_RPM, settings.contact_email.as_deref())?,
            email: settings.contact_email.clone(),
            enable_scihub: settings.enable_scihub,
            pmc_idconv_url: "https://www.ncbi.nlm.nih.gov/pmc/utils/idconv/v1.0/".to_string(),
            unpaywall_url: "https://api.unpaywall.org/v2".to_string(),
        })
    }

    /// Point the resolver at different endpoints (tests).
    pub fn with_urls(mut self, pmc: impl Into<String>, unpaywall: impl Into<String>) -> Self {
        self.pmc_idconv_url = pmc.into();
        self.unpaywall_url = unpaywall.into();
        self
    }

    /// Walk the priority chain for one record.
    pub async fn resolve(&self, record: &PaperRecord) -> FullTextResult {
        // 1. A PDF the fan-out already found.
        if let Some(url) = &record.pdf_url {
            return FullTextResult {
                found: true,
                url: Some(url.clone()),
                access: if record.access == AccessType::Paywalled {
                    AccessType::Paywalled
                } else {
                    AccessType::Open
                },
            };
        }

        // 2. arXiv URLs are derivable without a lookup.
        if let Some(arxiv_id) = &record.arxiv_id {
            return FullTextResult::open(format!("https://arxiv.org/pdf/{arxiv_id}.pdf"));
        }

        // 3. PubMed Central, by PMID.
        if let Some(pmid) = &record.pmid {
            match self.lookup_pmc(pmid).await {
                Ok(Some(url)) => return FullTextResult::open(url),
                Ok(None) => {}
                Err(error) => tracing::debug!(%error, pmid, "PMC lookup failed"),
            }
        }

        // 4. Unpaywall, by DOI; requires a polite-pool email.
        if let (Some(doi), Some(_)) = (&record.doi, &self.email) {
            match self.lookup_unpaywall(doi).await {
                Ok(Some(url)) => return FullTextResult::open(url),
                Ok(None) => {}
                Err(error) => tracing::debug!(%error, doi, "Unpaywall lookup failed"),
            }
        }

        // 5. Paywall bypass, only on explicit opt-in.
        if self.enable_scihub {
            if let Some(doi) = &record.doi {
                return FullTextResult {
                    found: true,
                    url: Some(format!("https://sci-hub.se/{doi}")),
                    access: AccessType::Paywalled,
                };
            }
        }

        FullTextResult::not_found()
    }

    async fn lookup_pmc(&self, pmid: &str) -> Result<Option<String>, SourceError> {
        let url = format!(
            "{}?ids={}&format=json",
            self.pmc_idconv_url,
            urlencoding::encode(pmid)
        );
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SourceError::Network(format!("PMC idconv: {e}")))?;
        if !response.status().is_success() {
            return Err(SourceError::Api(format!(
                "PMC idconv returned HTTP {}",
                response.status()
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| SourceError::Parse(format!("PMC idconv: {e}")))?;

        Ok(body["records"][0]["pmcid"].as_str().map(|pmcid| {
            format!("https://www.ncbi.nlm.nih.gov/pmc/articles/{pmcid}/pdf/")
        }))
    }

    async fn lookup_unpaywall(&self, doi: &str) -> Result<Option<String>, SourceError> {
        let email = self.email.as_deref().unwrap_or_default();
        let url = format!(
            "{}/{}?email={}",
            self.unpaywall_url,
            urlencoding::encode(doi),
            urlencoding::encode(email)
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SourceError::Network(format!("Unpaywall: {e}")))?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(SourceError::Api(format!(
                "Unpaywall returned HTTP {}",
                response.status()
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| SourceError::Parse(format!("Unpaywall: {e}")))?;

        Ok(body["best_oa_location"]["url_for_pdf"]
            .as_str()
            .or_else(|| body["best_oa_location"]["url"].as_str())
            .map(str::to_string))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RecordBuilder;

    fn settings_with_email() -> Settings {
        Settings {
            contact_email: Some("lab@example.org".into()),
            ..Settings::default()
        }
    }

    #[tokio::test]
    async fn test_existing_pdf_wins() {
        let resolver = FullTextResolver::new(&settings_with_email()).unwrap();
        let record = RecordBuilder::new("T", "s")
            .pdf_url("https://host/x.pdf")
            .arxiv_id("2301.1")
            .build();

        let result = resolver.resolve(&record).await;
        assert!(result.found);
        assert_eq!(result.url.as_deref(), Some("https://host/x.pdf"));
    }

    #[tokio::test]
    async fn test_arxiv_url_is_constructed() {
        let resolver = FullTextResolver::new(&settings_with_email()).unwrap();
        let record = RecordBuilder::new("T", "s").arxiv_id("2301.00001").build();

        let result = resolver.resolve(&record).await;
        assert_eq!(
            result.url.as_deref(),
            Some("https://arxiv.org/pdf/2301.00001.pdf")
        );
        assert_eq!(result.access, AccessType::Open);
    }

    #[tokio::test]
    async fn test_pmc_lookup() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", mockito::Matcher::Any)
            .with_status(200)
            .with_body(r#"{"records":[{"pmcid":"PMC123456"}]}"#)
            .create_async()
            .await;

        let resolver = FullTextResolver::new(&settings_with_email())
            .unwrap()
            .with_urls(server.url(), server.url());
        let record = RecordBuilder::new("T", "s").pmid("31999999").build();

        let result = resolver.resolve(&record).await;
        assert!(result.found);
        assert!(result.url.unwrap().contains("PMC123456"));
    }

    #[tokio::test]
    async fn test_unpaywall_lookup() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", mockito::Matcher::Any)
            .with_status(200)
            .with_body(r#"{"best_oa_location":{"url_for_pdf":"https://repo/x.pdf"}}"#)
            .create_async()
            .await;

        let resolver = FullTextResolver::new(&settings_with_email())
            .unwrap()
            .with_urls(server.url(), server.url());
        let record = RecordBuilder::new("T", "s").doi("10.1/x").build();

        let result = resolver.resolve(&record).await;
        assert_eq!(result.url.as_deref(), Some("https://repo/x.pdf"));
        assert_eq!(result.access, AccessType::Open);
    }

    #[tokio::test]
    async fn test_unpaywall_requires_email() {
        // No email configured: the Unpaywall rung is skipped entirely
        // and an un-resolvable record comes back not found.
        let resolver = FullTextResolver::new(&Settings::default()).unwrap();
        let record = RecordBuilder::new("T", "s").doi("10.1/x").build();

        let result = resolver.resolve(&record).await;
        assert!(!result.found);
    }

    #[tokio::test]
    async fn test_scihub_only_when_enabled() {
        let settings = Settings {
            enable_scihub: true,
            ..Settings::default()
        };
        let resolver = FullTextResolver::new(&settings).unwrap();
        let record = RecordBuilder::new("T", "s").doi("10.1/x").build();

        let result = resolver.resolve(&record).await;
        assert!(result.found);
        assert!(result.url.unwrap().starts_with("https://sci-hub.se/"));
        assert_eq!(result.access, AccessType::Paywalled);
    }
}
