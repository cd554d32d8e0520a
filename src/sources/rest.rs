//! Descriptor-driven template for REST-style JSON providers.
//!
//! Most scholarly APIs differ only in endpoint, parameter names, auth
//! placement, rate budget, and response shape. One [`RestSource`]
//! drives all of them from a [`RestDescriptor`] plus a projection
//! function that maps the provider's JSON into [`PaperRecord`]s.

use async_trait::async_trait;

use crate::models::{PaperRecord, SearchRequest};
use crate::sources::{finalize_records, Source, SourceError, SourceFamily};
use crate::sources::registry::SourceCapabilities;
use crate::utils::{api_retry_config, with_retry, HttpClient};

/// Where a provider expects its API key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStyle {
    /// No credential required.
    None,
    /// Key sent as a query parameter with the given name.
    QueryParam(&'static str),
    /// Key sent as a request header with the given name.
    Header(&'static str),
    /// Key sent as an OAuth-style bearer token.
    Bearer,
}

/// Map a provider JSON body to records. The template caps and
/// finalizes the output, so projections just translate shapes.
pub type Projection = fn(&serde_json::Value) -> Vec<PaperRecord>;

/// Everything that distinguishes one REST provider from another.
#[derive(Debug, Clone)]
pub struct RestDescriptor {
    pub id: &'static str,
    pub name: &'static str,
    pub family: SourceFamily,
    pub base_url: &'static str,
    /// Name of the free-text query parameter.
    pub query_param: &'static str,
    /// Wrapper applied to the query text for providers with a fielded
    /// syntax, e.g. `TS=({})`. `{}` is replaced by the query.
    pub query_template: Option<&'static str>,
    /// Name of the page-size parameter, if the provider has one.
    pub page_param: Option<&'static str>,
    /// Hard page-size cap imposed by the provider.
    pub max_page_size: usize,
    /// Constant parameters sent with every request.
    pub extra_params: &'static [(&'static str, &'static str)],
    /// Parameter carrying the polite-pool contact email, if supported.
    pub mailto_param: Option<&'static str>,
    /// Server-side publisher filter parameter, if supported.
    pub publisher_param: Option<&'static str>,
    /// Translate a year window into provider filter parameters.
    pub year_params: Option<fn(Option<i32>, Option<i32>) -> Vec<(String, String)>>,
    pub auth: AuthStyle,
    /// Whether the adapter is unusable without a key.
    pub requires_key: bool,
    /// Permitted requests per minute.
    pub rpm: u32,
    pub project: Projection,
}

/// A REST provider instantiated from its descriptor.
#[derive(Debug)]
pub struct RestSource {
    descriptor: RestDescriptor,
    base_url: String,
    client: HttpClient,
    api_key: Option<String>,
    contact_email: Option<String>,
}

impl RestSource {
    pub fn new(
        descriptor: RestDescriptor,
        api_key: Option<String>,
        contact_email: Option<&str>,
    ) -> Result<Self, SourceError> {
        let client = HttpClient::per_minute(descriptor.rpm, contact_email)?;
        Ok(Self {
            base_url: descriptor.base_url.to_string(),
            descriptor,
            client,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            contact_email: contact_email.map(str::to_string),
        })
    }

    /// Point the adapter at a different endpoint (tests).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    async fn fetch(
        &self,
        request: &SearchRequest,
        publisher: Option<&str>,
    ) -> Result<Vec<PaperRecord>, SourceError> {
        let d = &self.descriptor;
        let query_text = match d.query_template {
            Some(template) => template.replace("{}", &request.query),
            None => request.query.clone(),
        };
        let mut params: Vec<(String, String)> = vec![(d.query_param.to_string(), query_text)];

        if let Some(page) = d.page_param {
            let size = request.max_results.min(d.max_page_size);
            params.push((page.to_string(), size.to_string()));
        }
        for (key, value) in d.extra_params {
            params.push((key.to_string(), value.to_string()));
        }
        if let Some(year_params) = d.year_params {
            params.extend(year_params(request.year_start, request.year_end));
        }
        if let (Some(name), Some(email)) = (d.mailto_param, self.contact_email.as_deref()) {
            params.push((name.to_string(), email.to_string()));
        }
        if let (Some(name), Some(publisher)) = (d.publisher_param, publisher) {
            params.push((name.to_string(), publisher.to_string()));
        }
        if let (AuthStyle::QueryParam(name), Some(key)) = (d.auth, self.api_key.as_deref()) {
            params.push((name.to_string(), key.to_string()));
        }

        let body = with_retry(api_retry_config(), || {
            let params = params.clone();
            async move {
                let mut builder = self.client.get(&self.base_url).query(&params);
                match (d.auth, self.api_key.as_deref()) {
                    (AuthStyle::Header(name), Some(key)) => builder = builder.header(name, key),
                    (AuthStyle::Bearer, Some(key)) => builder = builder.bearer_auth(key),
                    _ => {}
                }

                let response = builder.send().await.map_err(|e| {
                    SourceError::Network(format!("{} request failed: {e}", d.name))
                })?;

                if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
                    return Err(SourceError::RateLimit);
                }
                if !response.status().is_success() {
                    return Err(SourceError::Api(format!(
                        "{} returned HTTP {}",
                        d.name,
                        response.status()
                    )));
                }

                response
                    .json::<serde_json::Value>()
                    .await
                    .map_err(|e| SourceError::Parse(format!("{}: {e}", d.name)))
            }
        })
        .await?;

        let records = (d.project)(&body);
        Ok(finalize_records(records, d.id, request.max_results))
    }
}

#[async_trait]
impl Source for RestSource {
    fn id(&self) -> &str {
        self.descriptor.id
    }

    fn name(&self) -> &str {
        self.descriptor.name
    }

    fn family(&self) -> SourceFamily {
        self.descriptor.family
    }

    fn capabilities(&self) -> SourceCapabilities {
        let mut caps = SourceCapabilities::SEARCH;
        if self.descriptor.publisher_param.is_some() {
            caps |= SourceCapabilities::PUBLISHER_FILTER;
        }
        caps
    }

    fn available(&self) -> bool {
        !self.descriptor.requires_key || self.api_key.is_some()
    }

    async fn search(&self, request: &SearchRequest) -> Result<Vec<PaperRecord>, SourceError> {
        self.fetch(request, None).await
    }

    async fn search_by_publisher(
        &self,
        request: &SearchRequest,
        publisher: &str,
    ) -> Result<Vec<PaperRecord>, SourceError> {
        if self.descriptor.publisher_param.is_some() {
            self.fetch(request, Some(publisher)).await
        } else {
            self.fetch(request, None).await
        }
    }
}
