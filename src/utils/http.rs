//! HTTP client with per-adapter token-bucket rate limiting.

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use nonzero_ext::nonzero;
use reqwest::{header, Client};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use crate::sources::SourceError;

/// Default per-request transport timeout.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Token bucket guarding one adapter's outbound requests.
///
/// Capacity equals the permitted requests per minute; tokens refill
/// continuously at rate/60 per second. [`RateLimit::acquire`] waits for
/// a token, [`RateLimit::try_acquire`] never blocks.
#[derive(Debug)]
pub struct RateLimit {
    limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
}

impl RateLimit {
    /// A bucket refilled `rpm` times per minute. A zero rpm is treated
    /// as one request per minute rather than no limiter at all.
    pub fn per_minute(rpm: u32) -> Self {
        let quota = NonZeroU32::new(rpm).unwrap_or(nonzero!(1u32));
        Self {
            limiter: RateLimiter::direct(Quota::per_minute(quota)),
        }
    }

    /// A bucket refilled `rps` times per second, for providers that
    /// state their budget per second (NCBI E-utilities).
    pub fn per_second(rps: u32) -> Self {
        let quota = NonZeroU32::new(rps).unwrap_or(nonzero!(1u32));
        Self {
            limiter: RateLimiter::direct(Quota::per_second(quota)),
        }
    }

    /// Block until a token is available.
    pub async fn acquire(&self) {
        self.limiter.until_ready().await;
    }

    /// Take a token if one is available right now.
    pub fn try_acquire(&self) -> bool {
        self.limiter.check().is_ok()
    }
}

/// Shared HTTP client, one per adapter, carrying that adapter's rate
/// limit so every request path acquires a token before sending.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Arc<Client>,
    rate_limit: Arc<RateLimit>,
}

/// Request builder that acquires a rate-limit token before sending.
pub struct RateLimitedRequestBuilder {
    inner: reqwest::RequestBuilder,
    rate_limit: Arc<RateLimit>,
}

impl RateLimitedRequestBuilder {
    pub async fn send(self) -> Result<reqwest::Response, reqwest::Error> {
        self.rate_limit.acquire().await;
        self.inner.send().await
    }

    pub fn header<K, V>(mut self, key: K, value: V) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        self.inner = self.inner.header(key.as_ref(), value.as_ref());
        self
    }

    pub fn headers(mut self, headers: header::HeaderMap) -> Self {
        self.inner = self.inner.headers(headers);
        self
    }

    pub fn bearer_auth<T>(self, token: T) -> Self
    where
        T: Into<String> + std::fmt::Display,
    {
        Self {
            inner: self.inner.bearer_auth(token),
            rate_limit: self.rate_limit,
        }
    }

    pub fn query<T: serde::Serialize + ?Sized>(mut self, query: &T) -> Self {
        self.inner = self.inner.query(query);
        self
    }

    pub fn json<T: serde::Serialize + ?Sized>(mut self, json: &T) -> Self {
        self.inner = self.inner.json(json);
        self
    }

    pub fn body(mut self, body: impl Into<reqwest::Body>) -> Self {
        self.inner = self.inner.body(body);
        self
    }
}

/// User agent sent to every provider.
pub fn user_agent(contact_email: Option<&str>) -> String {
    match contact_email {
        Some(email) => format!(
            "{}/{} (mailto:{})",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION"),
            email
        ),
        None => format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
    }
}

impl HttpClient {
    /// Create a client limited to `rpm` requests per minute.
    pub fn per_minute(rpm: u32, contact_email: Option<&str>) -> Result<Self, SourceError> {
        Self::build(RateLimit::per_minute(rpm), contact_email, DEFAULT_TIMEOUT_SECS)
    }

    /// Create a client limited to `rps` requests per second.
    pub fn per_second(rps: u32, contact_email: Option<&str>) -> Result<Self, SourceError> {
        Self::build(RateLimit::per_second(rps), contact_email, DEFAULT_TIMEOUT_SECS)
    }

    /// Create a client with an explicit transport timeout.
    pub fn with_timeout(
        rpm: u32,
        contact_email: Option<&str>,
        timeout_secs: u64,
    ) -> Result<Self, SourceError> {
        Self::build(RateLimit::per_minute(rpm), contact_email, timeout_secs)
    }

    fn build(
        rate_limit: RateLimit,
        contact_email: Option<&str>,
        timeout_secs: u64,
    ) -> Result<Self, SourceError> {
        let client = Client::builder()
            .user_agent(user_agent(contact_email))
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| SourceError::Network(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client: Arc::new(client),
            rate_limit: Arc::new(rate_limit),
        })
    }

    /// The adapter's token bucket, for callers that need to gate work
    /// other than a request built through this client.
    pub fn rate_limit(&self) -> &RateLimit {
        &self.rate_limit
    }

    pub fn get(&self, url: &str) -> RateLimitedRequestBuilder {
        RateLimitedRequestBuilder {
            inner: self.client.get(url),
            rate_limit: Arc::clone(&self.rate_limit),
        }
    }

    pub fn post(&self, url: &str) -> RateLimitedRequestBuilder {
        RateLimitedRequestBuilder {
            inner: self.client.post(url),
            rate_limit: Arc::clone(&self.rate_limit),
        }
    }
}
