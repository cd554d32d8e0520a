//! Retry with exponential backoff, used strictly inside adapters.
//!
//! The orchestrator itself never retries; a failed adapter call yields
//! an empty result. Adapters wrap their own transport round-trips in
//! [`with_retry`] so transient provider hiccups (429s, 5xx, timeouts)
//! get a bounded second chance before the empty list is returned.

use std::time::Duration;
use tokio::time::sleep;

use crate::sources::SourceError;

/// Retry behavior for one adapter call.
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

/// Configuration tuned for public scholarly APIs: one extra attempt,
/// gentler first delay.
pub fn api_retry_config() -> RetryConfig {
    RetryConfig {
        max_attempts: 3,
        initial_delay: Duration::from_secs(1),
        max_delay: Duration::from_secs(30),
        backoff_multiplier: 2.0,
    }
}

/// Whether an error is worth retrying, and the floor delay it asks for.
fn transient_delay(error: &SourceError) -> Option<Duration> {
    match error {
        SourceError::RateLimit => Some(Duration::from_secs(5)),
        SourceError::Network(_) => Some(Duration::from_secs(1)),
        SourceError::Api(message) => {
            let lower = message.to_lowercase();
            if lower.contains("429")
                || lower.contains("too many requests")
                || lower.contains("unavailable")
                || lower.contains("timeout")
                || lower.contains("502")
                || lower.contains("503")
                || lower.contains("504")
            {
                Some(Duration::from_secs(2))
            } else {
                None
            }
        }
        _ => None,
    }
}

/// Run `operation`, retrying transient failures with exponential
/// backoff. Permanent failures (parse errors, bad requests) return
/// immediately.
pub async fn with_retry<T, F, Fut>(config: RetryConfig, mut operation: F) -> Result<T, SourceError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, SourceError>>,
{
    let mut attempt = 0;

    loop {
        attempt += 1;
        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::debug!(attempt, "operation recovered after retry");
                }
                return Ok(value);
            }
            Err(error) => {
                let Some(floor) = transient_delay(&error) else {
                    return Err(error);
                };
                if attempt >= config.max_attempts {
                    tracing::warn!(attempt, %error, "giving up after retries");
                    return Err(error);
                }

                let backoff = config.initial_delay.as_secs_f64()
                    * config.backoff_multiplier.powi(attempt as i32 - 1);
                let delay = Duration::from_secs_f64(backoff.min(config.max_delay.as_secs_f64()))
                    .max(floor);

                tracing::debug!(attempt, ?delay, %error, "transient failure, retrying");
                sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast_config() -> RetryConfig {
        RetryConfig {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            backoff_multiplier: 2.0,
        }
    }

    #[tokio::test]
    async fn test_success_first_attempt() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls2 = Arc::clone(&calls);
        let result = with_retry(fast_config(), move || {
            let calls = Arc::clone(&calls2);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, SourceError>("ok")
            }
        })
        .await;

        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_recovers_from_transient() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls2 = Arc::clone(&calls);
        let result = with_retry(fast_config(), move || {
            let calls = Arc::clone(&calls2);
            async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(SourceError::Network("flaky".into()))
                } else {
                    Ok("ok")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls2 = Arc::clone(&calls);
        let result: Result<(), _> = with_retry(fast_config(), move || {
            let calls = Arc::clone(&calls2);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(SourceError::Parse("bad json".into()))
            }
        })
        .await;

        assert!(matches!(result, Err(SourceError::Parse(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exhausts_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls2 = Arc::clone(&calls);
        let result: Result<(), _> = with_retry(fast_config(), move || {
            let calls = Arc::clone(&calls2);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(SourceError::Network("down".into()))
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_transient_classification() {
        assert!(transient_delay(&SourceError::RateLimit).is_some());
        assert!(transient_delay(&SourceError::Network("x".into())).is_some());
        assert!(transient_delay(&SourceError::Api("HTTP 503 unavailable".into())).is_some());
        assert!(transient_delay(&SourceError::Api("HTTP 404".into())).is_none());
        assert!(transient_delay(&SourceError::Parse("x".into())).is_none());
    }
}
