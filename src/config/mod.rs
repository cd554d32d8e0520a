//! Configuration, read once at startup and immutable afterwards.
//!
//! Settings layer an optional `litscout.toml` file beneath process
//! environment variables; the environment always wins. Credentials are
//! plain presence/absence switches: a missing key silently omits the
//! corresponding adapter from the registry.

use serde::Deserialize;

/// Default cap on records requested from one adapter.
const DEFAULT_MAX_PER_SOURCE: usize = 100;
/// Default global search deadline.
const DEFAULT_SEARCH_TIMEOUT_SECS: u64 = 120;
/// Default fan-out worker pool size.
const DEFAULT_WORKERS: usize = 10;

/// Runtime settings for one process.
#[derive(Debug, Clone)]
pub struct Settings {
    /// NCBI E-utilities key; raises PubMed from 3/s to 10/s.
    pub ncbi_api_key: Option<String>,

    /// Contact email passed to polite-pool APIs (CrossRef, OpenAlex,
    /// Unpaywall). Coalesced from NCBI_EMAIL / UNPAYWALL_EMAIL /
    /// RESEARCHER_EMAIL.
    pub contact_email: Option<String>,

    pub semantic_scholar_api_key: Option<String>,
    pub core_api_key: Option<String>,
    pub springer_api_key: Option<String>,
    pub ieee_api_key: Option<String>,
    pub elsevier_api_key: Option<String>,
    pub scopus_api_key: Option<String>,
    pub wos_api_key: Option<String>,
    pub dimensions_api_key: Option<String>,
    pub lens_api_key: Option<String>,
    pub serpapi_key: Option<String>,

    /// Explicit opt-in for scraping Google Scholar without SerpAPI.
    pub google_scholar_enabled: bool,

    /// Opt-in paywall-bypass fallback in the full-text resolver.
    pub enable_scihub: bool,

    pub max_papers_per_source: usize,
    pub search_timeout_secs: u64,
    pub workers: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ncbi_api_key: None,
            contact_email: None,
            semantic_scholar_api_key: None,
            core_api_key: None,
            springer_api_key: None,
            ieee_api_key: None,
            elsevier_api_key: None,
            scopus_api_key: None,
            wos_api_key: None,
            dimensions_api_key: None,
            lens_api_key: None,
            serpapi_key: None,
            google_scholar_enabled: false,
            enable_scihub: false,
            max_papers_per_source: DEFAULT_MAX_PER_SOURCE,
            search_timeout_secs: DEFAULT_SEARCH_TIMEOUT_SECS,
            workers: DEFAULT_WORKERS,
        }
    }
}

/// File-backed subset of the settings, `litscout.toml`.
#[derive(Debug, Clone, Deserialize, Default)]
struct FileSettings {
    ncbi_api_key: Option<String>,
    contact_email: Option<String>,
    semantic_scholar_api_key: Option<String>,
    core_api_key: Option<String>,
    springer_api_key: Option<String>,
    ieee_api_key: Option<String>,
    elsevier_api_key: Option<String>,
    scopus_api_key: Option<String>,
    wos_api_key: Option<String>,
    dimensions_api_key: Option<String>,
    lens_api_key: Option<String>,
    serpapi_key: Option<String>,
    google_scholar_enabled: Option<bool>,
    enable_scihub: Option<bool>,
    max_papers_per_source: Option<usize>,
    search_timeout_secs: Option<u64>,
    workers: Option<usize>,
}

impl Settings {
    /// Load the optional config file, then let the environment
    /// override it.
    pub fn load() -> Self {
        let file = config::Config::builder()
            .add_source(config::File::with_name("litscout").required(false))
            .build()
            .and_then(|file| file.try_deserialize::<FileSettings>())
            .unwrap_or_else(|error| {
                tracing::warn!(%error, "config file ignored");
                FileSettings::default()
            });

        Self::from_file_and_env(file)
    }

    /// Environment only; used where a config file must not interfere.
    pub fn from_env() -> Self {
        Self::from_file_and_env(FileSettings::default())
    }

    fn from_file_and_env(file: FileSettings) -> Self {
        let defaults = Settings::default();
        Self {
            ncbi_api_key: env_var("NCBI_API_KEY").or(file.ncbi_api_key),
            contact_email: env_var("NCBI_EMAIL")
                .or_else(|| env_var("UNPAYWALL_EMAIL"))
                .or_else(|| env_var("RESEARCHER_EMAIL"))
                .or(file.contact_email),
            semantic_scholar_api_key: env_var("SEMANTIC_SCHOLAR_API_KEY")
                .or(file.semantic_scholar_api_key),
            core_api_key: env_var("CORE_API_KEY").or(file.core_api_key),
            springer_api_key: env_var("SPRINGER_API_KEY").or(file.springer_api_key),
            ieee_api_key: env_var("IEEE_API_KEY").or(file.ieee_api_key),
            elsevier_api_key: env_var("ELSEVIER_API_KEY").or(file.elsevier_api_key),
            scopus_api_key: env_var("SCOPUS_API_KEY").or(file.scopus_api_key),
            wos_api_key: env_var("WOS_API_KEY").or(file.wos_api_key),
            dimensions_api_key: env_var("DIMENSIONS_API_KEY").or(file.dimensions_api_key),
            lens_api_key: env_var("LENS_API_KEY").or(file.lens_api_key),
            serpapi_key: env_var("SERPAPI_KEY").or(file.serpapi_key),
            google_scholar_enabled: env_flag("GOOGLE_SCHOLAR_ENABLED")
                .or(file.google_scholar_enabled)
                .unwrap_or(false),
            enable_scihub: env_flag("ENABLE_SCIHUB")
                .or(file.enable_scihub)
                .unwrap_or(false),
            max_papers_per_source: env_parse("MAX_PAPERS_PER_SOURCE")
                .or(file.max_papers_per_source)
                .unwrap_or(defaults.max_papers_per_source),
            search_timeout_secs: env_parse("LITSCOUT_SEARCH_TIMEOUT_SECS")
                .or(file.search_timeout_secs)
                .unwrap_or(defaults.search_timeout_secs),
            workers: env_parse("LITSCOUT_WORKERS")
                .or(file.workers)
                .unwrap_or(defaults.workers)
                .max(1),
        }
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_flag(name: &str) -> Option<bool> {
    env_var(name).map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    env_var(name).and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Mutex, OnceLock};

    // Env-var tests share process state; serialize them.
    fn env_lock() -> &'static Mutex<()> {
        static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        LOCK.get_or_init(|| Mutex::new(()))
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.max_papers_per_source, 100);
        assert_eq!(settings.search_timeout_secs, 120);
        assert_eq!(settings.workers, 10);
        assert!(!settings.enable_scihub);
    }

    #[test]
    fn test_env_overrides() {
        let _guard = env_lock().lock().unwrap();
        std::env::set_var("SEMANTIC_SCHOLAR_API_KEY", "sskey");
        std::env::set_var("MAX_PAPERS_PER_SOURCE", "25");
        std::env::set_var("ENABLE_SCIHUB", "true");
        std::env::set_var("UNPAYWALL_EMAIL", "lab@example.org");

        let settings = Settings::from_env();
        assert_eq!(settings.semantic_scholar_api_key.as_deref(), Some("sskey"));
        assert_eq!(settings.max_papers_per_source, 25);
        assert!(settings.enable_scihub);
        assert_eq!(settings.contact_email.as_deref(), Some("lab@example.org"));

        std::env::remove_var("SEMANTIC_SCHOLAR_API_KEY");
        std::env::remove_var("MAX_PAPERS_PER_SOURCE");
        std::env::remove_var("ENABLE_SCIHUB");
        std::env::remove_var("UNPAYWALL_EMAIL");
    }

    #[test]
    fn test_blank_env_is_absent() {
        let _guard = env_lock().lock().unwrap();
        std::env::set_var("CORE_API_KEY", "   ");
        let settings = Settings::from_env();
        assert!(settings.core_api_key.is_none());
        std::env::remove_var("CORE_API_KEY");
    }

    #[test]
    fn test_workers_floor() {
        let _guard = env_lock().lock().unwrap();
        std::env::set_var("LITSCOUT_WORKERS", "0");
        let settings = Settings::from_env();
        assert_eq!(settings.workers, 1);
        std::env::remove_var("LITSCOUT_WORKERS");
    }
}
