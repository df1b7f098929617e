use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub discogs: DiscogsConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub fetcher: FetcherConfig,
}

/// Discogs API access
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DiscogsConfig {
    /// Personal access token. Also read from `DISCOGS_TOKEN`.
    #[serde(default)]
    pub token: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Currency requested for marketplace prices (ISO 4217).
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for DiscogsConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            user_agent: default_user_agent(),
            base_url: default_base_url(),
            currency: default_currency(),
            timeout_secs: default_timeout(),
        }
    }
}

fn default_user_agent() -> String {
    format!("sellorder/{}", env!("CARGO_PKG_VERSION"))
}

fn default_base_url() -> String {
    "https://api.discogs.com".to_string()
}

fn default_currency() -> String {
    "USD".to_string()
}

fn default_timeout() -> u64 {
    30
}

/// Request pacing and retry behaviour.
///
/// Authenticated Discogs clients get 60 requests per minute; the default
/// spacing of 1050ms keeps us at roughly 57.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_min_interval")]
    pub min_interval_ms: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_backoff")]
    pub base_backoff_ms: u64,
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            min_interval_ms: default_min_interval(),
            max_attempts: default_max_attempts(),
            base_backoff_ms: default_base_backoff(),
            max_backoff_ms: default_max_backoff(),
        }
    }
}

impl RateLimitConfig {
    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }

    /// Approximate sustained request rate.
    pub fn requests_per_minute(&self) -> f64 {
        if self.min_interval_ms == 0 {
            return f64::INFINITY;
        }
        60_000.0 / self.min_interval_ms as f64
    }
}

fn default_min_interval() -> u64 {
    1050
}

fn default_max_attempts() -> u32 {
    5
}

fn default_base_backoff() -> u64 {
    1000
}

fn default_max_backoff() -> u64 {
    60_000
}

/// Signal cache configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,
    #[serde(default = "default_cache_path")]
    pub path: PathBuf,
    /// TTL for marketplace snapshots. 0 always refetches.
    #[serde(default = "default_marketplace_ttl")]
    pub marketplace_ttl_secs: u64,
    /// TTL for release demand data. 0 always refetches.
    #[serde(default = "default_release_ttl")]
    pub release_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            path: default_cache_path(),
            marketplace_ttl_secs: default_marketplace_ttl(),
            release_ttl_secs: default_release_ttl(),
        }
    }
}

fn default_cache_enabled() -> bool {
    true
}

fn default_cache_path() -> PathBuf {
    PathBuf::from("sellorder-cache.db")
}

fn default_marketplace_ttl() -> u64 {
    24 * 60 * 60
}

fn default_release_ttl() -> u64 {
    14 * 24 * 60 * 60
}

/// Worker pool for remote fetches
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FetcherConfig {
    #[serde(default = "default_workers")]
    pub workers: usize,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
        }
    }
}

fn default_workers() -> usize {
    4
}

/// Config with the token redacted, for logging.
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub discogs: SanitizedDiscogsConfig,
    pub rate_limit: RateLimitConfig,
    pub cache: CacheConfig,
    pub fetcher: FetcherConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedDiscogsConfig {
    pub token_configured: bool,
    pub user_agent: String,
    pub base_url: String,
    pub currency: String,
    pub timeout_secs: u64,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            discogs: SanitizedDiscogsConfig {
                token_configured: !config.discogs.token.is_empty(),
                user_agent: config.discogs.user_agent.clone(),
                base_url: config.discogs.base_url.clone(),
                currency: config.discogs.currency.clone(),
                timeout_secs: config.discogs.timeout_secs,
            },
            rate_limit: config.rate_limit.clone(),
            cache: config.cache.clone(),
            fetcher: config.fetcher.clone(),
        }
    }
}
