//! Types for the signal cache.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::CacheConfig;

/// Cache namespace. Each namespace has its own TTL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Namespace {
    /// Release demand data (want/have counts, sellability). Long cycle.
    Release,
    /// Marketplace snapshot (listing count, lowest price). Short cycle.
    Marketplace,
}

impl Namespace {
    pub const ALL: [Namespace; 2] = [Namespace::Release, Namespace::Marketplace];

    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::Release => "release",
            Namespace::Marketplace => "marketplace",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored payload and when it was fetched.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub payload: serde_json::Value,
    pub fetched_at: DateTime<Utc>,
}

/// Result of a cache read: the entry plus whether it is still within its TTL.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheLookup {
    pub payload: serde_json::Value,
    pub fetched_at: DateTime<Utc>,
    pub fresh: bool,
}

impl CacheLookup {
    /// Decode the payload into a typed value.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, CacheError> {
        serde_json::from_value(self.payload.clone())
            .map_err(|e| CacheError::Serialization(e.to_string()))
    }
}

/// A decoded cache hit.
#[derive(Debug, Clone, PartialEq)]
pub struct Cached<T> {
    pub value: T,
    pub fetched_at: DateTime<Utc>,
    pub fresh: bool,
}

/// TTL per namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreshnessPolicy {
    pub release_ttl: Duration,
    pub marketplace_ttl: Duration,
}

impl FreshnessPolicy {
    pub fn new(release_ttl: Duration, marketplace_ttl: Duration) -> Self {
        Self {
            release_ttl,
            marketplace_ttl,
        }
    }

    pub fn from_secs(release_ttl_secs: u64, marketplace_ttl_secs: u64) -> Self {
        Self::new(
            Duration::from_secs(release_ttl_secs),
            Duration::from_secs(marketplace_ttl_secs),
        )
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::from_secs(config.release_ttl_secs, config.marketplace_ttl_secs)
    }

    pub fn ttl(&self, namespace: Namespace) -> Duration {
        match namespace {
            Namespace::Release => self.release_ttl,
            Namespace::Marketplace => self.marketplace_ttl,
        }
    }

    /// An entry is fresh iff `0 <= now - fetched_at < ttl`.
    ///
    /// A zero TTL is never fresh; an entry stamped in the future is not
    /// trusted either.
    pub fn is_fresh(&self, namespace: Namespace, fetched_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        let ttl = self.ttl(namespace);
        if ttl.is_zero() {
            return false;
        }
        match (now - fetched_at).to_std() {
            Ok(age) => age < ttl,
            Err(_) => false,
        }
    }
}

impl Default for FreshnessPolicy {
    fn default() -> Self {
        Self::from_secs(14 * 24 * 60 * 60, 24 * 60 * 60)
    }
}

/// Errors from a cache backend.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache database error: {0}")]
    Database(String),

    #[error("Cache payload could not be (de)serialized: {0}")]
    Serialization(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    #[test]
    fn test_policy_from_config() {
        let config = CacheConfig {
            marketplace_ttl_secs: 0,
            ..CacheConfig::default()
        };
        let policy = FreshnessPolicy::from_config(&config);
        assert!(policy.ttl(Namespace::Marketplace).is_zero());
        assert_eq!(policy.ttl(Namespace::Release), Duration::from_secs(1_209_600));
    }

    #[test]
    fn test_default_policy() {
        let policy = FreshnessPolicy::default();
        assert_eq!(policy.ttl(Namespace::Marketplace), Duration::from_secs(86_400));
        assert_eq!(policy.ttl(Namespace::Release), Duration::from_secs(1_209_600));
    }

    #[test]
    fn test_is_fresh_within_ttl() {
        let policy = FreshnessPolicy::from_secs(100, 10);
        let now = Utc::now();

        assert!(policy.is_fresh(Namespace::Marketplace, now - ChronoDuration::seconds(9), now));
        assert!(!policy.is_fresh(Namespace::Marketplace, now - ChronoDuration::seconds(10), now));
        assert!(policy.is_fresh(Namespace::Release, now - ChronoDuration::seconds(10), now));
    }

    #[test]
    fn test_zero_ttl_never_fresh() {
        let policy = FreshnessPolicy::from_secs(0, 0);
        let now = Utc::now();
        assert!(!policy.is_fresh(Namespace::Release, now, now));
        assert!(!policy.is_fresh(Namespace::Marketplace, now, now));
    }

    #[test]
    fn test_future_timestamp_not_fresh() {
        let policy = FreshnessPolicy::default();
        let now = Utc::now();
        assert!(!policy.is_fresh(Namespace::Release, now + ChronoDuration::hours(1), now));
    }

    #[test]
    fn test_namespace_labels() {
        assert_eq!(Namespace::Release.to_string(), "release");
        assert_eq!(Namespace::Marketplace.as_str(), "marketplace");
    }
}
