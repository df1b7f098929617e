//! Signal cache - persisted marketplace and release data keyed by release id.
//!
//! Remote signals are expensive (the API allows about one request per second),
//! so every successful fetch is written here and reused until its namespace TTL
//! runs out. Stale entries are kept: they are the fallback when a refetch fails.

mod clock;
mod memory;
mod sqlite;
mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use memory::MemoryCacheBackend;
pub use sqlite::SqliteCacheBackend;
pub use types::*;

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

/// Trait for cache storage backends.
pub trait CacheBackend: Send + Sync {
    /// Load the entry for `(namespace, key)`, if any.
    fn load(&self, namespace: Namespace, key: &str) -> Result<Option<CacheEntry>, CacheError>;

    /// Store an entry, replacing any previous one for the same key.
    fn store(&self, namespace: Namespace, key: &str, entry: &CacheEntry) -> Result<(), CacheError>;

    /// Number of entries in a namespace.
    fn count(&self, namespace: Namespace) -> Result<usize, CacheError>;
}

/// Cache front-end: a backend plus freshness policy and clock.
#[derive(Clone)]
pub struct SignalCache {
    backend: Arc<dyn CacheBackend>,
    policy: FreshnessPolicy,
    clock: Arc<dyn Clock>,
}

impl SignalCache {
    pub fn new(backend: Arc<dyn CacheBackend>, policy: FreshnessPolicy) -> Self {
        Self::with_clock(backend, policy, Arc::new(SystemClock))
    }

    pub fn with_clock(
        backend: Arc<dyn CacheBackend>,
        policy: FreshnessPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            backend,
            policy,
            clock,
        }
    }

    /// A throwaway in-memory cache.
    pub fn in_memory(policy: FreshnessPolicy) -> Self {
        Self::new(Arc::new(MemoryCacheBackend::new()), policy)
    }

    pub fn policy(&self) -> &FreshnessPolicy {
        &self.policy
    }

    /// Read an entry. `None` means not found.
    ///
    /// Backend failures are logged and read as a miss.
    pub fn get(&self, namespace: Namespace, key: &str) -> Option<CacheLookup> {
        let entry = match self.backend.load(namespace, key) {
            Ok(entry) => entry?,
            Err(e) => {
                warn!("Cache read failed for {}/{}: {}", namespace, key, e);
                return None;
            }
        };

        let fresh = self
            .policy
            .is_fresh(namespace, entry.fetched_at, self.clock.now());

        Some(CacheLookup {
            payload: entry.payload,
            fetched_at: entry.fetched_at,
            fresh,
        })
    }

    /// Read and decode an entry. A payload that no longer decodes reads as a miss.
    pub fn get_as<T: DeserializeOwned>(&self, namespace: Namespace, key: &str) -> Option<Cached<T>> {
        let lookup = self.get(namespace, key)?;
        match lookup.decode::<T>() {
            Ok(value) => Some(Cached {
                value,
                fetched_at: lookup.fetched_at,
                fresh: lookup.fresh,
            }),
            Err(e) => {
                warn!("Ignoring undecodable cache entry {}/{}: {}", namespace, key, e);
                None
            }
        }
    }

    /// Store a payload stamped with the current time.
    pub fn put(
        &self,
        namespace: Namespace,
        key: &str,
        payload: serde_json::Value,
    ) -> Result<(), CacheError> {
        let entry = CacheEntry {
            payload,
            fetched_at: self.clock.now(),
        };
        self.backend.store(namespace, key, &entry)?;
        debug!("Cached {}/{}", namespace, key);
        Ok(())
    }

    /// Serialize and store a typed value.
    pub fn put_value<T: Serialize>(
        &self,
        namespace: Namespace,
        key: &str,
        value: &T,
    ) -> Result<(), CacheError> {
        let payload =
            serde_json::to_value(value).map_err(|e| CacheError::Serialization(e.to_string()))?;
        self.put(namespace, key, payload)
    }

    /// Whether a fresh entry exists for the key.
    pub fn is_fresh(&self, namespace: Namespace, key: &str) -> bool {
        self.get(namespace, key).is_some_and(|lookup| lookup.fresh)
    }

    /// Entry counts per namespace, for logging.
    pub fn counts(&self) -> Vec<(Namespace, usize)> {
        Namespace::ALL
            .iter()
            .map(|ns| (*ns, self.backend.count(*ns).unwrap_or(0)))
            .collect()
    }
}
