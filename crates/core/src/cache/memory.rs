//! In-memory cache backend.

use std::collections::HashMap;
use std::sync::Mutex;

use super::{CacheBackend, CacheEntry, CacheError, Namespace};

/// Cache backend kept in a `HashMap`. Used for tests and `--no-cache` runs.
#[derive(Debug, Default)]
pub struct MemoryCacheBackend {
    entries: Mutex<HashMap<(Namespace, String), CacheEntry>>,
}

impl MemoryCacheBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<(Namespace, String), CacheEntry>>, CacheError>
    {
        self.entries
            .lock()
            .map_err(|_| CacheError::Database("memory cache lock poisoned".to_string()))
    }
}

impl CacheBackend for MemoryCacheBackend {
    fn load(&self, namespace: Namespace, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        Ok(self.entries()?.get(&(namespace, key.to_string())).cloned())
    }

    fn store(&self, namespace: Namespace, key: &str, entry: &CacheEntry) -> Result<(), CacheError> {
        self.entries()?
            .insert((namespace, key.to_string()), entry.clone());
        Ok(())
    }

    fn count(&self, namespace: Namespace) -> Result<usize, CacheError> {
        Ok(self
            .entries()?
            .keys()
            .filter(|(ns, _)| *ns == namespace)
            .count())
    }
}
