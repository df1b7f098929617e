//! SQLite-backed signal cache.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{info, warn};

use super::{CacheBackend, CacheEntry, CacheError, Namespace};

/// SQLite-backed cache. One row per `(namespace, key)`.
pub struct SqliteCacheBackend {
    conn: Mutex<Connection>,
}

impl SqliteCacheBackend {
    /// Open the cache file, creating it if needed.
    ///
    /// A file that is not a readable SQLite database is moved aside to
    /// `<path>.corrupt` and replaced with an empty cache.
    pub fn open(path: &Path) -> Result<Self, CacheError> {
        match Self::try_open(path) {
            Ok(backend) => Ok(backend),
            Err(e) => {
                let aside = corrupt_path(path);
                warn!(
                    "Signal cache {:?} is unreadable ({}), moving it to {:?} and starting cold",
                    path, e, aside
                );
                std::fs::rename(path, &aside)
                    .map_err(|e| CacheError::Database(format!("cannot move corrupt cache: {}", e)))?;
                Self::try_open(path)
            }
        }
    }

    /// Create an in-memory SQLite cache (useful for testing).
    pub fn in_memory() -> Result<Self, CacheError> {
        let conn = Connection::open_in_memory().map_err(|e| CacheError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn try_open(path: &Path) -> Result<Self, CacheError> {
        let conn = Connection::open(path).map_err(|e| CacheError::Database(e.to_string()))?;

        // Connection::open is lazy; this is the first real read of the file.
        let check: String = conn
            .query_row("PRAGMA quick_check", [], |row| row.get(0))
            .map_err(|e| CacheError::Database(e.to_string()))?;
        if check != "ok" {
            return Err(CacheError::Database(format!("integrity check failed: {}", check)));
        }

        Self::initialize_schema(&conn)?;
        info!("Signal cache opened at {:?}", path);
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), CacheError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS signal_cache (
                namespace TEXT NOT NULL,
                key TEXT NOT NULL,
                payload TEXT NOT NULL,
                fetched_at TEXT NOT NULL,
                PRIMARY KEY (namespace, key)
            );
            "#,
        )
        .map_err(|e| CacheError::Database(e.to_string()))?;

        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, CacheError> {
        self.conn
            .lock()
            .map_err(|_| CacheError::Database("cache connection lock poisoned".to_string()))
    }
}

impl CacheBackend for SqliteCacheBackend {
    fn load(&self, namespace: Namespace, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        let conn = self.conn()?;

        let row: Option<(String, String)> = conn
            .query_row(
                "SELECT payload, fetched_at FROM signal_cache WHERE namespace = ? AND key = ?",
                params![namespace.as_str(), key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(|e| CacheError::Database(e.to_string()))?;

        let Some((payload_json, fetched_at_str)) = row else {
            return Ok(None);
        };

        let payload = serde_json::from_str(&payload_json)
            .map_err(|e| CacheError::Serialization(e.to_string()))?;

        // An unparsable timestamp makes the entry maximally stale, not fresh.
        let fetched_at = DateTime::parse_from_rfc3339(&fetched_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);

        Ok(Some(CacheEntry {
            payload,
            fetched_at,
        }))
    }

    fn store(&self, namespace: Namespace, key: &str, entry: &CacheEntry) -> Result<(), CacheError> {
        let conn = self.conn()?;
        let payload_json = serde_json::to_string(&entry.payload)
            .map_err(|e| CacheError::Serialization(e.to_string()))?;

        conn.execute(
            "INSERT INTO signal_cache (namespace, key, payload, fetched_at) VALUES (?, ?, ?, ?)
             ON CONFLICT(namespace, key) DO UPDATE SET
                payload = excluded.payload,
                fetched_at = excluded.fetched_at",
            params![
                namespace.as_str(),
                key,
                payload_json,
                entry.fetched_at.to_rfc3339(),
            ],
        )
        .map_err(|e| CacheError::Database(e.to_string()))?;

        Ok(())
    }

    fn count(&self, namespace: Namespace) -> Result<usize, CacheError> {
        let conn = self.conn()?;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM signal_cache WHERE namespace = ?",
                params![namespace.as_str()],
                |row| row.get(0),
            )
            .map_err(|e| CacheError::Database(e.to_string()))?;
        Ok(count as usize)
    }
}

fn corrupt_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".corrupt");
    PathBuf::from(name)
}
