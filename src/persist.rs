//! Key/value persistence backends for the action store.
//!
//! The store only needs `get`/`set` of opaque strings; values are the JSON
//! encodings of whole collections.

use std::collections::HashMap;
use std::sync::Mutex;

use rusqlite::{params, OptionalExtension};
use thiserror::Error;

use crate::storage::Pool;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("failed to encode or decode '{key}': {source}")]
    Codec {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("persistence backend unavailable: {0}")]
    Unavailable(String),
}

/// Simple string key/value storage.
pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, PersistError>;
    fn set(&self, key: &str, value: &str) -> Result<(), PersistError>;
    fn remove(&self, key: &str) -> Result<(), PersistError>;
}

// ---------------------------------------------------------------------------
// SQLite
// ---------------------------------------------------------------------------

/// `kv_store` table in the application database.
#[derive(Clone)]
pub struct SqliteKv {
    pool: Pool,
}

impl SqliteKv {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

impl KvStore for SqliteKv {
    fn get(&self, key: &str) -> Result<Option<String>, PersistError> {
        let conn = self.pool.get()?;
        let value = conn
            .query_row(
                "SELECT value FROM kv_store WHERE key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), PersistError> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, datetime('now'))
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), PersistError> {
        let conn = self.pool.get()?;
        conn.execute("DELETE FROM kv_store WHERE key = ?1", params![key])?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

/// Process-local map. Used by tests and `--ephemeral` sessions.
#[derive(Default)]
pub struct MemoryKv {
    map: Mutex<HashMap<String, String>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, PersistError> {
        self.map
            .lock()
            .map_err(|_| PersistError::Unavailable("memory store lock poisoned".to_string()))
    }
}

impl KvStore for MemoryKv {
    fn get(&self, key: &str) -> Result<Option<String>, PersistError> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), PersistError> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), PersistError> {
        self.lock()?.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage;

    fn exercise(kv: &dyn KvStore) {
        assert_eq!(kv.get("missing").unwrap(), None);
        kv.set("k", "v1").unwrap();
        assert_eq!(kv.get("k").unwrap().as_deref(), Some("v1"));
        kv.set("k", "v2").unwrap();
        assert_eq!(kv.get("k").unwrap().as_deref(), Some("v2"));
        kv.remove("k").unwrap();
        assert_eq!(kv.get("k").unwrap(), None);
        kv.remove("k").unwrap();
    }

    #[test]
    fn test_memory_kv() {
        exercise(&MemoryKv::new());
    }

    #[test]
    fn test_sqlite_kv() {
        let pool = storage::open_memory_pool().unwrap();
        exercise(&SqliteKv::new(pool));
    }
}
