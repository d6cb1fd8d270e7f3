//! SQLite-backed key-value store implementation.

use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use super::{KeyValueStore, StorageError};

/// SQLite-backed key-value store with an optional byte quota.
///
/// The quota counts the bytes of all stored values; a `set` that would
/// exceed it fails with [`StorageError::QuotaExceeded`] and leaves the store
/// untouched.
pub struct SqliteKeyValueStore {
    conn: Mutex<Connection>,
    quota_bytes: Option<usize>,
}

impl SqliteKeyValueStore {
    /// Create a new SQLite store, creating the database file and table if needed.
    pub fn new(path: &Path, quota_bytes: Option<usize>) -> Result<Self, StorageError> {
        let conn = Connection::open(path).map_err(|e| StorageError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            quota_bytes,
        })
    }

    /// Create an in-memory SQLite store (useful for testing).
    pub fn in_memory(quota_bytes: Option<usize>) -> Result<Self, StorageError> {
        let conn =
            Connection::open_in_memory().map_err(|e| StorageError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            quota_bytes,
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), StorageError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS kv_store (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )
        .map_err(|e| StorageError::Database(e.to_string()))?;

        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StorageError> {
        self.conn
            .lock()
            .map_err(|e| StorageError::Database(format!("Lock poisoned: {}", e)))
    }

    /// Total bytes currently stored, excluding `key`.
    fn used_bytes_excluding(conn: &Connection, key: &str) -> Result<usize, StorageError> {
        let used: i64 = conn
            .query_row(
                "SELECT COALESCE(SUM(LENGTH(CAST(value AS BLOB))), 0) FROM kv_store WHERE key != ?",
                params![key],
                |row| row.get(0),
            )
            .map_err(|e| StorageError::Database(e.to_string()))?;
        Ok(used.max(0) as usize)
    }
}

impl KeyValueStore for SqliteKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT value FROM kv_store WHERE key = ?",
            params![key],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| StorageError::Database(e.to_string()))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let conn = self.lock()?;

        if let Some(quota) = self.quota_bytes {
            let used = Self::used_bytes_excluding(&conn, key)?;
            let available = quota.saturating_sub(used);
            if value.len() > available {
                return Err(StorageError::QuotaExceeded {
                    needed: value.len(),
                    available,
                });
            }
        }

        conn.execute(
            "INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, Utc::now().to_rfc3339()],
        )
        .map_err(|e| StorageError::Database(e.to_string()))?;

        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM kv_store WHERE key = ?", params![key])
            .map_err(|e| StorageError::Database(e.to_string()))?;
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM kv_store", [])
            .map_err(|e| StorageError::Database(e.to_string()))?;
        Ok(())
    }
}
