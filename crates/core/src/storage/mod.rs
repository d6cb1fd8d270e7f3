//! Persisted key-value storage.
//!
//! The persistent cache tier talks to storage only through [`KeyValueStore`]:
//! string values under string keys, with a size limit that surfaces as
//! [`StorageError::QuotaExceeded`]. No transactional guarantees are assumed.

mod sqlite;

pub use sqlite::SqliteKeyValueStore;

use thiserror::Error;

/// Errors from a key-value store.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The write would push the store past its size limit.
    #[error("Storage quota exceeded: need {needed} bytes, {available} available")]
    QuotaExceeded { needed: usize, available: usize },

    /// Underlying database failure.
    #[error("Database error: {0}")]
    Database(String),
}

/// Trait for persisted key-value storage.
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove `key`. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// Remove every key.
    fn clear(&self) -> Result<(), StorageError>;
}
