//! In-memory key-value store for testing the persistent cache tier.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::storage::{KeyValueStore, StorageError};

/// HashMap-backed [`KeyValueStore`] with a strict quota and failure switch.
///
/// Unlike the SQLite store, the quota here counts every stored value,
/// including the one about to be replaced. This mirrors browser-style
/// storage where an oversized rewrite fails until the old value is removed.
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    values: Mutex<HashMap<String, String>>,
    quota_bytes: Option<usize>,
    fail_writes: AtomicBool,
    set_attempts: AtomicUsize,
}

impl MemoryKeyValueStore {
    /// Unbounded store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that rejects writes once the total value bytes would exceed `quota_bytes`.
    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            quota_bytes: Some(quota_bytes),
            ..Self::default()
        }
    }

    /// Make every subsequent `set` fail with a quota error.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of `set` calls seen, successful or not.
    pub fn set_attempts(&self) -> usize {
        self.set_attempts.load(Ordering::SeqCst)
    }

    fn values(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        match self.values.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.values().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.set_attempts.fetch_add(1, Ordering::SeqCst);

        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::QuotaExceeded {
                needed: value.len(),
                available: 0,
            });
        }

        let mut values = self.values();
        if let Some(quota) = self.quota_bytes {
            let used: usize = values.values().map(String::len).sum();
            let available = quota.saturating_sub(used);
            if value.len() > available {
                return Err(StorageError::QuotaExceeded {
                    needed: value.len(),
                    available,
                });
            }
        }

        values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.values().remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        self.values().clear();
        Ok(())
    }
}
