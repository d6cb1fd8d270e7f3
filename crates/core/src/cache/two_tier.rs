//! In-process cache tier backed by a persistent key-value tier.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use chrono::{Duration, Utc};
use tracing::{debug, info, warn};

use super::entry::CacheEntry;
use super::CacheConfig;
use crate::metrics::{CACHE_LOOKUPS, CACHE_WRITE_FAILURES};
use crate::storage::{KeyValueStore, StorageError};

/// Two-tier cache for the harvested item list.
///
/// The in-process tier holds an `Arc<CacheEntry>` that is replaced wholesale
/// on every write, so readers always see a complete list. The persistent
/// tier stores the JSON-serialized entry under a fixed key, truncated to
/// `max_items`.
pub struct TwoTierCache {
    memory: RwLock<Option<Arc<CacheEntry>>>,
    store: Arc<dyn KeyValueStore>,
    key: String,
    staleness: Duration,
    max_items: usize,
    /// Set once the persistent tier could not be written even after clearing
    /// the whole store. Writes stay in-process for the rest of the process.
    degraded: AtomicBool,
}

impl TwoTierCache {
    pub fn new(config: CacheConfig, store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            memory: RwLock::new(None),
            store,
            key: config.key,
            staleness: config.staleness,
            max_items: config.max_items,
            degraded: AtomicBool::new(false),
        }
    }

    /// Fresh cache entry, checking the in-process tier then the persistent one.
    ///
    /// A fresh persistent entry is promoted into the in-process tier.
    pub fn get(&self) -> Option<Arc<CacheEntry>> {
        let now = Utc::now();

        match self.snapshot() {
            Some(entry) if entry.is_fresh(now, self.staleness) => {
                CACHE_LOOKUPS.with_label_values(&["memory", "hit"]).inc();
                return Some(entry);
            }
            Some(_) => {
                CACHE_LOOKUPS.with_label_values(&["memory", "stale"]).inc();
            }
            None => {
                CACHE_LOOKUPS.with_label_values(&["memory", "miss"]).inc();
            }
        }

        let entry = self.read_persistent()?;
        if !entry.is_fresh(now, self.staleness) {
            CACHE_LOOKUPS
                .with_label_values(&["persistent", "stale"])
                .inc();
            debug!(
                "Persistent cache entry '{}' is stale (fetched at {})",
                self.key, entry.fetched_at
            );
            return None;
        }

        CACHE_LOOKUPS.with_label_values(&["persistent", "hit"]).inc();
        let entry = Arc::new(entry);
        self.replace_memory(Arc::clone(&entry));
        debug!(
            "Promoted {} cached items from persistent tier",
            entry.items.len()
        );
        Some(entry)
    }

    /// Current in-process entry, regardless of age.
    pub fn snapshot(&self) -> Option<Arc<CacheEntry>> {
        match self.memory.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Store an entry in both tiers.
    ///
    /// The entry is deduplicated and popularity-sorted first. Persistent
    /// failures never propagate: see [`Self::persist`].
    pub fn put(&self, entry: CacheEntry) {
        let entry = Arc::new(entry.normalize());
        self.replace_memory(Arc::clone(&entry));

        if self.degraded.load(Ordering::Relaxed) {
            debug!("Persistent cache tier degraded, keeping entry in memory only");
            return;
        }

        self.persist(&entry);
    }

    /// Drop the entry from both tiers.
    pub fn invalidate(&self) {
        match self.memory.write() {
            Ok(mut guard) => *guard = None,
            Err(poisoned) => *poisoned.into_inner() = None,
        }
        if let Err(e) = self.store.remove(&self.key) {
            warn!("Failed to remove persistent cache entry '{}': {}", self.key, e);
        }
        info!("Cache '{}' invalidated", self.key);
    }

    /// Whether persistent writes have been given up on.
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Relaxed)
    }

    fn replace_memory(&self, entry: Arc<CacheEntry>) {
        match self.memory.write() {
            Ok(mut guard) => *guard = Some(entry),
            Err(poisoned) => *poisoned.into_inner() = Some(entry),
        }
    }

    fn read_persistent(&self) -> Option<CacheEntry> {
        let raw = match self.store.get(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                CACHE_LOOKUPS
                    .with_label_values(&["persistent", "miss"])
                    .inc();
                return None;
            }
            Err(e) => {
                warn!("Failed to read persistent cache '{}': {}", self.key, e);
                CACHE_LOOKUPS
                    .with_label_values(&["persistent", "miss"])
                    .inc();
                return None;
            }
        };

        match serde_json::from_str::<CacheEntry>(&raw) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(
                    "Discarding malformed persistent cache '{}': {}",
                    self.key, e
                );
                if let Err(e) = self.store.remove(&self.key) {
                    warn!("Failed to remove malformed cache entry: {}", e);
                }
                CACHE_LOOKUPS
                    .with_label_values(&["persistent", "miss"])
                    .inc();
                None
            }
        }
    }

    /// Write the truncated entry, escalating on failure:
    /// retry after removing the key, then after clearing the whole store,
    /// then give up and mark the tier degraded.
    fn persist(&self, entry: &CacheEntry) {
        let bounded = entry.truncated(self.max_items);
        let json = match serde_json::to_string(&bounded) {
            Ok(json) => json,
            Err(e) => {
                warn!("Failed to serialize cache entry: {}", e);
                return;
            }
        };

        let Err(e) = self.store.set(&self.key, &json) else {
            return;
        };
        CACHE_WRITE_FAILURES.with_label_values(&["initial"]).inc();
        warn!(
            "Persistent cache write failed ({}), retrying after removing '{}'",
            e, self.key
        );

        if let Err(e) = self.store.remove(&self.key) {
            debug!("Failed to remove '{}' before retry: {}", self.key, e);
        }
        let Err(e) = self.store.set(&self.key, &json) else {
            return;
        };
        CACHE_WRITE_FAILURES
            .with_label_values(&["after_remove"])
            .inc();
        warn!(
            "Persistent cache write failed again ({}), clearing the entire store",
            e
        );

        if let Err(e) = self.store.clear() {
            debug!("Failed to clear persistent store: {}", e);
        }
        if let Err(e) = self.store.set(&self.key, &json) {
            CACHE_WRITE_FAILURES
                .with_label_values(&["after_clear"])
                .inc();
            self.give_up(e);
        }
    }

    fn give_up(&self, e: StorageError) {
        self.degraded.store(true, Ordering::Relaxed);
        warn!(
            "Persistent cache unavailable ({}), continuing with in-memory cache only",
            e
        );
    }
}
