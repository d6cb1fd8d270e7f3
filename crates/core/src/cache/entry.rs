//! Cache entry type and list normalization helpers.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::external_catalog::CatalogItem;

/// A cached, popularity-sorted list of catalog items.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheEntry {
    pub items: Vec<CatalogItem>,
    pub fetched_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Entry stamped with the current time.
    pub fn new(items: Vec<CatalogItem>) -> Self {
        Self {
            items,
            fetched_at: Utc::now(),
        }
    }

    /// Entry with an explicit timestamp.
    pub fn with_fetched_at(items: Vec<CatalogItem>, fetched_at: DateTime<Utc>) -> Self {
        Self { items, fetched_at }
    }

    /// Age relative to `now`.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.fetched_at
    }

    /// Whether the entry is younger than `staleness` at `now`.
    pub fn is_fresh(&self, now: DateTime<Utc>, staleness: Duration) -> bool {
        self.age(now) < staleness
    }

    /// Dedupe by identifier and sort by popularity, descending.
    pub fn normalize(mut self) -> Self {
        dedupe_by_id(&mut self.items);
        sort_by_popularity(&mut self.items);
        self
    }

    /// Copy of this entry keeping only the first `max_items` items.
    pub fn truncated(&self, max_items: usize) -> Self {
        Self {
            items: self.items.iter().take(max_items).cloned().collect(),
            fetched_at: self.fetched_at,
        }
    }
}

/// Drop later occurrences of an identifier, keeping the first one seen.
pub fn dedupe_by_id(items: &mut Vec<CatalogItem>) {
    let mut seen = HashSet::with_capacity(items.len());
    items.retain(|item| seen.insert(item.id));
}

/// Stable sort by popularity, most popular first. Ties keep their order.
pub fn sort_by_popularity(items: &mut [CatalogItem]) {
    items.sort_by(|a, b| b.popularity.total_cmp(&a.popularity));
}
