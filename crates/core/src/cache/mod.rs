//! Two-tier cache for harvested catalog items.
//!
//! The in-process tier is the fastest and is lost on restart; the persistent
//! tier survives restarts but is bounded in item count and may refuse writes
//! when storage runs out of room.

mod entry;
mod two_tier;

pub use entry::{dedupe_by_id, sort_by_popularity, CacheEntry};
pub use two_tier::TwoTierCache;

use chrono::Duration;

use crate::config::HarvestConfig;

/// Cache identity, staleness window and persistent size bound.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Key under which the entry is stored in the persistent tier.
    pub key: String,
    /// Entries at least this old are treated as absent.
    pub staleness: Duration,
    /// Maximum items written to the persistent tier.
    pub max_items: usize,
}

impl From<&HarvestConfig> for CacheConfig {
    fn from(config: &HarvestConfig) -> Self {
        Self {
            key: config.cache_key.clone(),
            staleness: Duration::hours(config.staleness_hours as i64),
            max_items: config.max_cache_size,
        }
    }
}
