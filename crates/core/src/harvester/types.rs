use serde::{Deserialize, Serialize};

use crate::external_catalog::CatalogItem;

/// Snapshot delivered after every processed group.
///
/// Snapshots only ever grow during a run: `items` is the full accumulator,
/// deduplicated and popularity-sorted, never a delta.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BatchProgress {
    pub items: Vec<CatalogItem>,
    /// Always `items.len()`.
    pub total: usize,
    /// Candidate ids walked so far.
    pub processed: usize,
    /// Length of the candidate list for this run.
    pub candidates: usize,
}

impl BatchProgress {
    pub fn new(items: Vec<CatalogItem>, processed: usize, candidates: usize) -> Self {
        Self {
            total: items.len(),
            items,
            processed,
            candidates,
        }
    }
}

/// Final accumulator of a harvest run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct HarvestResult {
    pub items: Vec<CatalogItem>,
    pub total: usize,
    pub processed: usize,
    pub candidates: usize,
    /// The run stopped at a group boundary because its token was cancelled.
    pub cancelled: bool,
}
