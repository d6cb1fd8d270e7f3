//! Batch orchestrator.
//!
//! Walks a candidate id list in fixed-size groups. Each group is fetched
//! concurrently and fully settled before the next one starts, so at most
//! `batch_size` requests are ever in flight against the metadata API.

mod types;

pub use types::{BatchProgress, HarvestResult};

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::{dedupe_by_id, sort_by_popularity};
use crate::classifier;
use crate::external_catalog::{CatalogItem, SeriesCatalog};
use crate::metrics::{CLASSIFIER_REJECTIONS, DETAIL_FETCHES, HARVEST_GROUPS};

/// Fetches, classifies and accumulates candidate series.
pub struct Harvester {
    catalog: Arc<dyn SeriesCatalog>,
}

impl Harvester {
    pub fn new(catalog: Arc<dyn SeriesCatalog>) -> Self {
        Self { catalog }
    }

    /// Run over `ids` in groups of `batch_size` (0 is treated as 1).
    ///
    /// `cancel` is checked before each group; a cancelled run returns its
    /// partial accumulator with `cancelled` set. Requests already in flight
    /// are never aborted. `on_progress` is called after every group with the
    /// accumulated snapshot.
    pub async fn run<F>(
        &self,
        ids: &[u32],
        batch_size: usize,
        cancel: &CancellationToken,
        mut on_progress: F,
    ) -> HarvestResult
    where
        F: FnMut(&BatchProgress),
    {
        let batch_size = batch_size.max(1);
        let mut items: Vec<CatalogItem> = Vec::new();
        let mut processed = 0;

        info!(
            catalog = self.catalog.name(),
            candidates = ids.len(),
            batch_size,
            "Starting harvest"
        );

        for group in ids.chunks(batch_size) {
            if cancel.is_cancelled() {
                info!(
                    processed,
                    accumulated = items.len(),
                    "Harvest cancelled at group boundary"
                );
                return HarvestResult {
                    total: items.len(),
                    items,
                    processed,
                    candidates: ids.len(),
                    cancelled: true,
                };
            }

            let fetches = group.iter().map(|&id| {
                let catalog = Arc::clone(&self.catalog);
                async move { (id, catalog.fetch_detail(id).await) }
            });
            let results = futures::future::join_all(fetches).await;
            HARVEST_GROUPS.inc();

            for (id, result) in results {
                match result {
                    Ok(item) => {
                        DETAIL_FETCHES.with_label_values(&["found"]).inc();
                        match classifier::qualifies(&item) {
                            Ok(()) => items.push(item),
                            Err(rejection) => {
                                CLASSIFIER_REJECTIONS
                                    .with_label_values(&[rejection.as_str()])
                                    .inc();
                                debug!(id, reason = rejection.as_str(), "Skipping candidate");
                            }
                        }
                    }
                    Err(e) if e.is_not_found() => {
                        DETAIL_FETCHES.with_label_values(&["not_found"]).inc();
                        debug!(id, "Candidate not found upstream");
                    }
                    Err(e) => {
                        DETAIL_FETCHES.with_label_values(&["error"]).inc();
                        warn!(id, kind = e.kind(), error = %e, "Failed to fetch candidate");
                    }
                }
            }

            dedupe_by_id(&mut items);
            sort_by_popularity(&mut items);
            processed += group.len();

            debug!(
                "Group done: {}/{} candidates walked, {} accumulated",
                processed,
                ids.len(),
                items.len()
            );
            on_progress(&BatchProgress::new(items.clone(), processed, ids.len()));
        }

        info!(
            accumulated = items.len(),
            candidates = ids.len(),
            "Harvest complete"
        );

        HarvestResult {
            total: items.len(),
            items,
            processed,
            candidates: ids.len(),
            cancelled: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fixtures, MockSeriesCatalog};
    use std::collections::HashSet;

    fn harvester(catalog: MockSeriesCatalog) -> (Harvester, Arc<MockSeriesCatalog>) {
        let catalog = Arc::new(catalog);
        (Harvester::new(catalog.clone()), catalog)
    }

    fn ids(items: &[CatalogItem]) -> Vec<u32> {
        items.iter().map(|i| i.id).collect()
    }

    #[tokio::test]
    async fn test_scenario_mixed_group_keeps_only_qualifying() {
        // A: Korean drama with poster, B: Korean non-drama,
        // C: non-Korean drama, D: Korean drama without a poster.
        let (harvester, catalog) = harvester(MockSeriesCatalog::with_items(vec![
            fixtures::korean_drama(1, 10.0),
            fixtures::korean_variety(2, 20.0),
            fixtures::western_drama(3, 30.0),
            fixtures::korean_drama_without_artwork(4, 40.0),
        ]));

        let mut calls = Vec::new();
        let result = harvester
            .run(&[1, 2, 3, 4], 2, &CancellationToken::new(), |p| {
                calls.push(p.clone())
            })
            .await;

        assert_eq!(ids(&result.items), vec![1]);
        assert_eq!(result.total, 1);
        assert!(!result.cancelled);
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].total, 1);
        assert_eq!(calls[1].total, 1);
        assert_eq!(calls[1].processed, 4);
        assert_eq!(catalog.fetch_count().await, 4);
    }

    #[tokio::test]
    async fn test_items_without_artwork_are_dropped() {
        let (harvester, _) = harvester(MockSeriesCatalog::with_items(vec![
            fixtures::korean_drama(1, 1.0),
            fixtures::korean_drama_without_artwork(2, 5.0),
        ]));

        let result = harvester
            .run(&[1, 2], 10, &CancellationToken::new(), |_| {})
            .await;

        assert_eq!(ids(&result.items), vec![1]);
    }

    #[tokio::test]
    async fn test_transient_failures_do_not_abort_run() {
        let catalog = MockSeriesCatalog::with_items(vec![
            fixtures::korean_drama(1, 1.0),
            fixtures::korean_drama(2, 2.0),
            fixtures::korean_drama(3, 3.0),
        ]);
        catalog.fail_with(2, 500).await;
        catalog.fail_with(3, 429).await;
        let (harvester, catalog) = harvester(catalog);

        let result = harvester
            .run(&[1, 2, 3], 1, &CancellationToken::new(), |_| {})
            .await;

        assert_eq!(ids(&result.items), vec![1]);
        assert_eq!(catalog.fetch_count().await, 3);
    }

    #[tokio::test]
    async fn test_progress_is_sorted_unique_and_monotonic() {
        let items: Vec<CatalogItem> = (1..=9)
            .map(|id| fixtures::korean_drama(id, ((id * 7) % 10) as f64))
            .collect();
        let (harvester, _) = harvester(MockSeriesCatalog::with_items(items));

        let candidates = [3, 1, 4, 1, 5, 9, 2, 6, 5, 3, 5, 8, 9, 7];
        let mut totals = Vec::new();
        harvester
            .run(&candidates, 3, &CancellationToken::new(), |p| {
                let unique: HashSet<u32> = p.items.iter().map(|i| i.id).collect();
                assert_eq!(unique.len(), p.items.len());
                assert_eq!(p.total, p.items.len());
                assert!(p
                    .items
                    .windows(2)
                    .all(|w| w[0].popularity >= w[1].popularity));
                totals.push(p.total);
            })
            .await;

        assert_eq!(totals.len(), 5);
        assert!(totals.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(totals.last(), Some(&9));
    }

    #[tokio::test]
    async fn test_cancel_stops_before_next_group() {
        let items: Vec<CatalogItem> = (1..=6).map(|id| fixtures::korean_drama(id, 1.0)).collect();
        let (harvester, catalog) = harvester(MockSeriesCatalog::with_items(items));

        let cancel = CancellationToken::new();
        let mut calls = 0;
        let result = harvester
            .run(&[1, 2, 3, 4, 5, 6], 2, &cancel, |_| {
                calls += 1;
                cancel.cancel();
            })
            .await;

        assert!(result.cancelled);
        assert_eq!(calls, 1);
        assert_eq!(result.processed, 2);
        assert_eq!(result.candidates, 6);
        assert_eq!(ids(&result.items).len(), 2);
        assert_eq!(catalog.fetched_ids().await, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_pre_cancelled_run_fetches_nothing() {
        let (harvester, catalog) = harvester(MockSeriesCatalog::new());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = harvester.run(&[1, 2, 3], 2, &cancel, |_| {}).await;

        assert!(result.cancelled);
        assert!(result.items.is_empty());
        assert_eq!(catalog.fetch_count().await, 0);
    }

    #[tokio::test]
    async fn test_zero_batch_size_walks_one_at_a_time() {
        let (harvester, _) = harvester(MockSeriesCatalog::with_items(vec![
            fixtures::korean_drama(1, 1.0),
            fixtures::korean_drama(2, 2.0),
        ]));

        let mut calls = 0;
        harvester
            .run(&[1, 2], 0, &CancellationToken::new(), |_| calls += 1)
            .await;

        assert_eq!(calls, 2);
    }

    #[tokio::test]
    async fn test_empty_candidate_list() {
        let (harvester, _) = harvester(MockSeriesCatalog::new());

        let mut calls = 0;
        let result = harvester
            .run(&[], 5, &CancellationToken::new(), |_| calls += 1)
            .await;

        assert_eq!(calls, 0);
        assert_eq!(result, HarvestResult::default());
    }
}
