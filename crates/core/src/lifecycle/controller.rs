//! Lifecycle controller implementation.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::types::{ControllerStatus, LifecycleError, LifecycleState, RunOutcome, RunSummary};
use crate::cache::{CacheEntry, TwoTierCache};
use crate::candidates::CandidateSource;
use crate::config::HarvestConfig;
use crate::harvester::{BatchProgress, Harvester};
use crate::metrics::HARVEST_RUNS;
use crate::page::{page_slice, Page};

const PROGRESS_CHANNEL_CAPACITY: usize = 64;

#[derive(Default)]
struct Inner {
    state: LifecycleState,
    /// Identifies the run allowed to write the final state.
    run_id: Option<Uuid>,
    cancel: Option<CancellationToken>,
    /// Cancelled when a cold run replaces this one; stops its cache writes.
    superseded: Option<CancellationToken>,
    task: Option<JoinHandle<()>>,
    last_run: Option<RunSummary>,
    last_error: Option<String>,
}

struct Shared {
    harvester: Arc<Harvester>,
    cache: Arc<TwoTierCache>,
    candidates: Arc<dyn CandidateSource>,
    batch_size: usize,
    page_size: usize,
    inner: Mutex<Inner>,
    progress: broadcast::Sender<BatchProgress>,
}

/// Drives harvest runs and answers page reads from the cache.
///
/// Cloning is cheap; clones share the same state.
#[derive(Clone)]
pub struct DoramaController {
    shared: Arc<Shared>,
}

impl DoramaController {
    pub fn new(
        harvester: Arc<Harvester>,
        cache: Arc<TwoTierCache>,
        candidates: Arc<dyn CandidateSource>,
        config: &HarvestConfig,
    ) -> Self {
        let (progress, _) = broadcast::channel(PROGRESS_CHANNEL_CAPACITY);

        Self {
            shared: Arc::new(Shared {
                harvester,
                cache,
                candidates,
                batch_size: config.batch_size,
                page_size: config.page_size,
                inner: Mutex::new(Inner::default()),
                progress,
            }),
        }
    }

    /// Start a run. A no-op while one is already running.
    pub async fn start(&self) -> LifecycleState {
        let mut inner = self.shared.inner.lock().await;
        if inner.state == LifecycleState::Running {
            debug!("Harvest already running");
            return inner.state;
        }
        self.spawn_run(&mut inner, false);
        inner.state
    }

    /// Cancel the current run at its next group boundary.
    ///
    /// The in-flight group still settles and is delivered.
    pub async fn pause(&self) -> Result<LifecycleState, LifecycleError> {
        let mut inner = self.shared.inner.lock().await;
        match inner.state {
            LifecycleState::Running => {
                if let Some(cancel) = inner.cancel.take() {
                    cancel.cancel();
                }
                inner.state = LifecycleState::Paused;
                info!("Harvest paused");
                Ok(inner.state)
            }
            LifecycleState::Paused => Ok(inner.state),
            state => Err(LifecycleError::InvalidTransition {
                operation: "pause",
                state,
            }),
        }
    }

    /// Continue after a pause.
    ///
    /// The new run goes through the cache read path first, so a fresh
    /// (possibly partial) entry completes it without any fetches.
    pub async fn resume(&self) -> Result<LifecycleState, LifecycleError> {
        let mut inner = self.shared.inner.lock().await;
        match inner.state {
            LifecycleState::Paused | LifecycleState::Idle => {
                info!("Resuming harvest");
                self.spawn_run(&mut inner, false);
                Ok(inner.state)
            }
            LifecycleState::Running => Ok(inner.state),
            state => Err(LifecycleError::InvalidTransition {
                operation: "resume",
                state,
            }),
        }
    }

    /// Give up on a paused run.
    pub async fn abandon(&self) -> Result<LifecycleState, LifecycleError> {
        let mut inner = self.shared.inner.lock().await;
        match inner.state {
            LifecycleState::Paused => {
                inner.state = LifecycleState::Idle;
                inner.run_id = None;
                info!("Paused harvest abandoned");
                Ok(inner.state)
            }
            LifecycleState::Idle => Ok(inner.state),
            state => Err(LifecycleError::InvalidTransition {
                operation: "abandon",
                state,
            }),
        }
    }

    /// Drop the cached result and start a cold run.
    ///
    /// A running harvest is cancelled first. The cache is invalidated once
    /// that run has settled, and the new run never answers from the cache.
    pub async fn refresh(&self) -> LifecycleState {
        let mut inner = self.shared.inner.lock().await;
        if let Some(cancel) = inner.cancel.take() {
            cancel.cancel();
        }
        info!("Starting fresh harvest");
        self.spawn_run(&mut inner, true);
        inner.state
    }

    /// Wait for the current run task to finish.
    ///
    /// Returns immediately if no task is active or another caller is
    /// already waiting on it.
    pub async fn wait(&self) {
        let task = self.shared.inner.lock().await.task.take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                error!("Harvest task failed: {}", e);
            }
        }
    }

    /// Pause any running harvest and wait for it to settle.
    pub async fn shutdown(&self) {
        if self.pause().await.is_ok() {
            self.wait().await;
        }
    }

    /// Receive a snapshot after every processed group.
    pub fn subscribe(&self) -> broadcast::Receiver<BatchProgress> {
        self.shared.progress.subscribe()
    }

    pub async fn status(&self) -> ControllerStatus {
        let inner = self.shared.inner.lock().await;
        let snapshot = self.shared.cache.snapshot();

        ControllerStatus {
            state: inner.state,
            cached_items: snapshot.as_ref().map_or(0, |entry| entry.items.len()),
            fetched_at: snapshot.as_ref().map(|entry| entry.fetched_at),
            cache_degraded: self.shared.cache.is_degraded(),
            last_run: inner.last_run.clone(),
            last_error: inner.last_error.clone(),
        }
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> LifecycleState {
        self.shared.inner.lock().await.state
    }

    /// Page `n` (1-based) of the accumulated list. Never triggers fetching.
    pub fn page(&self, n: usize) -> Page {
        let entry = self
            .shared
            .cache
            .snapshot()
            .or_else(|| self.shared.cache.get());

        match entry {
            Some(entry) => page_slice(&entry.items, n, self.shared.page_size),
            None => page_slice(&[], n, self.shared.page_size),
        }
    }

    pub fn page_size(&self) -> usize {
        self.shared.page_size
    }

    /// Spawn a run task with a fresh token. Runs never overlap: the new task
    /// waits for the previous one to settle before touching the cache.
    ///
    /// A cold run supersedes the previous one: whatever that run still
    /// delivers is discarded, and the cache is invalidated before harvesting.
    fn spawn_run(&self, inner: &mut Inner, cold: bool) {
        let run_id = Uuid::new_v4();
        let cancel = CancellationToken::new();
        let superseded = CancellationToken::new();
        let previous = inner.task.take();

        if cold {
            if let Some(old) = inner.superseded.take() {
                old.cancel();
            }
        }
        inner.superseded = Some(superseded.clone());

        inner.state = LifecycleState::Running;
        inner.run_id = Some(run_id);
        inner.cancel = Some(cancel.clone());

        let shared = Arc::clone(&self.shared);
        inner.task = Some(tokio::spawn(async move {
            if let Some(previous) = previous {
                if let Err(e) = previous.await {
                    warn!("Previous harvest task failed: {}", e);
                }
            }
            if cold {
                shared.cache.invalidate();
            }
            shared.execute(run_id, cold, cancel, superseded).await;
        }));
        debug!(%run_id, "Spawned harvest run");
    }
}

/// What a run produced, before it is recorded.
struct RunReport {
    outcome: RunOutcome,
    total: usize,
    processed: usize,
    candidates: usize,
    error: Option<String>,
}

impl RunReport {
    fn empty(outcome: RunOutcome) -> Self {
        Self {
            outcome,
            total: 0,
            processed: 0,
            candidates: 0,
            error: None,
        }
    }
}

impl Shared {
    async fn execute(
        &self,
        run_id: Uuid,
        cold: bool,
        cancel: CancellationToken,
        superseded: CancellationToken,
    ) {
        let started_at = Utc::now();
        let report = self.harvest(cold, &cancel, &superseded).await;
        HARVEST_RUNS
            .with_label_values(&[report.outcome.as_str()])
            .inc();

        let summary = RunSummary {
            run_id,
            outcome: report.outcome,
            started_at,
            finished_at: Utc::now(),
            total: report.total,
            processed: report.processed,
            candidates: report.candidates,
        };
        self.finish(summary, report.error).await;
    }

    /// Answer from the cache read path, or walk the candidate list.
    async fn harvest(
        &self,
        cold: bool,
        cancel: &CancellationToken,
        superseded: &CancellationToken,
    ) -> RunReport {
        if cancel.is_cancelled() {
            return RunReport::empty(RunOutcome::Cancelled);
        }

        let cached = if cold { None } else { self.cache.get() };
        if let Some(entry) = cached {
            info!(
                "Serving {} cached items from {}, no harvest needed",
                entry.items.len(),
                entry.fetched_at
            );
            let _ = self
                .progress
                .send(BatchProgress::new(entry.items.clone(), 0, 0));
            return RunReport {
                total: entry.items.len(),
                ..RunReport::empty(RunOutcome::CacheHit)
            };
        }

        // File sources read from disk
        let source = Arc::clone(&self.candidates);
        let loaded = match tokio::task::spawn_blocking(move || source.load()).await {
            Ok(result) => result.map_err(|e| e.to_string()),
            Err(e) => Err(format!("Candidate loader task failed: {}", e)),
        };

        let ids = match loaded {
            Ok(ids) => ids,
            Err(e) => {
                error!("Failed to load candidate ids: {}", e);
                let _ = self.progress.send(BatchProgress::default());
                return RunReport {
                    error: Some(e),
                    ..RunReport::empty(RunOutcome::Failed)
                };
            }
        };

        let result = self
            .harvester
            .run(&ids, self.batch_size, cancel, |snapshot| {
                if superseded.is_cancelled() {
                    debug!("Dropping progress from superseded run");
                    return;
                }
                self.cache.put(CacheEntry::new(snapshot.items.clone()));
                // No subscribers is fine.
                let _ = self.progress.send(snapshot.clone());
            })
            .await;

        RunReport {
            outcome: if result.cancelled {
                RunOutcome::Cancelled
            } else {
                RunOutcome::Completed
            },
            total: result.total,
            processed: result.processed,
            candidates: result.candidates,
            error: None,
        }
    }

    /// Record a finished run, unless a newer run has taken over.
    async fn finish(&self, summary: RunSummary, error: Option<String>) {
        let mut inner = self.inner.lock().await;
        if inner.run_id != Some(summary.run_id) {
            debug!(run_id = %summary.run_id, "Superseded harvest run finished");
            return;
        }

        if inner.state == LifecycleState::Running {
            inner.state = match summary.outcome {
                RunOutcome::Cancelled => LifecycleState::Paused,
                _ => LifecycleState::Completed,
            };
        }

        info!(
            run_id = %summary.run_id,
            outcome = summary.outcome.as_str(),
            total = summary.total,
            processed = summary.processed,
            candidates = summary.candidates,
            state = %inner.state,
            "Harvest run finished"
        );

        inner.cancel = None;
        inner.last_error = error;
        inner.last_run = Some(summary);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheConfig;
    use crate::candidates::StaticCandidateSource;
    use crate::testing::{fixtures, MemoryKeyValueStore, MockSeriesCatalog};

    struct Harness {
        controller: DoramaController,
        catalog: Arc<MockSeriesCatalog>,
        cache: Arc<TwoTierCache>,
    }

    fn harness(catalog: MockSeriesCatalog, ids: Vec<u32>, batch_size: usize) -> Harness {
        let catalog = Arc::new(catalog);
        let config = HarvestConfig {
            batch_size,
            page_size: 2,
            ..Default::default()
        };
        let cache = Arc::new(TwoTierCache::new(
            CacheConfig::from(&config),
            Arc::new(MemoryKeyValueStore::new()),
        ));
        let controller = DoramaController::new(
            Arc::new(Harvester::new(catalog.clone())),
            cache.clone(),
            Arc::new(StaticCandidateSource::new(ids)),
            &config,
        );
        Harness {
            controller,
            catalog,
            cache,
        }
    }

    fn dramas(n: u32) -> MockSeriesCatalog {
        MockSeriesCatalog::with_items(
            (1..=n)
                .map(|id| fixtures::korean_drama(id, id as f64))
                .collect(),
        )
    }

    #[tokio::test]
    async fn test_cold_run_completes_and_caches() {
        let h = harness(dramas(3), vec![1, 2, 3], 2);

        assert_eq!(h.controller.start().await, LifecycleState::Running);
        h.controller.wait().await;

        let status = h.controller.status().await;
        assert_eq!(status.state, LifecycleState::Completed);
        assert_eq!(status.cached_items, 3);
        let last_run = status.last_run.unwrap();
        assert_eq!(last_run.outcome, RunOutcome::Completed);
        assert_eq!(last_run.processed, 3);
        assert_eq!(h.cache.get().unwrap().items.len(), 3);
    }

    #[tokio::test]
    async fn test_second_start_within_staleness_fetches_nothing() {
        let h = harness(dramas(3), vec![1, 2, 3], 2);

        h.controller.start().await;
        h.controller.wait().await;
        assert_eq!(h.catalog.fetch_count().await, 3);

        h.controller.start().await;
        h.controller.wait().await;
        assert_eq!(h.catalog.fetch_count().await, 3);

        let status = h.controller.status().await;
        assert_eq!(status.last_run.unwrap().outcome, RunOutcome::CacheHit);
    }

    #[tokio::test]
    async fn test_progress_is_broadcast() {
        let h = harness(dramas(4), vec![1, 2, 3, 4], 2);
        let mut rx = h.controller.subscribe();

        h.controller.start().await;
        h.controller.wait().await;

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first.total, 2);
        assert_eq!(second.total, 4);
        assert_eq!(second.processed, 4);
        assert_eq!(second.candidates, 4);
    }

    #[tokio::test]
    async fn test_pause_then_resume_uses_cache() {
        let catalog = dramas(6);
        catalog.hold(3).await;
        let h = harness(catalog, vec![1, 2, 3, 4, 5, 6], 2);
        let mut rx = h.controller.subscribe();

        h.controller.start().await;
        let first = rx.recv().await.unwrap();
        assert_eq!(first.total, 2);

        // Second group is in flight, held on id 3
        while h.catalog.fetch_count().await < 4 {
            tokio::task::yield_now().await;
        }
        assert_eq!(h.controller.pause().await, Ok(LifecycleState::Paused));
        h.catalog.release();
        h.controller.wait().await;

        let status = h.controller.status().await;
        assert_eq!(status.state, LifecycleState::Paused);
        assert_eq!(status.last_run.unwrap().outcome, RunOutcome::Cancelled);
        // The in-flight group settled, the third never started
        assert_eq!(h.catalog.fetch_count().await, 4);
        let paused_items = h.cache.get().unwrap().items.clone();
        assert_eq!(paused_items.len(), 4);

        assert_eq!(h.controller.resume().await, Ok(LifecycleState::Running));
        h.controller.wait().await;

        assert_eq!(h.controller.state().await, LifecycleState::Completed);
        assert_eq!(h.catalog.fetch_count().await, 4);
        assert_eq!(h.cache.get().unwrap().items, paused_items);
    }

    #[tokio::test]
    async fn test_abandon_paused_run() {
        let catalog = dramas(4);
        catalog.hold(3).await;
        let h = harness(catalog, vec![1, 2, 3, 4], 2);
        let mut rx = h.controller.subscribe();

        h.controller.start().await;
        rx.recv().await.unwrap();
        h.controller.pause().await.unwrap();
        h.catalog.release();
        h.controller.wait().await;

        assert_eq!(h.controller.abandon().await, Ok(LifecycleState::Idle));
        assert_eq!(h.controller.state().await, LifecycleState::Idle);
    }

    #[tokio::test]
    async fn test_invalid_transitions() {
        let h = harness(dramas(1), vec![1], 1);

        assert!(matches!(
            h.controller.pause().await,
            Err(LifecycleError::InvalidTransition {
                operation: "pause",
                state: LifecycleState::Idle
            })
        ));

        h.controller.start().await;
        h.controller.wait().await;

        assert!(h.controller.resume().await.is_err());
        assert!(h.controller.abandon().await.is_err());
    }

    #[tokio::test]
    async fn test_candidate_failure_completes_with_error() {
        struct Broken;
        impl CandidateSource for Broken {
            fn load(&self) -> Result<Vec<u32>, crate::candidates::CandidateError> {
                Err(crate::candidates::CandidateError::InvalidId {
                    line: 1,
                    value: "x".to_string(),
                })
            }
        }

        let config = HarvestConfig::default();
        let cache = Arc::new(TwoTierCache::new(
            CacheConfig::from(&config),
            Arc::new(MemoryKeyValueStore::new()),
        ));
        let controller = DoramaController::new(
            Arc::new(Harvester::new(Arc::new(MockSeriesCatalog::new()))),
            cache,
            Arc::new(Broken),
            &config,
        );
        let mut rx = controller.subscribe();

        controller.start().await;
        controller.wait().await;

        assert_eq!(rx.recv().await.unwrap().total, 0);
        let status = controller.status().await;
        assert_eq!(status.state, LifecycleState::Completed);
        assert!(status.last_error.unwrap().contains("Invalid candidate id"));
        assert_eq!(status.last_run.unwrap().outcome, RunOutcome::Failed);
    }

    #[tokio::test]
    async fn test_refresh_refetches() {
        let h = harness(dramas(2), vec![1, 2], 2);

        h.controller.start().await;
        h.controller.wait().await;
        assert_eq!(h.catalog.fetch_count().await, 2);

        h.controller.refresh().await;
        h.controller.wait().await;
        assert_eq!(h.catalog.fetch_count().await, 4);
        assert_eq!(h.controller.state().await, LifecycleState::Completed);
    }

    #[tokio::test]
    async fn test_refresh_while_running_harvests_cold() {
        let catalog = dramas(4);
        catalog.hold(1).await;
        let h = harness(catalog, vec![1, 2, 3, 4], 2);

        h.controller.start().await;
        // First group is in flight, held on id 1
        while h.catalog.fetch_count().await < 2 {
            tokio::task::yield_now().await;
        }
        assert_eq!(h.controller.refresh().await, LifecycleState::Running);
        h.catalog.release();
        h.controller.wait().await;

        let status = h.controller.status().await;
        assert_eq!(status.state, LifecycleState::Completed);
        assert_eq!(status.cached_items, 4);
        assert_eq!(status.last_run.unwrap().outcome, RunOutcome::Completed);
        // Two from the cancelled run, all four again from the cold one
        assert_eq!(h.catalog.fetch_count().await, 6);
        assert_eq!(&h.catalog.fetched_ids().await[2..], &[1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_refresh_discards_late_progress_from_replaced_run() {
        let catalog = dramas(4);
        catalog.hold(1).await;
        let h = harness(catalog, vec![1, 2, 3, 4], 2);
        let mut rx = h.controller.subscribe();

        h.controller.start().await;
        while h.catalog.fetch_count().await < 2 {
            tokio::task::yield_now().await;
        }
        h.controller.refresh().await;
        h.catalog.release();
        h.controller.wait().await;

        // Only the cold run's two groups are published
        assert_eq!(rx.recv().await.unwrap().processed, 2);
        assert_eq!(rx.recv().await.unwrap().processed, 4);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_file_candidates_are_reread_on_cold_runs() {
        use crate::candidates::FileCandidateSource;
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "1\n2").unwrap();

        let catalog = Arc::new(dramas(3));
        let config = HarvestConfig {
            batch_size: 2,
            ..Default::default()
        };
        let controller = DoramaController::new(
            Arc::new(Harvester::new(catalog.clone())),
            Arc::new(TwoTierCache::new(
                CacheConfig::from(&config),
                Arc::new(MemoryKeyValueStore::new()),
            )),
            Arc::new(FileCandidateSource::new(file.path())),
            &config,
        );

        controller.start().await;
        controller.wait().await;
        assert_eq!(controller.status().await.cached_items, 2);

        writeln!(file, "3").unwrap();
        controller.refresh().await;
        controller.wait().await;

        assert_eq!(controller.status().await.cached_items, 3);
        assert_eq!(catalog.fetched_ids().await, vec![1, 2, 1, 2, 3]);
    }

    #[tokio::test]
    async fn test_page_reads_snapshot_without_fetching() {
        let h = harness(dramas(5), vec![1, 2, 3, 4, 5], 5);

        assert!(h.controller.page(1).items.is_empty());

        h.controller.start().await;
        h.controller.wait().await;

        let page = h.controller.page(2);
        let ids: Vec<u32> = page.items.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![3, 2]);
        assert_eq!(page.total, 5);
        assert_eq!(h.catalog.fetch_count().await, 5);
    }

    #[tokio::test]
    async fn test_shutdown_pauses_running_harvest() {
        let catalog = dramas(4);
        catalog.hold(1).await;
        let h = harness(catalog, vec![1, 2, 3, 4], 2);

        h.controller.start().await;
        let controller = h.controller.clone();
        let shutdown = tokio::spawn(async move { controller.shutdown().await });
        while h.controller.state().await != LifecycleState::Paused {
            tokio::task::yield_now().await;
        }
        h.catalog.release();
        shutdown.await.unwrap();

        assert_eq!(h.controller.state().await, LifecycleState::Paused);
        assert_eq!(h.catalog.fetch_count().await, 2);
    }
}
