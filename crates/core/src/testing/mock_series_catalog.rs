//! Mock series catalog for testing.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock};

use crate::external_catalog::{CatalogItem, ExternalCatalogError, SeriesCatalog};

/// Mock implementation of the SeriesCatalog trait.
///
/// Provides controllable behavior for testing:
/// - Serve configured detail records by id
/// - Fail specific ids with an HTTP-like status
/// - Record every requested id
/// - Hold chosen ids until released, to pin a run mid-flight
///
/// # Example
///
/// ```rust,ignore
/// use dorama_core::testing::{MockSeriesCatalog, fixtures};
///
/// let catalog = MockSeriesCatalog::with_items(vec![fixtures::korean_drama(1, 10.0)]);
/// catalog.fail_with(2, 500).await;
///
/// assert!(catalog.fetch_detail(1).await.is_ok());
/// assert_eq!(catalog.fetched_ids().await, vec![1]);
/// ```
#[derive(Debug)]
pub struct MockSeriesCatalog {
    items: Arc<RwLock<HashMap<u32, CatalogItem>>>,
    /// Status code to fail each id with.
    failures: Arc<RwLock<HashMap<u32, u16>>>,
    fetched: Arc<RwLock<Vec<u32>>>,
    held: Arc<RwLock<HashSet<u32>>>,
    released: watch::Sender<bool>,
    delay: Arc<RwLock<Option<Duration>>>,
}

impl Default for MockSeriesCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSeriesCatalog {
    /// Create an empty mock catalog. Every id is "not found".
    pub fn new() -> Self {
        let (released, _) = watch::channel(false);
        Self {
            items: Arc::new(RwLock::new(HashMap::new())),
            failures: Arc::new(RwLock::new(HashMap::new())),
            fetched: Arc::new(RwLock::new(Vec::new())),
            held: Arc::new(RwLock::new(HashSet::new())),
            released,
            delay: Arc::new(RwLock::new(None)),
        }
    }

    /// Create a mock catalog serving the given items.
    pub fn with_items(items: Vec<CatalogItem>) -> Self {
        let map = items.into_iter().map(|item| (item.id, item)).collect();
        Self {
            items: Arc::new(RwLock::new(map)),
            ..Self::new()
        }
    }

    /// Add or replace a detail record.
    pub async fn add_item(&self, item: CatalogItem) {
        self.items.write().await.insert(item.id, item);
    }

    /// Make `id` fail with the error matching `status` (404, 429, or other).
    pub async fn fail_with(&self, id: u32, status: u16) {
        self.failures.write().await.insert(id, status);
    }

    /// Sleep this long before answering each request.
    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.write().await = Some(delay);
    }

    /// Block requests for `id` until [`Self::release`] is called.
    pub async fn hold(&self, id: u32) {
        self.held.write().await.insert(id);
    }

    /// Let held requests complete.
    pub fn release(&self) {
        self.released.send_replace(true);
    }

    /// Ids requested so far, in request order.
    pub async fn fetched_ids(&self) -> Vec<u32> {
        self.fetched.read().await.clone()
    }

    /// Number of requests issued so far.
    pub async fn fetch_count(&self) -> usize {
        self.fetched.read().await.len()
    }

    fn error_for(id: u32, status: u16) -> ExternalCatalogError {
        match status {
            404 => ExternalCatalogError::NotFound(format!("TV series {}", id)),
            429 => ExternalCatalogError::RateLimitExceeded,
            status => ExternalCatalogError::ApiError {
                status,
                message: format!("mock failure for {}", id),
            },
        }
    }
}

#[async_trait]
impl SeriesCatalog for MockSeriesCatalog {
    async fn fetch_detail(&self, id: u32) -> Result<CatalogItem, ExternalCatalogError> {
        self.fetched.write().await.push(id);

        if self.held.read().await.contains(&id) {
            let mut released = self.released.subscribe();
            // The sender lives in self, so this only errors if self is gone.
            let _ = released.wait_for(|released| *released).await;
        }

        let delay = *self.delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(status) = self.failures.read().await.get(&id) {
            return Err(Self::error_for(id, *status));
        }

        self.items
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| Self::error_for(id, 404))
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
