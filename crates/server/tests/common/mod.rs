//! Common test utilities for in-process API testing.
//!
//! Builds the full router over a mock TMDB catalog and an in-memory
//! persistent tier, so lifecycle and paging can be driven over HTTP without
//! network or disk.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use dorama_core::{
    config::{AccessConfig, AuthConfig, HarvestConfig, ServerConfig, StorageConfig},
    create_authenticator,
    testing::{MemoryKeyValueStore, MockSeriesCatalog},
    AuthMethod, Authenticator, CacheConfig, Config, DoramaController, Harvester, StaticCandidateSource,
    TmdbConfig, TwoTierCache,
};
use dorama_server::api::{create_router, WsBroadcaster};
use dorama_server::state::AppState;

/// Re-export fixtures for test convenience
pub use dorama_core::testing::fixtures;

/// API key accepted when a fixture is built with api_key auth.
pub const TEST_API_KEY: &str = "test-api-key";

/// Test fixture with a mock catalog behind the real router.
pub struct TestFixture {
    pub router: Router,
    pub catalog: Arc<MockSeriesCatalog>,
    pub store: Arc<MemoryKeyValueStore>,
    pub controller: DoramaController,
    pub ws_broadcaster: WsBroadcaster,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

/// Knobs for building a fixture.
pub struct TestConfig {
    pub auth_method: AuthMethod,
    pub candidates: Vec<u32>,
    pub batch_size: usize,
    pub page_size: usize,
    pub preview_items: usize,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            auth_method: AuthMethod::None,
            candidates: Vec::new(),
            batch_size: 2,
            page_size: 3,
            preview_items: 2,
        }
    }
}

impl TestFixture {
    /// Create a fixture whose catalog already holds `items`, with every
    /// item id used as a candidate.
    pub async fn with_items(items: Vec<dorama_core::CatalogItem>) -> Self {
        let candidates = items.iter().map(|item| item.id).collect();
        Self::with_config(
            items,
            TestConfig {
                candidates,
                ..Default::default()
            },
        )
        .await
    }

    pub async fn with_config(items: Vec<dorama_core::CatalogItem>, test_config: TestConfig) -> Self {
        let catalog = Arc::new(MockSeriesCatalog::with_items(items));
        let store = Arc::new(MemoryKeyValueStore::new());

        let auth = AuthConfig {
            api_key: (test_config.auth_method == AuthMethod::ApiKey)
                .then(|| TEST_API_KEY.to_string()),
            method: test_config.auth_method,
        };

        let harvest = HarvestConfig {
            batch_size: test_config.batch_size,
            page_size: test_config.page_size,
            candidates: test_config.candidates.clone(),
            ..Default::default()
        };

        let config = Config {
            auth,
            server: ServerConfig {
                host: std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST),
                port: 0, // Not used for in-process testing
            },
            tmdb: TmdbConfig {
                api_key: "tmdb-test-key".to_string(),
                ..Default::default()
            },
            storage: StorageConfig::default(),
            harvest,
            access: AccessConfig {
                preview_items: test_config.preview_items,
            },
        };

        let authenticator: Arc<dyn Authenticator> = Arc::from(
            create_authenticator(&config.auth).expect("Failed to create authenticator"),
        );
        let cache = Arc::new(TwoTierCache::new(
            CacheConfig::from(&config.harvest),
            store.clone(),
        ));
        let controller = DoramaController::new(
            Arc::new(Harvester::new(catalog.clone())),
            cache,
            Arc::new(StaticCandidateSource::new(test_config.candidates)),
            &config.harvest,
        );
        let ws_broadcaster = WsBroadcaster::default();

        let state = Arc::new(AppState::new(
            config,
            authenticator,
            controller.clone(),
            ws_broadcaster.clone(),
        ));

        Self {
            router: create_router(state),
            catalog,
            store,
            controller,
            ws_broadcaster,
        }
    }

    /// Make a GET request.
    pub async fn get(&self, uri: &str) -> TestResponse {
        self.request("GET", uri, None).await
    }

    /// Make a GET request with an API key header.
    pub async fn get_with_key(&self, uri: &str, key: &str) -> TestResponse {
        self.request("GET", uri, Some(key)).await
    }

    /// Make a POST request with an empty body.
    pub async fn post(&self, uri: &str) -> TestResponse {
        self.request("POST", uri, None).await
    }

    /// Make a POST request with an API key header.
    pub async fn post_with_key(&self, uri: &str, key: &str) -> TestResponse {
        self.request("POST", uri, Some(key)).await
    }

    /// Make a request and return the raw status and body text.
    pub async fn raw_get(&self, uri: &str) -> (StatusCode, String) {
        let request = Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8_lossy(&bytes).to_string())
    }

    async fn request(&self, method: &str, uri: &str, api_key: Option<&str>) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(key) = api_key {
            builder = builder.header("X-API-Key", key);
        }
        let request = builder.body(Body::empty()).unwrap();

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }
}

/// Ids of the items in a page response body.
pub fn item_ids(body: &Value) -> Vec<u64> {
    body["items"]
        .as_array()
        .map(|items| items.iter().filter_map(|item| item["id"].as_u64()).collect())
        .unwrap_or_default()
}
