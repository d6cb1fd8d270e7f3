//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the dorama server:
//! - HTTP request metrics (latency, counts, errors)
//! - Access decisions (full vs preview)
//! - WebSocket connection metrics
//! - Harvest lifecycle and cache status (collected dynamically)

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec,
    Opts, Registry, TextEncoder,
};
use tracing::error;

use dorama_core::LifecycleState;

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "dorama_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("dorama_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "dorama_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

/// Access decisions made by the access middleware.
pub static ACCESS_DECISIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "dorama_access_decisions_total",
            "Access level granted per request",
        ),
        &["level"], // "full", "preview", "error"
    )
    .unwrap()
});

// =============================================================================
// WebSocket Metrics
// =============================================================================

/// Active WebSocket connections.
pub static WS_CONNECTIONS_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "dorama_ws_connections_active",
        "Number of active WebSocket connections",
    )
    .unwrap()
});

/// Total WebSocket connections (cumulative).
pub static WS_CONNECTIONS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "dorama_ws_connections_total",
        "Total WebSocket connections since startup",
    )
    .unwrap()
});

/// WebSocket messages sent by type.
pub static WS_MESSAGES_SENT: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("dorama_ws_messages_sent_total", "WebSocket messages sent"),
        &["type"],
    )
    .unwrap()
});

/// WebSocket lag events (when client falls behind).
pub static WS_LAG_EVENTS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "dorama_ws_lag_events_total",
        "WebSocket lag events (client fell behind)",
    )
    .unwrap()
});

// =============================================================================
// Lifecycle Metrics (collected dynamically)
// =============================================================================

/// 1 for the current lifecycle state, 0 for the others.
pub static LIFECYCLE_STATE: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("dorama_lifecycle_state", "Current harvest lifecycle state"),
        &["state"],
    )
    .unwrap()
});

/// Items in the in-process cache tier.
pub static CACHED_ITEMS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "dorama_cached_items",
        "Number of items in the in-process cache",
    )
    .unwrap()
});

/// Whether the persistent cache tier was given up on (1) or not (0).
pub static CACHE_DEGRADED: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "dorama_cache_degraded",
        "Whether persistent cache writes are disabled",
    )
    .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    // HTTP
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();
    registry
        .register(Box::new(ACCESS_DECISIONS.clone()))
        .unwrap();

    // WebSocket
    registry
        .register(Box::new(WS_CONNECTIONS_ACTIVE.clone()))
        .unwrap();
    registry
        .register(Box::new(WS_CONNECTIONS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(WS_MESSAGES_SENT.clone()))
        .unwrap();
    registry.register(Box::new(WS_LAG_EVENTS.clone())).unwrap();

    // Lifecycle
    registry
        .register(Box::new(LIFECYCLE_STATE.clone()))
        .unwrap();
    registry.register(Box::new(CACHED_ITEMS.clone())).unwrap();
    registry
        .register(Box::new(CACHE_DEGRADED.clone()))
        .unwrap();

    // Core metrics (harvester, cache, external services)
    for metric in dorama_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!("Failed to encode metrics: {}", e);
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Collect dynamic metrics from current application state.
///
/// Called before encoding so the lifecycle gauges reflect the controller.
pub async fn collect_dynamic_metrics(state: &crate::state::AppState) {
    let status = state.controller().status().await;

    for candidate in [
        LifecycleState::Idle,
        LifecycleState::Running,
        LifecycleState::Paused,
        LifecycleState::Completed,
    ] {
        LIFECYCLE_STATE
            .with_label_values(&[candidate.as_str()])
            .set(i64::from(candidate == status.state));
    }
    CACHED_ITEMS.set(status.cached_items as i64);
    CACHE_DEGRADED.set(i64::from(status.cache_degraded));
}

/// Normalize a path for metric labels (replace IDs with placeholders).
pub fn normalize_path(path: &str) -> String {
    static NUMERIC: Lazy<regex_lite::Regex> =
        Lazy::new(|| regex_lite::Regex::new(r"/\d+(/|$)").unwrap());

    // Apply twice so adjacent numeric segments are both replaced
    let result = NUMERIC.replace_all(path, "/{id}$1");
    let result = NUMERIC.replace_all(&result, "/{id}$1");
    result.to_string()
}
