//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Harvester (groups, fetch outcomes, classifier rejections)
//! - Two-tier cache (lookups per tier, persistent write degradation)
//! - External services (TMDB)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Harvester Metrics
// =============================================================================

/// Harvest runs by outcome.
pub static HARVEST_RUNS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("dorama_harvest_runs_total", "Total harvest runs"),
        &["outcome"], // "cache_hit", "completed", "cancelled", "failed"
    )
    .unwrap()
});

/// Candidate groups processed.
pub static HARVEST_GROUPS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "dorama_harvest_groups_total",
        "Total candidate groups fetched",
    )
    .unwrap()
});

/// Detail fetch outcomes as seen by the harvester.
pub static DETAIL_FETCHES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("dorama_detail_fetches_total", "Detail fetches by result"),
        &["result"], // "found", "not_found", "error"
    )
    .unwrap()
});

/// Fetched items the classifier turned away.
pub static CLASSIFIER_REJECTIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "dorama_classifier_rejections_total",
            "Fetched items rejected by the classifier",
        ),
        &["reason"], // "not_korean_drama", "no_artwork"
    )
    .unwrap()
});

// =============================================================================
// Cache Metrics
// =============================================================================

/// Cache lookups per tier and result.
pub static CACHE_LOOKUPS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("dorama_cache_lookups_total", "Cache lookups"),
        &["tier", "result"], // tier: "memory", "persistent"; result: "hit", "stale", "miss"
    )
    .unwrap()
});

/// Persistent tier write failures by escalation stage.
pub static CACHE_WRITE_FAILURES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "dorama_cache_write_failures_total",
            "Persistent cache write failures",
        ),
        &["stage"], // "initial", "after_remove", "after_clear"
    )
    .unwrap()
});

// =============================================================================
// External Service Metrics
// =============================================================================

/// External service request duration.
pub static EXTERNAL_SERVICE_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "dorama_external_service_duration_seconds",
            "Duration of external service calls",
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        &["service", "operation"],
    )
    .unwrap()
});

/// External service requests total.
pub static EXTERNAL_SERVICE_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "dorama_external_service_requests_total",
            "Total external service requests",
        ),
        &["service", "operation", "status"], // status: "success", "not_found", "error"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Harvester
        Box::new(HARVEST_RUNS.clone()),
        Box::new(HARVEST_GROUPS.clone()),
        Box::new(DETAIL_FETCHES.clone()),
        Box::new(CLASSIFIER_REJECTIONS.clone()),
        // Cache
        Box::new(CACHE_LOOKUPS.clone()),
        Box::new(CACHE_WRITE_FAILURES.clone()),
        // External services
        Box::new(EXTERNAL_SERVICE_DURATION.clone()),
        Box::new(EXTERNAL_SERVICE_REQUESTS.clone()),
    ]
}
