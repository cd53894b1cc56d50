//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Search (aggregated searches, failed index queries)
//! - Selection (expired tokens)
//! - Downloads (lifecycle outcomes, uploads)

use once_cell::sync::Lazy;
use prometheus::{IntCounter, IntCounterVec, IntGauge, Opts};

// =============================================================================
// Search Metrics
// =============================================================================

/// Aggregated searches by result.
pub static SEARCHES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("animedl_searches_total", "Total aggregated searches"),
        &["result"], // "ok", "no_results", "failed"
    )
    .unwrap()
});

/// Individual index queries that failed.
pub static INDEX_QUERY_FAILURES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "animedl_index_query_failures_total",
        "Total index queries that failed",
    )
    .unwrap()
});

// =============================================================================
// Selection Metrics
// =============================================================================

/// Button presses whose token was no longer cached.
pub static EXPIRED_SELECTIONS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "animedl_expired_selections_total",
        "Total selections rejected because the token expired",
    )
    .unwrap()
});

// =============================================================================
// Download Metrics
// =============================================================================

/// Download jobs by outcome.
pub static DOWNLOADS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("animedl_downloads_total", "Total download jobs"),
        &["result"], // "started", "completed", "failed"
    )
    .unwrap()
});

/// Jobs that have not reached a terminal state.
pub static ACTIVE_DOWNLOADS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("animedl_active_downloads", "Download jobs in progress").unwrap()
});

/// File uploads by result.
pub static UPLOADS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("animedl_uploads_total", "Total file uploads"),
        &["result"], // "ok", "skipped", "failed"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Search
        Box::new(SEARCHES.clone()),
        Box::new(INDEX_QUERY_FAILURES.clone()),
        // Selection
        Box::new(EXPIRED_SELECTIONS.clone()),
        // Downloads
        Box::new(DOWNLOADS.clone()),
        Box::new(ACTIVE_DOWNLOADS.clone()),
        Box::new(UPLOADS.clone()),
    ]
}
