//! Prometheus metrics for the feed service.

use actix_web::HttpResponse;
use once_cell::sync::Lazy;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, Encoder, HistogramVec,
    IntCounter, IntCounterVec, TextEncoder,
};
use std::time::Duration;

static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "feed_http_request_duration_seconds",
        "HTTP request latency by method, path, and status",
        &["method", "path", "status"],
        vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]
    )
    .expect("Failed to register HTTP request metric")
});

static PAGE_CACHE_LOOKUPS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "feed_page_cache_lookups_total",
        "Assembled-page cache lookups by result (hit/miss)",
        &["result"]
    )
    .expect("Failed to register page cache metric")
});

static FANOUT_ENTRIES: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "feed_fanout_entries_total",
        "Feed index entries written by the fan-out indexer"
    )
    .expect("Failed to register fanout entries metric")
});

static FANOUT_FAILURES: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "feed_fanout_failures_total",
        "Per-follower index inserts that failed and were skipped"
    )
    .expect("Failed to register fanout failures metric")
});

static CANDIDATES_SKIPPED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "feed_candidates_skipped_total",
        "Feed candidates dropped during hydration (missing/unparsable)"
    )
    .expect("Failed to register skipped candidates metric")
});

pub fn observe_http_request(method: &str, path: &str, status: u16, elapsed: Duration) {
    HTTP_REQUEST_DURATION
        .with_label_values(&[method, path, &status.to_string()])
        .observe(elapsed.as_secs_f64());
}

pub fn record_page_cache(result: &str) {
    PAGE_CACHE_LOOKUPS.with_label_values(&[result]).inc();
}

pub fn record_fanout_entry() {
    FANOUT_ENTRIES.inc();
}

pub fn record_fanout_failure() {
    FANOUT_FAILURES.inc();
}

pub fn record_candidate_skipped() {
    CANDIDATES_SKIPPED.inc();
}

/// Text exposition endpoint.
pub async fn serve_metrics() -> HttpResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return HttpResponse::InternalServerError().body(format!("metrics encoding failed: {e}"));
    }

    HttpResponse::Ok()
        .content_type(encoder.format_type())
        .body(buffer)
}
