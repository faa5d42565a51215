//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the keycheck server:
//! - HTTP request metrics (latency, counts, in flight)
//! - Mailbox record counts (collected at scrape time)
//! - Core handshake and janitor metrics (registered from `keycheck_core`)

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, IntGaugeVec, Opts,
    Registry, TextEncoder,
};
use tracing::warn;

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
///
/// Verification requests can legitimately wait for the whole handshake
/// timeout, hence the long upper buckets.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "keycheck_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 20.0, 30.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("keycheck_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "keycheck_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// Mailbox Metrics (collected dynamically)
// =============================================================================

/// Records currently in the mailbox directory by kind.
pub static MAILBOX_RECORDS: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("keycheck_mailbox_records", "Records currently in the mailbox"),
        &["kind"], // "ticket", "verdict", "partial"
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

    // Mailbox
    registry
        .register(Box::new(MAILBOX_RECORDS.clone()))
        .unwrap();

    // Core metrics (handshake, janitor)
    for metric in keycheck_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}

/// Collect dynamic metrics from current application state.
pub async fn collect_dynamic_metrics(state: &crate::state::AppState) {
    match state.mailbox().census().await {
        Ok(census) => {
            MAILBOX_RECORDS
                .with_label_values(&["ticket"])
                .set(census.tickets as i64);
            MAILBOX_RECORDS
                .with_label_values(&["verdict"])
                .set(census.verdicts as i64);
            MAILBOX_RECORDS
                .with_label_values(&["partial"])
                .set(census.partial as i64);
        }
        Err(e) => warn!("Failed to count mailbox records: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_contains_core_metrics() {
        HTTP_REQUESTS_TOTAL
            .with_label_values(&["GET", "/api/v1/health", "200"])
            .inc();
        keycheck_core::metrics::TICKETS_SUBMITTED.inc_by(0);

        let text = encode_metrics();
        assert!(text.contains("keycheck_http_requests_total"));
        assert!(text.contains("keycheck_tickets_submitted_total"));
    }
}
