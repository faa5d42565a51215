//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Ticket submission and handshake outcomes
//! - Abandoned handshakes and protocol anomalies
//! - Janitor sweeps

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts};

// =============================================================================
// Handshake Metrics
// =============================================================================

/// Tickets published to the mailbox.
pub static TICKETS_SUBMITTED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "keycheck_tickets_submitted_total",
        "Total tickets published to the mailbox",
    )
    .unwrap()
});

/// Verification requests by outcome.
pub static HANDSHAKE_OUTCOMES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "keycheck_handshake_outcomes_total",
            "Verification requests by outcome",
        ),
        &["outcome"], // "rejected", "valid", "invalid", "timed_out", "malformed", "error"
    )
    .unwrap()
});

/// Time from ticket publication to outcome.
pub static HANDSHAKE_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "keycheck_handshake_duration_seconds",
            "Time from ticket publication to verdict or timeout",
        )
        .buckets(vec![0.1, 0.25, 0.5, 1.0, 2.0, 5.0, 10.0, 15.0, 20.0, 30.0]),
        &["outcome"],
    )
    .unwrap()
});

/// Handshakes currently waiting on a verdict.
pub static HANDSHAKES_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "keycheck_handshakes_in_flight",
        "Handshakes currently waiting on a verdict",
    )
    .unwrap()
});

/// Handshakes dropped before reaching an outcome (client went away).
pub static HANDSHAKES_ABANDONED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "keycheck_handshakes_abandoned_total",
        "Handshakes dropped before an outcome was reached",
    )
    .unwrap()
});

/// Verdicts observed while their ticket still existed.
pub static VERDICT_ANOMALIES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "keycheck_verdict_anomalies_total",
        "Verdicts observed before their ticket was removed",
    )
    .unwrap()
});

// =============================================================================
// Janitor Metrics
// =============================================================================

/// Orphaned records removed by the janitor.
pub static JANITOR_REMOVED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "keycheck_janitor_removed_total",
            "Orphaned mailbox records removed",
        ),
        &["kind"], // "ticket", "verdict", "staging", "claimed"
    )
    .unwrap()
});

/// Completed janitor sweeps.
pub static JANITOR_SWEEPS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("keycheck_janitor_sweeps_total", "Janitor sweeps by result"),
        &["result"], // "ok", "error"
    )
    .unwrap()
});

/// All core metrics, for registration in the server's registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Handshake
        Box::new(TICKETS_SUBMITTED.clone()),
        Box::new(HANDSHAKE_OUTCOMES.clone()),
        Box::new(HANDSHAKE_DURATION.clone()),
        Box::new(HANDSHAKES_IN_FLIGHT.clone()),
        Box::new(HANDSHAKES_ABANDONED.clone()),
        Box::new(VERDICT_ANOMALIES.clone()),
        // Janitor
        Box::new(JANITOR_REMOVED.clone()),
        Box::new(JANITOR_SWEEPS.clone()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_metrics_register() {
        let registry = prometheus::Registry::new();
        for metric in all_metrics() {
            registry.register(metric).unwrap();
        }
        HANDSHAKE_OUTCOMES.with_label_values(&["valid"]).inc();
        let families = registry.gather();
        assert!(families
            .iter()
            .any(|f| f.get_name() == "keycheck_handshake_outcomes_total"));
    }
}
