// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Prometheus metrics for the Cloud DNS sync controller.
//!
//! Metric names keep the `estafette_google_cloud_dns_` prefix so existing
//! dashboards and alerts continue to work.
//!
//! # Example
//!
//! ```rust,no_run
//! use cloud_dns_sync::metrics::{OutcomeRecorder, PrometheusRecorder};
//!
//! PrometheusRecorder.record_outcome("default", "succeeded", "watcher", "service");
//! ```

use prometheus::{CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};
use std::sync::LazyLock;
use std::time::Duration;

// ============================================================================
// Metric Name Constants
// ============================================================================

/// Namespace prefix for all metrics (prometheus-safe)
const METRICS_NAMESPACE: &str = "estafette_google_cloud_dns";

// ============================================================================
// Global Metrics Registry
// ============================================================================

/// Global Prometheus metrics registry
///
/// All metrics are registered in this registry and exposed via `/metrics` endpoint.
pub static METRICS_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// ============================================================================
// Reconciliation Metrics
// ============================================================================

/// Number of reconciliations per outcome
///
/// Labels:
/// - `namespace`: Namespace of the Service or Ingress
/// - `status`: `skipped`, `succeeded` or `failed`
/// - `initiator`: `watcher` or `poller`
/// - `type`: `service` or `ingress`
pub static RECORD_TOTALS: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_record_totals"),
        "Number of updated Google Cloud dns records.",
    );
    let counter = CounterVec::new(opts, &["namespace", "status", "initiator", "type"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Duration of reconciliations in seconds
///
/// Labels:
/// - `type`: `service` or `ingress`
pub static RECONCILE_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_reconcile_duration_seconds"),
        "Duration of reconciliations in seconds by resource type",
    )
    .buckets(vec![0.001, 0.01, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]);
    let histogram = HistogramVec::new(opts, &["type"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(histogram.clone()))
        .unwrap();
    histogram
});

// ============================================================================
// Outcome Recording
// ============================================================================

/// Sink for reconciliation outcomes.
///
/// Shared by all trigger loops, so implementations must tolerate concurrent calls.
pub trait OutcomeRecorder: Send + Sync {
    /// Count one reconciliation outcome.
    fn record_outcome(&self, namespace: &str, status: &str, initiator: &str, kind: &str);

    /// Observe how long one reconciliation took.
    fn record_duration(&self, kind: &str, duration: Duration);
}

/// [`OutcomeRecorder`] backed by the global registry.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrometheusRecorder;

impl OutcomeRecorder for PrometheusRecorder {
    fn record_outcome(&self, namespace: &str, status: &str, initiator: &str, kind: &str) {
        RECORD_TOTALS
            .with_label_values(&[namespace, status, initiator, kind])
            .inc();
    }

    fn record_duration(&self, kind: &str, duration: Duration) {
        RECONCILE_DURATION_SECONDS
            .with_label_values(&[kind])
            .observe(duration.as_secs_f64());
    }
}

/// Gather and encode all metrics in Prometheus text format
///
/// # Returns
/// Prometheus-formatted metrics as a String
///
/// # Errors
/// Returns error if encoding fails
pub fn gather_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = METRICS_REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(format!("UTF-8 error: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_outcome_increments_counter() {
        let labels = ["metrics-test", "succeeded", "watcher", "service"];
        let before = RECORD_TOTALS.with_label_values(&labels).get();

        PrometheusRecorder.record_outcome(labels[0], labels[1], labels[2], labels[3]);
        PrometheusRecorder.record_outcome(labels[0], labels[1], labels[2], labels[3]);

        let after = RECORD_TOTALS.with_label_values(&labels).get();
        #[allow(clippy::float_cmp)]
        {
            assert_eq!(after - before, 2.0);
        }
    }

    #[test]
    fn test_record_duration() {
        PrometheusRecorder.record_duration("duration-test", Duration::from_millis(250));

        let histogram = RECONCILE_DURATION_SECONDS.with_label_values(&["duration-test"]);
        assert!(histogram.get_sample_count() > 0);
    }

    #[test]
    fn test_gather_metrics() {
        // Record some metrics to initialize them
        PrometheusRecorder.record_outcome("gather-test", "failed", "poller", "ingress");

        let result = gather_metrics();
        assert!(result.is_ok(), "Gathering metrics should succeed");

        let metrics_text = result.unwrap();
        assert!(
            metrics_text.contains("estafette_google_cloud_dns_record_totals"),
            "Metrics should contain the record counter"
        );
        assert!(metrics_text.contains(r#"namespace="gather-test""#));
        assert!(metrics_text.contains(r#"initiator="poller""#));
    }
}
