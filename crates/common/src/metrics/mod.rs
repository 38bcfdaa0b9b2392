//! Metrics and observability utilities
//!
//! Prometheus metrics through the `metrics` facade. Recording is a no-op
//! until a recorder is installed, so library code can record freely.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all VeriNews metrics
pub const METRICS_PREFIX: &str = "verinews";

/// Histogram buckets for request latency (in seconds)
pub const LATENCY_BUCKETS: &[f64] = &[
    0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.00,
];

/// Buckets for classification latency; the model call dominates
pub const CLASSIFICATION_BUCKETS: &[f64] = &[
    0.100, 0.250, 0.500, 1.000, 2.000, 5.000, 10.00, 30.00, 60.00,
];

/// Register all metric descriptions
pub fn register_metrics() {
    describe_counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of HTTP requests"
    );

    describe_histogram!(
        format!("{}_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "HTTP request latency in seconds"
    );

    describe_counter!(
        format!("{}_classifications_total", METRICS_PREFIX),
        Unit::Count,
        "Classification requests relayed to the model service"
    );

    describe_histogram!(
        format!("{}_classification_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Classification round-trip latency in seconds"
    );

    describe_counter!(
        format!("{}_news_saved_total", METRICS_PREFIX),
        Unit::Count,
        "News articles saved, by predicted label"
    );

    describe_counter!(
        format!("{}_reports_submitted_total", METRICS_PREFIX),
        Unit::Count,
        "Reports submitted against classifications"
    );

    describe_counter!(
        format!("{}_moderation_transitions_total", METRICS_PREFIX),
        Unit::Count,
        "Admin verdicts recorded, by resulting status"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record request metrics
pub struct RequestMetrics {
    start: Instant,
    endpoint: String,
    method: String,
}

impl RequestMetrics {
    /// Start tracking a request
    pub fn start(method: &str, endpoint: &str) -> Self {
        Self {
            start: Instant::now(),
            endpoint: endpoint.to_string(),
            method: method.to_string(),
        }
    }

    /// Record request completion
    pub fn finish(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            format!("{}_requests_total", METRICS_PREFIX),
            "method" => self.method.clone(),
            "endpoint" => self.endpoint.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            format!("{}_request_duration_seconds", METRICS_PREFIX),
            "method" => self.method,
            "endpoint" => self.endpoint
        )
        .record(duration);
    }
}

/// Record one classification round trip
pub fn record_classification(duration_secs: f64, provider: &str, success: bool) {
    let outcome = if success { "success" } else { "error" };

    counter!(
        format!("{}_classifications_total", METRICS_PREFIX),
        "provider" => provider.to_string(),
        "outcome" => outcome
    )
    .increment(1);

    histogram!(
        format!("{}_classification_duration_seconds", METRICS_PREFIX),
        "provider" => provider.to_string()
    )
    .record(duration_secs);
}

pub fn record_news_saved(label: &str) {
    counter!(
        format!("{}_news_saved_total", METRICS_PREFIX),
        "label" => label.to_string()
    )
    .increment(1);
}

pub fn record_report_submitted() {
    counter!(format!("{}_reports_submitted_total", METRICS_PREFIX)).increment(1);
}

pub fn record_moderation(status: &str) {
    counter!(
        format!("{}_moderation_transitions_total", METRICS_PREFIX),
        "status" => status.to_string()
    )
    .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buckets_sorted() {
        for buckets in [LATENCY_BUCKETS, CLASSIFICATION_BUCKETS] {
            assert!(buckets.windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn test_recording_without_recorder() {
        let metrics = RequestMetrics::start("GET", "/api/news/{id}");
        metrics.finish(200);
        record_classification(0.2, "mock", true);
        record_news_saved("Fake");
        record_report_submitted();
        record_moderation("rejected");
    }
}
