//! Metrics and observability utilities
//!
//! Metric names share the `contentforge` prefix. Recording goes through the
//! `metrics` facade; the service binary installs the Prometheus recorder.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all ContentForge metrics
pub const METRICS_PREFIX: &str = "contentforge";

/// Histogram buckets for control API latency (in seconds)
pub const LATENCY_BUCKETS: &[f64] = &[
    0.001, // 1ms
    0.005, // 5ms
    0.010, // 10ms
    0.025, // 25ms
    0.050, // 50ms
    0.100, // 100ms
    0.250, // 250ms
    0.500, // 500ms
    1.000, // 1s
    5.000, // 5s
];

/// Buckets for article generation, which produces full bodies
pub const GENERATION_BUCKETS: &[f64] = &[
    1.0, 2.5, 5.0, 10.0, 20.0, 30.0, 45.0, 60.0, 90.0, 120.0, 180.0,
];

fn name(suffix: &str) -> String {
    format!("{}_{}", METRICS_PREFIX, suffix)
}

/// Register all metric descriptions
pub fn register_metrics() {
    describe_counter!(name("requests_total"), Unit::Count, "Total number of HTTP requests");

    describe_histogram!(
        name("request_duration_seconds"),
        Unit::Seconds,
        "HTTP request latency in seconds"
    );

    describe_counter!(
        name("articles_generated_total"),
        Unit::Count,
        "Articles generated and stored"
    );

    describe_counter!(
        name("generation_errors_total"),
        Unit::Count,
        "Failed generation calls by error kind"
    );

    describe_histogram!(
        name("generation_duration_seconds"),
        Unit::Seconds,
        "Article generation latency in seconds"
    );

    describe_counter!(
        name("index_submissions_total"),
        Unit::Count,
        "Index notifications by outcome"
    );

    describe_counter!(
        name("batches_completed_total"),
        Unit::Count,
        "Keyword batches that reached completed"
    );

    describe_gauge!(
        name("batches_pending"),
        Unit::Count,
        "Batches still pending or processing"
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
            name("requests_total"),
            "method" => self.method.clone(),
            "endpoint" => self.endpoint.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            name("request_duration_seconds"),
            "method" => self.method,
            "endpoint" => self.endpoint
        )
        .record(duration);
    }
}

pub fn record_article_generated(category_id: &str) {
    counter!(name("articles_generated_total"), "category" => category_id.to_string()).increment(1);
}

pub fn record_generation_error(kind: &'static str) {
    counter!(name("generation_errors_total"), "kind" => kind).increment(1);
}

pub fn record_generation_latency(duration_secs: f64) {
    histogram!(name("generation_duration_seconds")).record(duration_secs);
}

pub fn record_index_submission(success: bool) {
    let status = if success { "success" } else { "error" };
    counter!(name("index_submissions_total"), "status" => status).increment(1);
}

pub fn record_batch_completed() {
    counter!(name("batches_completed_total")).increment(1);
}

pub fn set_batches_pending(count: usize) {
    gauge!(name("batches_pending")).set(count as f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buckets_sorted() {
        for buckets in [LATENCY_BUCKETS, GENERATION_BUCKETS] {
            assert!(buckets.windows(2).all(|w| w[0] < w[1]));
        }
        assert_eq!(name("batches_pending"), "contentforge_batches_pending");
    }

    #[test]
    fn test_recorders_without_exporter() {
        // No recorder installed; the facade drops everything
        let metrics = RequestMetrics::start("GET", "/v1/batches");
        metrics.finish(200);
        record_generation_error("rate_limited");
        record_index_submission(false);
        set_batches_pending(3);
    }
}
