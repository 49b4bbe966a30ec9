//! Metrics collection for observability

use prometheus::{
    CounterVec, HistogramVec, Opts, Registry,
    register_counter_vec_with_registry, register_histogram_vec_with_registry,
};
use std::sync::Arc;
use once_cell::sync::Lazy;

/// Global metrics registry
pub static METRICS: Lazy<Arc<Metrics>> = Lazy::new(|| {
    Arc::new(Metrics::new().expect("Failed to initialize metrics"))
});

/// Metrics collector
pub struct Metrics {
    registry: Registry,

    // Query surface metrics
    pub query_requests: CounterVec,
    pub canned_answers: CounterVec,
    pub mcp_requests: CounterVec,

    // Backend call metrics
    pub retrieval_duration: HistogramVec,
    pub generation_duration: HistogramVec,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let query_requests = register_counter_vec_with_registry!(
            Opts::new("twin_query_requests_total", "Total questions answered per surface"),
            &["surface", "status"],
            registry
        )?;

        let canned_answers = register_counter_vec_with_registry!(
            Opts::new("twin_canned_answers_total", "Answers returned without calling the generator"),
            &["reason"],
            registry
        )?;

        let mcp_requests = register_counter_vec_with_registry!(
            Opts::new("twin_mcp_requests_total", "Total command-protocol requests by method"),
            &["method"],
            registry
        )?;

        let retrieval_duration = register_histogram_vec_with_registry!(
            "twin_retrieval_duration_seconds",
            "Fact retrieval duration in seconds",
            &["backend"],
            registry
        )?;

        let generation_duration = register_histogram_vec_with_registry!(
            "twin_generation_duration_seconds",
            "Language model call duration in seconds",
            &["profile"],
            registry
        )?;

        Ok(Self {
            registry,
            query_requests,
            canned_answers,
            mcp_requests,
            retrieval_duration,
            generation_duration,
        })
    }

    /// Get the metrics registry for exporting
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Record an answered (or failed) question
    pub fn record_query(&self, surface: &str, success: bool) {
        let status = if success { "success" } else { "error" };
        self.query_requests.with_label_values(&[surface, status]).inc();
    }

    /// Record a short-circuited answer
    pub fn record_canned(&self, reason: &str) {
        self.canned_answers.with_label_values(&[reason]).inc();
    }

    /// Record a command-protocol request
    pub fn record_mcp(&self, method: &str) {
        self.mcp_requests.with_label_values(&[method]).inc();
    }

    /// Export metrics in Prometheus text format
    pub fn export_prometheus(&self) -> String {
        use prometheus::Encoder;

        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();

        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer).unwrap_or_default();

        String::from_utf8(buffer).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_initialization() {
        let metrics = Metrics::new();
        assert!(metrics.is_ok());
    }

    #[test]
    fn test_export_contains_recorded_series() {
        let metrics = Metrics::new().unwrap();
        metrics.record_query("http", true);
        metrics.record_canned("no_results");
        metrics.record_mcp("initialize");
        metrics
            .retrieval_duration
            .with_label_values(&["keyword"])
            .observe(0.01);

        let text = metrics.export_prometheus();
        assert!(text.contains("twin_query_requests_total"));
        assert!(text.contains("twin_canned_answers_total"));
        assert!(text.contains("twin_mcp_requests_total"));
        assert!(text.contains("twin_retrieval_duration_seconds"));
    }
}
