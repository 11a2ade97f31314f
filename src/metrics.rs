//! Metrics collection and export module

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::time::Instant;

/// Global metrics registry
pub struct Metrics {
    registry: Registry,

    // Counters
    pub transactions_built: IntCounter,
    pub submissions_total: IntCounter,
    pub submissions_confirmed: IntCounter,
    pub submissions_failed: IntCounterVec,

    // Histograms
    pub build_latency: Histogram,
    pub confirm_latency: Histogram,
    pub rpc_latency: Histogram,
}

impl Metrics {
    /// Create new metrics instance
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let transactions_built = IntCounter::with_opts(Opts::new(
            "transactions_built_total",
            "Number of unsigned transfer transactions built",
        ))?;

        let submissions_total = IntCounter::with_opts(Opts::new(
            "submissions_total",
            "Number of transactions handed to the confirmation workflow",
        ))?;

        let submissions_confirmed = IntCounter::with_opts(Opts::new(
            "submissions_confirmed",
            "Number of transactions confirmed successfully",
        ))?;

        let submissions_failed = IntCounterVec::new(
            Opts::new("submissions_failed", "Failed submissions by error category"),
            &["category"],
        )?;

        let build_latency = Histogram::with_opts(
            HistogramOpts::new("build_latency_seconds", "Transaction build latency")
                .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.0]),
        )?;

        let confirm_latency = Histogram::with_opts(
            HistogramOpts::new("confirm_latency_seconds", "Broadcast to confirmation latency")
                .buckets(vec![0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]),
        )?;

        let rpc_latency = Histogram::with_opts(
            HistogramOpts::new("rpc_latency_seconds", "RPC call latency")
                .buckets(vec![0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
        )?;

        // Register all metrics
        registry.register(Box::new(transactions_built.clone()))?;
        registry.register(Box::new(submissions_total.clone()))?;
        registry.register(Box::new(submissions_confirmed.clone()))?;
        registry.register(Box::new(submissions_failed.clone()))?;
        registry.register(Box::new(build_latency.clone()))?;
        registry.register(Box::new(confirm_latency.clone()))?;
        registry.register(Box::new(rpc_latency.clone()))?;

        Ok(Self {
            registry,
            transactions_built,
            submissions_total,
            submissions_confirmed,
            submissions_failed,
            build_latency,
            confirm_latency,
            rpc_latency,
        })
    }

    pub fn record_failure(&self, category: &str) {
        self.submissions_failed.with_label_values(&[category]).inc();
    }

    /// Render the registry in the Prometheus text format
    pub fn render(&self) -> anyhow::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Global metrics instance
pub fn metrics() -> &'static Metrics {
    static METRICS: once_cell::sync::Lazy<Metrics> =
        once_cell::sync::Lazy::new(|| Metrics::new().expect("Failed to initialize metrics"));
    &METRICS
}

/// Timer that records into a named latency histogram on `finish`
pub struct Timer {
    start: Instant,
    histogram_name: &'static str,
}

impl Timer {
    pub fn with_name(histogram_name: &'static str) -> Self {
        Self {
            start: Instant::now(),
            histogram_name,
        }
    }

    /// Finish the timer and record to the associated histogram
    pub fn finish(self) {
        let duration = self.start.elapsed().as_secs_f64();
        match self.histogram_name {
            "build_latency_seconds" => metrics().build_latency.observe(duration),
            "confirm_latency_seconds" => metrics().confirm_latency.observe(duration),
            "rpc_latency_seconds" => metrics().rpc_latency.observe(duration),
            name => tracing::debug!("Unknown histogram name: {}", name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_contains_registered_families() {
        let m = Metrics::new().unwrap();
        m.transactions_built.inc();
        m.record_failure("timeout");

        let text = m.render().unwrap();
        assert!(text.contains("transactions_built_total 1"));
        assert!(text.contains("submissions_failed{category=\"timeout\"} 1"));
    }

    #[test]
    fn test_timer_records_histogram() {
        let before = metrics().build_latency.get_sample_count();
        Timer::with_name("build_latency_seconds").finish();
        assert!(metrics().build_latency.get_sample_count() > before);
    }
}
