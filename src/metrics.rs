use crate::error::{Error, Result};
use prometheus::{
    register_counter_vec, register_histogram, register_histogram_vec, CounterVec, Encoder,
    Histogram, HistogramVec, TextEncoder,
};
use std::time::Instant;

// Registration only fails on a duplicate name; the recorder then skips the metric.
lazy_static::lazy_static! {
    static ref ROUTE_COUNTER: Option<CounterVec> = register_counter_vec!(
        "sqlshard_routes_total",
        "Total number of routed statements",
        &["category", "status"]
    ).ok();

    static ref ROUTE_LATENCY: Option<HistogramVec> = register_histogram_vec!(
        "sqlshard_route_rewrite_duration_seconds",
        "Route and rewrite latency in seconds",
        &["category"],
        vec![0.00001, 0.00005, 0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05]
    ).ok();

    static ref ROUTE_UNITS: Option<Histogram> = register_histogram!(
        "sqlshard_route_units",
        "Number of route units per statement",
        vec![1.0, 2.0, 4.0, 8.0, 16.0, 32.0, 64.0, 128.0]
    ).ok();

    static ref REWRITE_RESULTS: Option<CounterVec> = register_counter_vec!(
        "sqlshard_rewrites_total",
        "Total number of rewrite results by shape",
        &["shape"]
    ).ok();
}

/// Records into the process-wide prometheus registry. Whether it records is
/// fixed at construction.
#[derive(Debug, Clone, Copy)]
pub struct MetricsRecorder {
    enabled: bool,
}

impl MetricsRecorder {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Starts timing one statement. The guard records a failure unless completed.
    pub fn record_route(&self) -> RouteGuard {
        RouteGuard::new(self.enabled)
    }

    pub fn record_units(&self, units: usize) {
        if self.enabled {
            if let Some(histogram) = ROUTE_UNITS.as_ref() {
                histogram.observe(units as f64);
            }
        }
    }

    pub fn record_rewrite(&self, identity: bool) {
        if self.enabled {
            if let Some(counter) = REWRITE_RESULTS.as_ref() {
                let shape = if identity { "identity" } else { "route_units" };
                counter.with_label_values(&[shape]).inc();
            }
        }
    }

    // Export metrics in Prometheus format
    pub fn export(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = prometheus::gather();
        let mut buffer = Vec::new();

        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|e| Error::Serialization(format!("Failed to encode metrics: {}", e)))?;

        String::from_utf8(buffer).map_err(|e| {
            Error::Serialization(format!("Failed to convert metrics to string: {}", e))
        })
    }
}

pub struct RouteGuard {
    start: Instant,
    enabled: bool,
    completed: bool,
}

impl RouteGuard {
    fn new(enabled: bool) -> Self {
        Self {
            start: Instant::now(),
            enabled,
            completed: false,
        }
    }

    pub fn complete(mut self, category: &str, success: bool) {
        self.completed = true;
        if self.enabled {
            observe(category, success, self.start.elapsed().as_secs_f64());
        }
    }
}

impl Drop for RouteGuard {
    fn drop(&mut self) {
        if !self.completed && self.enabled {
            observe("unknown", false, self.start.elapsed().as_secs_f64());
        }
    }
}

fn observe(category: &str, success: bool, seconds: f64) {
    if let Some(latency) = ROUTE_LATENCY.as_ref() {
        latency.with_label_values(&[category]).observe(seconds);
    }
    if let Some(counter) = ROUTE_COUNTER.as_ref() {
        let status = if success { "success" } else { "failure" };
        counter.with_label_values(&[category, status]).inc();
    }
}
