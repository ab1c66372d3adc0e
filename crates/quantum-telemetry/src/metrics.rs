//! Prometheus metrics for Quantum-Chain tooling.
//!
//! All metrics follow the naming convention: `qc_<component>_<metric>_<unit>`
//!
//! ## Metric Types
//!
//! - **Counter**: Monotonically increasing value (e.g., keys_generated_total)
//! - **Histogram**: Distribution of values (e.g., network_duration_seconds)

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, Counter, CounterVec, Encoder, Histogram, HistogramOpts, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // PROVISIONING METRICS
    // =========================================================================

    /// Nodes whose config tree was written, by role
    pub static ref NODES_PROVISIONED: CounterVec = CounterVec::new(
        Opts::new("qc_provisioning_nodes_total", "Nodes provisioned by role"),
        &["role"]
    ).expect("metric creation failed");

    /// Account key pairs generated (nodes plus faucet)
    pub static ref KEYS_GENERATED: Counter = Counter::new(
        "qc_provisioning_keys_generated_total",
        "Total number of account key pairs generated"
    ).expect("metric creation failed");

    /// Artifact bundles written under target/
    pub static ref BUNDLES_PACKAGED: Counter = Counter::new(
        "qc_provisioning_bundles_packaged_total",
        "Total number of versioned artifact bundles packaged"
    ).expect("metric creation failed");

    /// Wall time of a whole create-network or add-joiners run
    pub static ref NETWORK_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "qc_provisioning_network_duration_seconds",
            "Time spent provisioning a network"
        ).buckets(exponential_buckets(0.01, 2.0, 14).expect("valid buckets"))
    ).expect("metric creation failed");

    // =========================================================================
    // PUBLISH METRICS
    // =========================================================================

    /// Objects uploaded to the remote store
    pub static ref OBJECTS_UPLOADED: Counter = Counter::new(
        "qc_publish_objects_uploaded_total",
        "Total number of objects uploaded"
    ).expect("metric creation failed");

    /// Bytes uploaded to the remote store
    pub static ref BYTES_UPLOADED: Counter = Counter::new(
        "qc_publish_bytes_uploaded_total",
        "Total number of bytes uploaded"
    ).expect("metric creation failed");

    // =========================================================================
    // ERROR METRICS
    // =========================================================================

    /// Failures by pipeline stage and error kind
    pub static ref PROVISIONING_ERRORS: CounterVec = CounterVec::new(
        Opts::new("qc_provisioning_errors_total", "Errors by stage and kind"),
        &["stage", "kind"]
    ).expect("metric creation failed");
}

/// Handle to the registry the metrics were registered with
pub struct MetricsHandle {
    registry: Arc<Registry>,
}

impl MetricsHandle {
    /// Render the registry in Prometheus text format.
    pub fn encode(&self) -> Result<String, TelemetryError> {
        encode_registry(&self.registry)
    }
}

/// Register all metrics with the global registry.
///
/// Safe to call more than once; metrics that are already registered are kept.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        // Provisioning
        Box::new(NODES_PROVISIONED.clone()),
        Box::new(KEYS_GENERATED.clone()),
        Box::new(BUNDLES_PACKAGED.clone()),
        Box::new(NETWORK_DURATION.clone()),
        // Publish
        Box::new(OBJECTS_UPLOADED.clone()),
        Box::new(BYTES_UPLOADED.clone()),
        // Errors
        Box::new(PROVISIONING_ERRORS.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }

    Ok(MetricsHandle {
        registry: Arc::new(REGISTRY.clone()),
    })
}

fn encode_registry(registry: &Registry) -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = registry.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// Timer guard for automatic histogram observation.
pub struct HistogramTimer {
    histogram: Histogram,
    start: std::time::Instant,
}

impl HistogramTimer {
    /// Start a new timer for the given histogram.
    pub fn new(histogram: &Histogram) -> Self {
        Self {
            histogram: histogram.clone(),
            start: std::time::Instant::now(),
        }
    }
}

impl Drop for HistogramTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        self.histogram.observe(duration);
    }
}

/// Start timing for a histogram. Observation happens on drop.
#[macro_export]
macro_rules! time_histogram {
    ($histogram:expr) => {
        $crate::metrics::HistogramTimer::new(&$histogram)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_metrics_twice() {
        assert!(register_metrics().is_ok());
        assert!(register_metrics().is_ok());
    }

    #[test]
    fn test_counter_increment() {
        KEYS_GENERATED.inc();
        assert!(KEYS_GENERATED.get() >= 1.0);
    }

    #[test]
    fn test_labelled_counter() {
        NODES_PROVISIONED.with_label_values(&["validator"]).inc();
        assert!(NODES_PROVISIONED.with_label_values(&["validator"]).get() >= 1.0);
    }

    #[test]
    fn test_encode_contains_registered_metric() {
        let handle = register_metrics().unwrap();
        OBJECTS_UPLOADED.inc();
        let text = handle.encode().unwrap();
        assert!(text.contains("qc_publish_objects_uploaded_total"));
    }

    #[test]
    fn test_histogram_timer() {
        let before = NETWORK_DURATION.get_sample_count();
        {
            let _timer = HistogramTimer::new(&NETWORK_DURATION);
        }
        assert!(NETWORK_DURATION.get_sample_count() > before);
    }
}
