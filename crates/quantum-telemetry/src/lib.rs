//! # Quantum Telemetry
//!
//! Logging and metrics for Quantum-Chain tools.
//!
//! ## Components
//!
//! - **Logging**: `tracing-subscriber` with an env filter, pretty or JSON lines
//! - **Metrics**: Prometheus counters and histograms, rendered on demand
//!
//! ## Usage
//!
//! ```rust,ignore
//! use quantum_telemetry::{init_telemetry, TelemetryConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = TelemetryConfig::for_tool("qc-testnet");
//!     let telemetry = init_telemetry(&config)?;
//!
//!     // Your application code here
//!
//!     println!("{}", telemetry.metrics().encode()?);
//!     Ok(())
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `QC_SERVICE_NAME` | `quantum-chain` | Service name in log lines |
//! | `QC_LOG_LEVEL` | `info` | Log level filter (`RUST_LOG` also honoured) |
//! | `QC_CONSOLE_OUTPUT` | `true` | Emit log lines at all |
//! | `QC_JSON_LOGS` | `false` | JSON instead of human-readable lines |

mod config;
mod logging;
pub mod metrics;

pub use config::TelemetryConfig;
pub use logging::{env_filter, init_logging};
pub use metrics::{
    register_metrics, MetricsHandle, BUNDLES_PACKAGED, BYTES_UPLOADED, KEYS_GENERATED,
    NETWORK_DURATION, NODES_PROVISIONED, OBJECTS_UPLOADED, PROVISIONING_ERRORS,
};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Initialize logging and register metrics.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    // Metrics first so counters exist before anything logs
    let metrics = register_metrics()?;
    init_logging(config)?;

    Ok(TelemetryGuard { metrics })
}

/// Keeps the metrics handle alive for the run.
pub struct TelemetryGuard {
    metrics: MetricsHandle,
}

impl TelemetryGuard {
    pub fn metrics(&self) -> &MetricsHandle {
        &self.metrics
    }
}
