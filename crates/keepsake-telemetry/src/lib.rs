//! # Keepsake Telemetry
//!
//! Logging, trace export and metrics for the Keepsake engine.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use keepsake_telemetry::{init_telemetry, TelemetryConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let _guard = init_telemetry(TelemetryConfig::from_env()).await.expect("telemetry");
//!     // spans and events are now collected
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `KS_LOG_LEVEL` / `RUST_LOG` | `info` | `EnvFilter` directive |
//! | `KS_JSON_LOGS` | `false` (`true` in containers) | JSON log lines |
//! | `KS_CONSOLE_OUTPUT` | `true` | Write logs to stdout |
//! | `OTEL_EXPORTER_OTLP_ENDPOINT` | unset | Export spans over OTLP when set |
//! | `OTEL_SERVICE_NAME` | `keepsake` | Service name on spans |

mod config;
mod logging;
pub mod metrics;
mod tracing_setup;

pub use config::TelemetryConfig;
pub use metrics::{
    encode_metrics, register_metrics, MetricsHandle, ENGINE_ERRORS, EVENTS_OBSERVED,
    LAST_PASS_TIMESTAMP,
};
pub use tracing_setup::TracingGuard;

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize tracing: {0}")]
    TracerInit(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Install the subscriber and register engine metrics.
///
/// Hold the returned guard for the lifetime of the process; dropping it
/// flushes exported spans.
pub async fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    let metrics = register_metrics()?;
    let tracing = tracing_setup::init_tracing(&config).await?;

    Ok(TelemetryGuard {
        _tracing: tracing,
        metrics,
    })
}

/// Keeps telemetry active. Drop to flush and shut down.
pub struct TelemetryGuard {
    _tracing: TracingGuard,
    metrics: MetricsHandle,
}

impl TelemetryGuard {
    pub fn metrics(&self) -> &MetricsHandle {
        &self.metrics
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!("Shutting down telemetry...");
    }
}
