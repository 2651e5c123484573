//! Engine-wide Prometheus metrics and exposition.
//!
//! Subsystem crates register their own counters on the default registry
//! (behind their `metrics` features). This module owns the engine-level
//! series and renders both registries in text format.

use lazy_static::lazy_static;
use prometheus::{CounterVec, Encoder, IntGauge, Opts, Registry, TextEncoder};

use crate::TelemetryError;

lazy_static! {
    /// Registry for engine-level series
    pub static ref REGISTRY: Registry = Registry::new();

    /// Engine events observed on the bus, by topic
    pub static ref EVENTS_OBSERVED: CounterVec = CounterVec::new(
        Opts::new("ks_events_observed_total", "Engine events observed on the bus"),
        &["topic"]
    ).expect("metric creation failed");

    /// Errors by subsystem and category
    pub static ref ENGINE_ERRORS: CounterVec = CounterVec::new(
        Opts::new("ks_errors_total", "Errors by subsystem and category"),
        &["subsystem", "category"]
    ).expect("metric creation failed");

    /// Seconds since the unix epoch of the last completed driver pass
    pub static ref LAST_PASS_TIMESTAMP: IntGauge = IntGauge::new(
        "ks_driver_last_pass_timestamp_seconds",
        "Unix time of the last completed clock driver pass"
    ).expect("metric creation failed");
}

/// Keeps the engine registry alive.
pub struct MetricsHandle {
    registry: Registry,
}

impl MetricsHandle {
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

/// Register the engine-level series. Fails if called twice.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(EVENTS_OBSERVED.clone()),
        Box::new(ENGINE_ERRORS.clone()),
        Box::new(LAST_PASS_TIMESTAMP.clone()),
    ];

    for metric in metrics {
        REGISTRY
            .register(metric)
            .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    }

    Ok(MetricsHandle {
        registry: REGISTRY.clone(),
    })
}

/// Render the engine registry and the default registry in text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let mut families = REGISTRY.gather();
    families.extend(prometheus::gather());
    let mut buffer = Vec::new();
    encoder
        .encode(&families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}
