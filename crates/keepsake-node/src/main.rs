//! # Keepsake Node
//!
//! Runs the engine as a standalone process.
//!
//! Without a host application the node uses the in-process adapters: an
//! in-memory content store and a notifier that only logs. Embedders build
//! an `EngineRuntime` with their own `Capabilities` instead.
//!
//! ## Startup Sequence
//!
//! 1. Initialize telemetry (`KS_LOG_LEVEL`, `KS_JSON_LOGS`, OTLP)
//! 2. Load configuration from `KS_*` environment variables
//! 3. Open the store and build subsystems
//! 4. Run the clock driver until Ctrl+C

use std::sync::Arc;

use anyhow::{Context, Result};
use keepsake_node::{Capabilities, EngineConfig, EngineRuntime};
use keepsake_telemetry::{init_telemetry, TelemetryConfig};
use shared_types::{InMemoryContentStore, SystemTimeSource, TracingNotifier};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Telemetry first, so configuration warnings are visible.
    let _telemetry = init_telemetry(TelemetryConfig::from_env())
        .await
        .context("failed to initialize telemetry")?;

    let config = EngineConfig::from_env();

    let capabilities = Capabilities {
        content: Arc::new(InMemoryContentStore::new()),
        notifier: Arc::new(TracingNotifier),
        clock: Arc::new(SystemTimeSource),
    };

    let runtime = EngineRuntime::new(config, capabilities)?;
    runtime.start();

    info!("Engine is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl+C")?;

    runtime.shutdown().await;
    Ok(())
}
