//! # Engine Runtime
//!
//! Owns the container, the store lock and the background tasks.
//!
//! ## Startup Sequence
//!
//! 1. Validate configuration
//! 2. Lock the data directory and open the store
//! 3. Build subsystems in dependency order
//! 4. Spawn the audit handler and the clock driver
//!
//! ## Shutdown Sequence
//!
//! 1. Flip the shutdown channel
//! 2. Wait (bounded) for the driver to finish its current pass
//! 3. Release the data directory lock

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use keepsake_telemetry::LAST_PASS_TIMESTAMP;
use ks_04_scheduler::DriverPass;
use parking_lot::Mutex;
use shared_bus::EventFilter;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::adapters::{open_store, DataDirLock};
use crate::container::{Capabilities, EngineConfig, EngineContainer};
use crate::control::EngineControl;
use crate::handlers::AuditHandler;

/// How long shutdown waits for background tasks.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

pub struct EngineRuntime {
    container: Arc<EngineContainer>,
    control: EngineControl,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    _lock: Option<DataDirLock>,
}

impl EngineRuntime {
    pub fn new(config: EngineConfig, capabilities: Capabilities) -> Result<Self> {
        config.validate().context("invalid engine configuration")?;

        let opened = open_store(&config.storage).with_context(|| {
            format!(
                "failed to open {:?} store in {}",
                config.storage.backend,
                config.storage.data_dir.display()
            )
        })?;

        let container = Arc::new(EngineContainer::new(config, opened.store, capabilities));
        let control = EngineControl::new(&container);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Ok(Self {
            container,
            control,
            shutdown_tx,
            shutdown_rx,
            tasks: Mutex::new(Vec::new()),
            _lock: opened.lock,
        })
    }

    /// Spawn the audit handler and the clock driver.
    pub fn start(&self) {
        info!("===========================================");
        info!("  Keepsake engine v{}", env!("CARGO_PKG_VERSION"));
        info!("===========================================");

        let audit = AuditHandler::new(self.container.event_bus.subscribe(EventFilter::all()));
        let mut audit_shutdown = self.shutdown_rx.clone();
        let audit_task = tokio::spawn(async move {
            tokio::select! {
                _ = audit.run() => {}
                _ = audit_shutdown.changed() => {
                    info!("[ks-node] audit handler shutting down");
                }
            }
        });

        let driver = self
            .container
            .clock_driver()
            .with_observer(Arc::new(observe_pass));
        let driver_task = tokio::spawn(driver.run(self.shutdown_rx.clone()));

        self.tasks.lock().extend([audit_task, driver_task]);

        let config = &self.container.config;
        info!(
            backend = ?config.storage.backend,
            data_dir = %config.storage.data_dir.display(),
            tick_secs = config.scheduler.tick_interval.as_secs(),
            "[ks-node] engine running"
        );
    }

    pub fn control(&self) -> EngineControl {
        self.control.clone()
    }

    pub fn container(&self) -> Arc<EngineContainer> {
        Arc::clone(&self.container)
    }

    /// Stop background tasks. The store lock is released when the runtime drops.
    pub async fn shutdown(&self) {
        info!("[ks-node] initiating graceful shutdown");

        if let Err(e) = self.shutdown_tx.send(true) {
            error!(error = %e, "[ks-node] failed to send shutdown signal");
        }

        let tasks: Vec<JoinHandle<()>> = self.tasks.lock().drain(..).collect();
        for task in tasks {
            match tokio::time::timeout(SHUTDOWN_GRACE, task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!(error = %e, "[ks-node] background task panicked"),
                Err(_) => warn!("[ks-node] background task did not stop in time"),
            }
        }

        info!("[ks-node] shutdown complete");
    }
}

fn observe_pass(pass: &DriverPass) {
    LAST_PASS_TIMESTAMP.set(chrono::Utc::now().timestamp());
    if let Some(report) = &pass.scheduler {
        if report.errors > 0 {
            warn!(errors = report.errors, "[ks-node] scheduler pass had errors");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::StorageBackend;
    use chrono::{TimeZone, Utc};
    use ks_03_delivery::{MessageStatus, NewMessage, Trigger};
    use shared_types::{
        ContentRef, InMemoryContentStore, ManualTimeSource, MessageKind, OwnerId, Recipient,
        RecordingNotifier, TimeSource,
    };
    use tempfile::TempDir;

    fn capabilities(
        clock: Arc<ManualTimeSource>,
        notifier: Arc<RecordingNotifier>,
    ) -> Capabilities {
        let content = Arc::new(InMemoryContentStore::new());
        content.insert(ContentRef::new("mem://letter"), b"hello".to_vec());
        Capabilities {
            content,
            notifier,
            clock,
        }
    }

    fn file_config(dir: &TempDir) -> EngineConfig {
        let mut config = EngineConfig::default();
        config.storage.backend = StorageBackend::File;
        config.storage.data_dir = dir.path().to_path_buf();
        config
    }

    #[test]
    fn test_invalid_config_is_refused() {
        let mut config = EngineConfig::default();
        config.storage.backend = StorageBackend::Memory;
        config.scheduler.worker_pool_size = 0;
        let clock = Arc::new(ManualTimeSource::new(Utc::now()));
        assert!(EngineRuntime::new(config, capabilities(clock, Arc::new(RecordingNotifier::new()))).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_delivers_and_shuts_down() {
        let dir = TempDir::new().unwrap();
        let start = Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap();
        let clock = Arc::new(ManualTimeSource::new(start));
        let notifier = Arc::new(RecordingNotifier::new());
        let runtime =
            EngineRuntime::new(file_config(&dir), capabilities(clock.clone(), notifier.clone()))
                .unwrap();

        let owner = OwnerId::new("owner-1");
        let control = runtime.control();
        let message = control
            .create_message(
                &owner,
                NewMessage {
                    kind: MessageKind::Letter,
                    title: "Now".into(),
                    recipient: Recipient::new("Ann", "ann@example.com"),
                    content_ref: Some(ContentRef::new("mem://letter")),
                },
            )
            .await
            .unwrap();
        control
            .schedule_message(&owner, &message.id, Trigger::Date { deliver_at: clock.now() })
            .await
            .unwrap();

        runtime.start();
        // First driver pass runs immediately.
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(
            control.get_message_status(&owner, &message.id).unwrap().status,
            MessageStatus::Delivered
        );
        assert_eq!(notifier.delivery_notices().len(), 1);

        runtime.shutdown().await;
    }

    #[test]
    fn test_second_runtime_on_same_dir_is_refused() {
        let dir = TempDir::new().unwrap();
        let clock = Arc::new(ManualTimeSource::new(Utc::now()));
        let notifier = Arc::new(RecordingNotifier::new());
        let _first =
            EngineRuntime::new(file_config(&dir), capabilities(clock.clone(), notifier.clone()))
                .unwrap();
        assert!(EngineRuntime::new(file_config(&dir), capabilities(clock, notifier)).is_err());
    }
}
