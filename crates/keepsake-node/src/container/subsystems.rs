//! # Subsystem Container
//!
//! Holds every subsystem instance and wires them together.
//!
//! ## Initialization Order
//!
//! Subsystems are built in dependency order:
//!
//! ```text
//! Level 0: store, event bus, capabilities (content, notifier, clock)
//! Level 1: Verification Ledger (ks-01)
//! Level 2: Liveness Monitor (ks-02) -> ledger
//! Level 3: Delivery (ks-03) -> ledger, monitor
//! Level 4: Scheduler (ks-04) -> delivery, ledger, monitor
//! ```
//!
//! All services share one `SharedKvStore`. Cross-subsystem calls go
//! through each subsystem's inbound port; the bus carries observations
//! only.

use std::sync::Arc;

use ks_01_verification_ledger::{KvVerificationRepository, VerificationLedger};
use ks_02_liveness_monitor::{DeadMansSwitchMonitor, KvCheckInRepository};
use ks_03_delivery::{DeliveryExecutor, DeliveryStateMachine, KvMessageRepository, MessageService};
use ks_04_scheduler::{ClockDriver, Scheduler};
use shared_bus::InMemoryEventBus;
use shared_types::storage::SharedKvStore;
use shared_types::{ContentStore, Notifier, TimeSource};
use tracing::{info, instrument};

use crate::container::config::EngineConfig;

/// Host-provided collaborators.
#[derive(Clone)]
pub struct Capabilities {
    pub content: Arc<dyn ContentStore>,
    pub notifier: Arc<dyn Notifier>,
    pub clock: Arc<dyn TimeSource>,
}

/// Central container holding all subsystem instances.
pub struct EngineContainer {
    /// Verification Ledger (ks-01). Also the trusted contact registry.
    pub ledger: Arc<VerificationLedger>,
    /// Dead-man's-switch (ks-02).
    pub monitor: Arc<DeadMansSwitchMonitor>,
    /// Owner message operations (ks-03).
    pub messages: Arc<MessageService>,
    /// Delivery scheduler (ks-04).
    pub scheduler: Arc<Scheduler>,

    pub event_bus: Arc<InMemoryEventBus>,
    pub store: SharedKvStore,
    pub capabilities: Capabilities,
    /// Immutable after initialization.
    pub config: EngineConfig,
}

impl EngineContainer {
    #[instrument(name = "engine_init", skip_all)]
    pub fn new(config: EngineConfig, store: SharedKvStore, capabilities: Capabilities) -> Self {
        info!("[ks-node] Initializing Keepsake subsystem container");

        let event_bus = Arc::new(InMemoryEventBus::new());

        let ledger = Arc::new(VerificationLedger::new(
            Arc::new(KvVerificationRepository::new(store.clone())),
            event_bus.clone(),
        ));
        info!("  [ks-01] Verification Ledger initialized");

        let monitor = Arc::new(DeadMansSwitchMonitor::new(
            Arc::new(KvCheckInRepository::new(store.clone())),
            ledger.clone(),
            ledger.clone(),
            capabilities.notifier.clone(),
            event_bus.clone(),
            config.monitor.clone(),
        ));
        info!(
            missed_threshold = config.monitor.missed_threshold,
            "  [ks-02] Liveness Monitor initialized"
        );

        let repo = Arc::new(KvMessageRepository::new(store.clone()));
        let machine = Arc::new(DeliveryStateMachine::new(config.delivery.clone()));
        let messages = Arc::new(MessageService::new(
            repo.clone(),
            machine.clone(),
            ledger.clone(),
            ledger.clone(),
            monitor.clone(),
            event_bus.clone(),
        ));
        info!(
            max_attempts = config.delivery.max_attempts,
            veto = ?config.delivery.veto,
            "  [ks-03] Delivery initialized"
        );

        let executor = Arc::new(DeliveryExecutor::new(
            capabilities.content.clone(),
            capabilities.notifier.clone(),
            repo.clone(),
            config.delivery.io_timeout,
        ));
        let scheduler = Arc::new(Scheduler::new(
            repo,
            machine,
            executor,
            ledger.clone(),
            monitor.clone(),
            capabilities.notifier.clone(),
            event_bus.clone(),
            config.scheduler.clone(),
        ));
        info!(
            workers = config.scheduler.worker_pool_size,
            lease_ttl_secs = config.scheduler.lease_ttl.as_secs(),
            "  [ks-04] Scheduler initialized"
        );

        Self {
            ledger,
            monitor,
            messages,
            scheduler,
            event_bus,
            store,
            capabilities,
            config,
        }
    }

    /// A clock driver over this container's subsystems.
    pub fn clock_driver(&self) -> ClockDriver {
        ClockDriver::new(
            self.scheduler.clone(),
            self.monitor.clone(),
            self.ledger.clone(),
            self.capabilities.clock.clone(),
            self.config.scheduler.tick_interval,
        )
    }
}
