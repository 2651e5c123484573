//! Clock/scan driver.
//!
//! One pass runs the liveness sweep beside the message scan (ledger expiry
//! sweep, then scheduler tick), so check-in prompts never hold up due
//! messages. When the sweep changed an owner's verdict, a follow-up tick
//! lets posthumous messages act on it within the same pass.

use crate::domain::{DriverPass, TickReport};
use crate::ports::SchedulerApi;
use ks_01_verification_ledger::VerificationLedgerApi;
use ks_02_liveness_monitor::DeadMansSwitchApi;
use shared_types::{ErrorCategory, TimeSource, Timestamp};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Called after every pass driven by [`ClockDriver::run`].
pub type PassObserver = Arc<dyn Fn(&DriverPass) + Send + Sync>;

pub struct ClockDriver {
    scheduler: Arc<dyn SchedulerApi>,
    monitor: Arc<dyn DeadMansSwitchApi>,
    ledger: Arc<dyn VerificationLedgerApi>,
    clock: Arc<dyn TimeSource>,
    interval: Duration,
    observer: Option<PassObserver>,
}

impl ClockDriver {
    pub fn new(
        scheduler: Arc<dyn SchedulerApi>,
        monitor: Arc<dyn DeadMansSwitchApi>,
        ledger: Arc<dyn VerificationLedgerApi>,
        clock: Arc<dyn TimeSource>,
        interval: Duration,
    ) -> Self {
        Self {
            scheduler,
            monitor,
            ledger,
            clock,
            interval,
            observer: None,
        }
    }

    pub fn with_observer(mut self, observer: PassObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    pub async fn run_once(&self) -> DriverPass {
        let now = self.clock.now();
        let mut pass = DriverPass::default();

        let scan = async {
            let expired = self.ledger.expire_overdue(now).await;
            (expired, self.tick_scheduler(now).await)
        };
        let (sweep, (expired, report)) = tokio::join!(self.monitor.tick_due(now), scan);

        match sweep {
            Ok(sweep) => pass.monitor = Some(sweep),
            Err(e) => warn!(error = %e, "[ks-04] liveness sweep failed"),
        }
        match expired {
            Ok(n) => pass.requests_expired = n,
            Err(e) => warn!(error = %e, "[ks-04] expiry sweep failed"),
        }
        pass.scheduler = report;

        if pass.monitor.as_ref().is_some_and(|s| s.changed_verdicts()) {
            debug!("[ks-04] liveness verdicts changed, re-running scheduler tick");
            if let Some(follow_up) = self.tick_scheduler(now).await {
                match pass.scheduler.as_mut() {
                    Some(report) => report.merge(&follow_up),
                    None => pass.scheduler = Some(follow_up),
                }
            }
        }

        pass
    }

    async fn tick_scheduler(&self, now: Timestamp) -> Option<TickReport> {
        match self.scheduler.tick(now).await {
            Ok(report) => Some(report),
            Err(e) if e.category() == ErrorCategory::Consistency => {
                error!(error = %e, "[ks-04] scheduler tick failed");
                None
            }
            Err(e) => {
                warn!(error = %e, "[ks-04] scheduler tick failed");
                None
            }
        }
    }

    /// Drive passes at the configured cadence until `shutdown` flips.
    /// Passes never overlap; a pass that overruns the interval delays the
    /// next one instead of queueing a burst.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(interval_secs = self.interval.as_secs(), "[ks-04] clock driver started");
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let pass = self.run_once().await;
                    if let Some(observer) = &self.observer {
                        observer(&pass);
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("[ks-04] Shutdown signal received");
                        break;
                    }
                }
            }
        }
    }
}
