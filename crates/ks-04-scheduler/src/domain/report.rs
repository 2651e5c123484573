//! Tick results.

use ks_02_liveness_monitor::MonitorSweep;
use serde::Serialize;

/// Summary of one `Scheduler::tick`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    /// Candidates found in the status scan.
    pub considered: usize,
    /// Candidates evaluated under a lease.
    pub evaluated: usize,
    pub skipped_leased: usize,
    pub delivered: usize,
    pub failed: usize,
    pub errors: usize,
}

impl TickReport {
    /// Fold a follow-up tick from the same pass into this one.
    pub fn merge(&mut self, other: &TickReport) {
        self.considered += other.considered;
        self.evaluated += other.evaluated;
        self.skipped_leased += other.skipped_leased;
        self.delivered += other.delivered;
        self.failed += other.failed;
        self.errors += other.errors;
    }

    pub(crate) fn absorb(&mut self, evaluation: &Evaluation) {
        match evaluation {
            Evaluation::SkippedLeased => self.skipped_leased += 1,
            Evaluation::Gone => {}
            Evaluation::Settled { delivered, failed } => {
                self.evaluated += 1;
                if *delivered {
                    self.delivered += 1;
                }
                if *failed {
                    self.failed += 1;
                }
            }
            Evaluation::Errored => {
                self.evaluated += 1;
                self.errors += 1;
            }
        }
    }
}

/// What happened to one candidate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Evaluation {
    SkippedLeased,
    /// Cancelled, terminal or deleted by the time the lease was taken.
    Gone,
    Settled { delivered: bool, failed: bool },
    Errored,
}

/// One pass of the clock driver.
#[derive(Clone, Debug, Default)]
pub struct DriverPass {
    pub monitor: Option<MonitorSweep>,
    pub requests_expired: usize,
    pub scheduler: Option<TickReport>,
}
