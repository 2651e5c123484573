//! Driving Ports (API - Inbound)

use crate::domain::{CheckIn, CheckInFrequency, LivenessVerdict};
use crate::error::MonitorResult;
use async_trait::async_trait;
use shared_types::{OwnerId, Timestamp, VerificationToken};

/// Result of `schedule_next_check_in`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CheckInSchedule {
    pub next_due_at: Timestamp,
    pub prompt_at: Timestamp,
}

/// What one `tick` did for one owner.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    Idle,
    Prompted,
    /// Prompt retries exhausted. Not a missed check-in.
    PromptFailed { attempts: u32 },
    Missed { missed_count: u32 },
    EscalationStarted { verifiers: usize },
    AwaitingQuorum { progress: String },
    ConfirmedDeceased,
    StoodDown,
}

impl TickOutcome {
    /// Whether posthumous messages may read a different verdict afterwards.
    pub fn changes_verdict(&self) -> bool {
        matches!(
            self,
            TickOutcome::EscalationStarted { .. }
                | TickOutcome::ConfirmedDeceased
                | TickOutcome::StoodDown
        )
    }
}

/// Summary of `tick_due`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MonitorSweep {
    pub evaluated: usize,
    pub outcomes: Vec<(OwnerId, TickOutcome)>,
    pub errors: usize,
}

impl MonitorSweep {
    pub fn changed_verdicts(&self) -> bool {
        self.outcomes.iter().any(|(_, outcome)| outcome.changes_verdict())
    }
}

#[async_trait]
pub trait DeadMansSwitchApi: Send + Sync {
    async fn enroll(
        &self,
        owner: &OwnerId,
        frequency: CheckInFrequency,
        now: Timestamp,
    ) -> MonitorResult<CheckIn>;

    /// Recompute `next_due_at = last_confirmed_at + frequency`. The prompt
    /// goes out from the first tick at or after `prompt_at`.
    async fn schedule_next_check_in(&self, owner: &OwnerId) -> MonitorResult<CheckInSchedule>;

    /// Owner answered a prompt. Cancels any escalation in progress.
    async fn record_check_in(
        &self,
        owner: &OwnerId,
        token: &VerificationToken,
        now: Timestamp,
    ) -> MonitorResult<CheckIn>;

    /// `record_check_in` for callers holding only the token.
    async fn record_check_in_by_token(
        &self,
        token: &VerificationToken,
        now: Timestamp,
    ) -> MonitorResult<CheckIn>;

    /// Authenticated check-in without a token.
    async fn confirm_alive(&self, owner: &OwnerId, now: Timestamp) -> MonitorResult<CheckIn>;

    async fn tick(&self, owner: &OwnerId, now: Timestamp) -> MonitorResult<TickOutcome>;

    /// `tick` every owner surfaced by the due index.
    async fn tick_due(&self, now: Timestamp) -> MonitorResult<MonitorSweep>;

    /// Pure read.
    fn liveness_verdict(&self, owner: &OwnerId, as_of: Timestamp) -> MonitorResult<LivenessVerdict>;

    fn get_check_in(&self, owner: &OwnerId) -> MonitorResult<Option<CheckIn>>;
}
