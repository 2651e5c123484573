//! Monitor configuration.

use chrono::Duration;
use ks_01_verification_ledger::{QuorumPolicy, VetoMode};
use shared_types::RetryPolicy;

#[derive(Clone, Debug)]
pub struct MonitorConfig {
    /// Missed periods before escalation starts.
    pub missed_threshold: u32,
    /// How long before `next_due_at` the prompt goes out.
    pub reminder_lead: Duration,
    /// How long trusted contacts have to answer an escalation.
    pub escalation_window: Duration,
    /// Distinct confirmations that establish the owner's passing.
    pub required_confirmations: u32,
    /// One confirmation plus a verified legal document also suffices.
    pub allow_document_substitute: bool,
    pub veto: VetoMode,
    /// Inline retry for check-in prompts and verifier notifications.
    pub prompt_retry: RetryPolicy,
    pub io_timeout: std::time::Duration,
    /// Owners ticked concurrently within one sweep.
    pub worker_pool_size: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            missed_threshold: 1,
            reminder_lead: Duration::hours(12),
            escalation_window: Duration::days(14),
            required_confirmations: 2,
            allow_document_substitute: false,
            veto: VetoMode::AuditOnly,
            prompt_retry: RetryPolicy::default(),
            io_timeout: std::time::Duration::from_secs(30),
            worker_pool_size: 8,
        }
    }
}

impl MonitorConfig {
    pub fn quorum_policy(&self) -> QuorumPolicy {
        QuorumPolicy::new(self.required_confirmations)
            .with_veto(self.veto)
            .with_document_substitute(self.allow_document_substitute)
    }
}
