//! Delivery configuration.

use ks_01_verification_ledger::{QuorumPolicy, VetoMode};
use shared_types::RetryPolicy;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct DeliveryConfig {
    /// Delivery attempts before `Failed` becomes terminal.
    pub max_attempts: u32,
    pub retry_base: Duration,
    pub retry_cap: Duration,
    /// Verification rounds before an unverified event message gives up.
    pub max_verification_rounds: u32,
    /// How long verifiers have to answer an event-trigger request.
    pub event_verification_window: chrono::Duration,
    pub veto: VetoMode,
    /// Bound on each content store and notifier call.
    pub io_timeout: Duration,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            retry_base: Duration::from_secs(60),
            retry_cap: Duration::from_secs(6 * 60 * 60),
            max_verification_rounds: 3,
            event_verification_window: chrono::Duration::days(7),
            veto: VetoMode::AuditOnly,
            io_timeout: Duration::from_secs(30),
        }
    }
}

impl DeliveryConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, self.retry_base, self.retry_cap)
    }

    pub fn event_policy(&self, required_confirmations: u32) -> QuorumPolicy {
        QuorumPolicy::new(required_confirmations).with_veto(self.veto)
    }
}
