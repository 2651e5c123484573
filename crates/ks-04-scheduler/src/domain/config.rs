//! Scheduler configuration.

use shared_types::RetryPolicy;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct SchedulerConfig {
    /// Cadence of the clock driver.
    pub tick_interval: Duration,
    /// Messages evaluated concurrently within one tick.
    pub worker_pool_size: usize,
    /// Bound on every content store and notifier call.
    pub io_timeout: Duration,
    /// Must outlive content resolution plus the notifier call.
    pub lease_ttl: Duration,
    /// Inline retry when notifying event verifiers.
    pub verifier_retry: RetryPolicy,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(60),
            worker_pool_size: 8,
            io_timeout: Duration::from_secs(30),
            lease_ttl: Duration::from_secs(120),
            verifier_retry: RetryPolicy::default(),
        }
    }
}

impl SchedulerConfig {
    /// Lease TTL as an engine-time duration.
    pub fn lease_ttl_chrono(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.lease_ttl).unwrap_or(chrono::Duration::MAX)
    }

    /// How long one evaluation waits on verifier notifications.
    pub fn notify_budget(&self) -> Duration {
        self.lease_ttl / 2
    }
}
