//! Driving Ports (API - Inbound)

use crate::domain::TickReport;
use crate::error::SchedulerResult;
use async_trait::async_trait;
use shared_types::Timestamp;

/// The only component that drives message transitions.
#[async_trait]
pub trait SchedulerApi: Send + Sync {
    /// Evaluate every due message once. Messages leased by a concurrent
    /// tick are skipped, never waited on.
    async fn tick(&self, now: Timestamp) -> SchedulerResult<TickReport>;
}
