//! Driven Ports (SPI - Outbound)

use crate::domain::CheckIn;
use crate::error::MonitorResult;
use chrono::Duration;
use shared_types::{OwnerId, Timestamp, VerificationToken};

pub trait CheckInRepository: Send + Sync {
    fn get(&self, owner: &OwnerId) -> MonitorResult<Option<CheckIn>>;

    fn find_by_token(&self, token: &VerificationToken) -> MonitorResult<Option<CheckIn>>;

    /// Compare-and-set on `record.revision`: the stored revision must equal
    /// it (absent counts as 0 for a new record). Stores and returns the
    /// record with the revision bumped. Token and due indexes follow.
    fn save(&self, record: &CheckIn, reminder_lead: Duration) -> MonitorResult<CheckIn>;

    /// Owners whose record needs attention at or before `now`, earliest first.
    fn due_owners(&self, now: Timestamp) -> MonitorResult<Vec<OwnerId>>;
}
