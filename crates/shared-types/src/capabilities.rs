//! # External Capabilities
//!
//! Interfaces the engine requires the host application to implement:
//! the content store, the notification transport, and the clock.
//!
//! Every call that leaves the process is async and may fail; callers bound
//! each call with a timeout (see `retry::retry_with_backoff` and the
//! delivery executor).

use crate::entities::{ContentRef, MessageMeta, OwnerId, Timestamp, VerificationToken};
use crate::errors::{ContentStoreError, NotifierError};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;

/// Deliverable form of a resolved content reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedContent {
    /// Inline bytes, attached to the notice.
    Bytes(Vec<u8>),
    /// A link the recipient can follow.
    Url(String),
}

/// Opaque blob store holding message bodies.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Store a finished blob and return its reference.
    async fn put(&self, bytes: Vec<u8>) -> Result<ContentRef, ContentStoreError>;

    /// Resolve a reference at delivery time.
    async fn resolve(&self, content_ref: &ContentRef) -> Result<ResolvedContent, ContentStoreError>;
}

/// Delivery notice handed to the notifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryNotice {
    pub recipient_email: String,
    pub content_ref: ContentRef,
    pub content: ResolvedContent,
    pub meta: MessageMeta,
    /// Stable per (message, attempt). Transports may deduplicate on it.
    pub delivery_key: String,
}

/// Outbound notification transport (e-mail, SMS, ...).
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_check_in_prompt(
        &self,
        owner_id: &OwnerId,
        due_at: Timestamp,
    ) -> Result<(), NotifierError>;

    async fn send_verification_request(
        &self,
        contact_email: &str,
        token: &VerificationToken,
        expires_at: Timestamp,
    ) -> Result<(), NotifierError>;

    async fn send_delivery_notice(&self, notice: DeliveryNotice) -> Result<(), NotifierError>;
}

/// Abstract interface for time operations (for testability).
pub trait TimeSource: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Default time source using system time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Timestamp {
        Utc::now()
    }
}

/// Manually driven clock for tests and simulations.
#[derive(Debug)]
pub struct ManualTimeSource {
    now: RwLock<Timestamp>,
}

impl ManualTimeSource {
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: RwLock::new(start),
        }
    }

    pub fn set(&self, now: Timestamp) {
        *self.now.write() = now;
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.write();
        *now += by;
    }
}

impl TimeSource for ManualTimeSource {
    fn now(&self) -> Timestamp {
        *self.now.read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_manual_time_source_advances() {
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let clock = ManualTimeSource::new(start);
        clock.advance(chrono::Duration::hours(2));
        assert_eq!(clock.now(), start + chrono::Duration::hours(2));

        clock.set(start);
        assert_eq!(clock.now(), start);
    }
}
