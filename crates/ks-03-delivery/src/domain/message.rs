//! Message model

use ks_01_verification_ledger::VerificationSubject;
use serde::{Deserialize, Serialize};
use shared_types::{
    ContactId, ContentRef, ErrorCategory, MessageId, MessageKind, MessageMeta, OwnerId, Recipient,
    Timestamp,
};
use std::collections::BTreeSet;
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageStatus {
    Draft,
    Scheduled,
    AwaitingVerification,
    Processing,
    Delivered,
    Failed,
    Cancelled,
}

impl MessageStatus {
    pub const ALL: [MessageStatus; 7] = [
        MessageStatus::Draft,
        MessageStatus::Scheduled,
        MessageStatus::AwaitingVerification,
        MessageStatus::Processing,
        MessageStatus::Delivered,
        MessageStatus::Failed,
        MessageStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MessageStatus::Draft => "draft",
            MessageStatus::Scheduled => "scheduled",
            MessageStatus::AwaitingVerification => "awaiting_verification",
            MessageStatus::Processing => "processing",
            MessageStatus::Delivered => "delivered",
            MessageStatus::Failed => "failed",
            MessageStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Condition that releases a message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trigger {
    Date {
        deliver_at: Timestamp,
    },
    Event {
        event_label: String,
        required_confirmations: u32,
        verifier_ids: BTreeSet<ContactId>,
    },
    /// Resolved entirely by the liveness monitor.
    Posthumous,
}

impl Trigger {
    pub fn kind(&self) -> &'static str {
        match self {
            Trigger::Date { .. } => "date",
            Trigger::Event { .. } => "event",
            Trigger::Posthumous => "posthumous",
        }
    }
}

/// Why the last attempt or verification round failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureReason {
    ContentNotFound,
    ContentStoreTimeout,
    ContentStoreUnavailable,
    NotifierUnavailable,
    InvalidRecipient,
    /// The verification window closed without quorum.
    VerificationExpired,
    /// A verifier denied under a blocking veto policy.
    Vetoed,
}

impl FailureReason {
    pub fn category(&self) -> ErrorCategory {
        match self {
            FailureReason::ContentStoreTimeout
            | FailureReason::ContentStoreUnavailable
            | FailureReason::NotifierUnavailable
            | FailureReason::VerificationExpired => ErrorCategory::Transient,
            FailureReason::ContentNotFound
            | FailureReason::InvalidRecipient
            | FailureReason::Vetoed => ErrorCategory::Validation,
        }
    }

    pub fn is_verification(&self) -> bool {
        matches!(
            self,
            FailureReason::VerificationExpired | FailureReason::Vetoed
        )
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureReason::ContentNotFound => "content_not_found",
            FailureReason::ContentStoreTimeout => "content_store_timeout",
            FailureReason::ContentStoreUnavailable => "content_store_unavailable",
            FailureReason::NotifierUnavailable => "notifier_unavailable",
            FailureReason::InvalidRecipient => "invalid_recipient",
            FailureReason::VerificationExpired => "verification_expired",
            FailureReason::Vetoed => "vetoed",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub reason: FailureReason,
    pub detail: String,
    pub at: Timestamp,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub owner: OwnerId,
    pub kind: MessageKind,
    pub title: String,
    /// `None` while drafting.
    pub content_ref: Option<ContentRef>,
    pub recipient: Recipient,
    /// Set when the draft is finalized.
    pub trigger: Option<Trigger>,
    pub status: MessageStatus,
    /// Delivery attempts; only `Processing -> Failed` increments it.
    pub attempts: u32,
    /// Verification rounds issued for an event trigger.
    pub verification_rounds: u32,
    pub last_failure: Option<FailureRecord>,
    /// Set on a retryable `Failed`; a `Failed` without it is terminal.
    pub retry_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub delivered_at: Option<Timestamp>,
    pub revision: u64,
}

impl Message {
    pub fn draft(
        owner: OwnerId,
        kind: MessageKind,
        title: impl Into<String>,
        recipient: Recipient,
        content_ref: Option<ContentRef>,
        now: Timestamp,
    ) -> Self {
        Self {
            id: MessageId::new(),
            owner,
            kind,
            title: title.into(),
            content_ref,
            recipient,
            trigger: None,
            status: MessageStatus::Draft,
            attempts: 0,
            verification_rounds: 0,
            last_failure: None,
            retry_at: None,
            created_at: now,
            updated_at: now,
            delivered_at: None,
            revision: 0,
        }
    }

    /// No transition out of this state will ever be accepted.
    pub fn is_terminal(&self) -> bool {
        match self.status {
            MessageStatus::Delivered | MessageStatus::Cancelled => true,
            MessageStatus::Failed => self.retry_at.is_none(),
            _ => false,
        }
    }

    pub fn subject(&self) -> VerificationSubject {
        VerificationSubject::Message(self.id)
    }

    pub fn meta(&self) -> MessageMeta {
        MessageMeta {
            message_id: self.id,
            owner_id: self.owner.clone(),
            kind: self.kind,
            title: self.title.clone(),
            recipient_name: self.recipient.name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_failed_is_terminal_without_retry() {
        let mut m = Message::draft(
            OwnerId::new("o"),
            MessageKind::Letter,
            "hi",
            Recipient::new("Ann", "ann@example.com"),
            None,
            Utc::now(),
        );
        assert!(!m.is_terminal());
        m.status = MessageStatus::Failed;
        m.retry_at = Some(Utc::now());
        assert!(!m.is_terminal());
        m.retry_at = None;
        assert!(m.is_terminal());
    }

    #[test]
    fn test_failure_reason_categories() {
        assert_eq!(
            FailureReason::NotifierUnavailable.category(),
            ErrorCategory::Transient
        );
        assert_eq!(
            FailureReason::InvalidRecipient.category(),
            ErrorCategory::Validation
        );
        assert!(FailureReason::Vetoed.is_verification());
    }
}
