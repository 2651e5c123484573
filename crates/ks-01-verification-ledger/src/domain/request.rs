//! Verification requests

use serde::{Deserialize, Serialize};
use shared_types::{ContactId, MessageId, OwnerId, RequestId, Timestamp, VerificationToken};
use std::fmt;

/// What a verification request is about.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VerificationSubject {
    /// Life event behind an event-triggered message.
    Message(MessageId),
    /// The owner's passing (posthumous escalation).
    Owner(OwnerId),
}

impl VerificationSubject {
    /// Stable storage key component.
    pub fn key(&self) -> String {
        match self {
            VerificationSubject::Message(id) => format!("msg-{id}"),
            VerificationSubject::Owner(owner) => format!("own-{}", hex::encode(owner.as_str())),
        }
    }
}

impl fmt::Display for VerificationSubject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerificationSubject::Message(id) => write!(f, "message:{id}"),
            VerificationSubject::Owner(owner) => write!(f, "owner:{owner}"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestStatus {
    Pending,
    Confirmed,
    Denied,
    Expired,
}

impl RequestStatus {
    pub fn is_answered(&self) -> bool {
        matches!(self, RequestStatus::Confirmed | RequestStatus::Denied)
    }
}

/// A verifier's answer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    Confirm,
    Deny,
}

impl From<Decision> for RequestStatus {
    fn from(d: Decision) -> Self {
        match d {
            Decision::Confirm => RequestStatus::Confirmed,
            Decision::Deny => RequestStatus::Denied,
        }
    }
}

/// One question put to one trusted contact.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationRequest {
    pub id: RequestId,
    pub subject: VerificationSubject,
    pub verifier: ContactId,
    pub status: RequestStatus,
    pub token: VerificationToken,
    /// 1-based issue round for this (subject, verifier) pair.
    pub round: u32,
    pub created_at: Timestamp,
    pub expires_at: Timestamp,
    pub responded_at: Option<Timestamp>,
    /// Set once the subject reached a terminal outcome; ignored by quorum.
    pub archived: bool,
}

impl VerificationRequest {
    pub fn new(
        subject: VerificationSubject,
        verifier: ContactId,
        round: u32,
        now: Timestamp,
        expires_at: Timestamp,
    ) -> Self {
        Self {
            id: RequestId::new(),
            subject,
            verifier,
            status: RequestStatus::Pending,
            token: VerificationToken::generate(),
            round,
            created_at: now,
            expires_at,
            responded_at: None,
            archived: false,
        }
    }

    /// Pending and past its window at `as_of`.
    pub fn is_overdue(&self, as_of: Timestamp) -> bool {
        self.status == RequestStatus::Pending && as_of > self.expires_at
    }

    /// Status as seen at `as_of`: an overdue pending request reads as expired.
    pub fn effective_status(&self, as_of: Timestamp) -> RequestStatus {
        if self.is_overdue(as_of) {
            RequestStatus::Expired
        } else {
            self.status
        }
    }
}

/// Independent legal-document confirmation of an owner's death.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentVerification {
    pub owner: OwnerId,
    pub document_ref: String,
    pub verified_by: String,
    pub recorded_at: Timestamp,
}
