//! Error types for the Verification Ledger

use crate::domain::{InvitationStatus, RequestStatus};
use shared_types::{ContactId, ErrorCategory, KVStoreError, RequestId};
use thiserror::Error;

/// Verification ledger errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// No request carries this token
    #[error("Verification token not found")]
    TokenNotFound,

    /// The request's window closed (or it was archived) before the answer arrived
    #[error("Verification token expired for request {request_id}")]
    TokenExpired { request_id: RequestId },

    /// The token was already used
    #[error("Request {request_id} already answered ({status:?})")]
    AlreadyResponded {
        request_id: RequestId,
        status: RequestStatus,
    },

    /// A second live answer exists for the same verifier and round
    #[error("Duplicate verification response for request {request_id} from contact {contact_id}")]
    DuplicateVerificationResponse {
        request_id: RequestId,
        contact_id: ContactId,
    },

    /// Contact id unknown, or owned by someone else
    #[error("Trusted contact not found: {contact_id}")]
    ContactNotFound { contact_id: ContactId },

    /// Contact has not accepted the invitation
    #[error("Contact {contact_id} is not eligible to verify (invitation {status:?})")]
    ContactNotEligible {
        contact_id: ContactId,
        status: InvitationStatus,
    },

    /// Malformed contact details
    #[error("Invalid contact: {reason}")]
    InvalidContact { reason: String },

    /// Requested expiry is not in the future
    #[error("Invalid expiry {expires_at}: must be after {now}")]
    InvalidExpiry {
        expires_at: shared_types::Timestamp,
        now: shared_types::Timestamp,
    },

    /// Malformed document verification record
    #[error("Invalid document verification: {reason}")]
    InvalidDocument { reason: String },

    /// Invitation lifecycle violation
    #[error("Invalid invitation transition: {from:?} -> {to:?}")]
    InvalidInvitationTransition {
        from: InvitationStatus,
        to: InvitationStatus,
    },

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(#[from] KVStoreError),
}

impl LedgerError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            LedgerError::TokenNotFound
            | LedgerError::TokenExpired { .. }
            | LedgerError::AlreadyResponded { .. }
            | LedgerError::ContactNotFound { .. }
            | LedgerError::ContactNotEligible { .. }
            | LedgerError::InvalidContact { .. }
            | LedgerError::InvalidExpiry { .. }
            | LedgerError::InvalidDocument { .. }
            | LedgerError::InvalidInvitationTransition { .. } => ErrorCategory::Validation,
            LedgerError::DuplicateVerificationResponse { .. } => ErrorCategory::Consistency,
            LedgerError::Storage(e) => e.category(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.category() == ErrorCategory::Transient
    }
}

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;
