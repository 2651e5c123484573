//! Error types for Delivery

use crate::domain::MessageStatus;
use ks_01_verification_ledger::LedgerError;
use ks_02_liveness_monitor::MonitorError;
use shared_types::{ErrorCategory, KVStoreError, MessageId};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// Unknown id, or the message belongs to another owner.
    #[error("Message not found: {message_id}")]
    MessageNotFound { message_id: MessageId },

    #[error("Message {message_id} has no content reference")]
    MissingContentRef { message_id: MessageId },

    #[error("Invalid trigger: {reason}")]
    InvalidTrigger { reason: String },

    #[error("Invalid message: {reason}")]
    InvalidMessage { reason: String },

    #[error("Invalid state transition for {message_id}: {from} does not accept {attempted}")]
    InvalidStateTransition {
        message_id: MessageId,
        from: MessageStatus,
        attempted: String,
    },

    /// Someone else wrote the message between our read and write.
    #[error("Message {message_id} revision conflict: expected {expected}, found {found}")]
    RevisionConflict {
        message_id: MessageId,
        expected: u64,
        found: u64,
    },

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Monitor error: {0}")]
    Monitor(#[from] MonitorError),

    #[error("Storage error: {0}")]
    Storage(#[from] KVStoreError),
}

impl DeliveryError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            DeliveryError::MessageNotFound { .. }
            | DeliveryError::MissingContentRef { .. }
            | DeliveryError::InvalidTrigger { .. }
            | DeliveryError::InvalidMessage { .. } => ErrorCategory::Validation,
            DeliveryError::InvalidStateTransition { .. }
            | DeliveryError::RevisionConflict { .. } => ErrorCategory::Consistency,
            DeliveryError::Ledger(e) => e.category(),
            DeliveryError::Monitor(e) => e.category(),
            DeliveryError::Storage(e) => e.category(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.category() == ErrorCategory::Transient
    }
}

pub type DeliveryResult<T> = Result<T, DeliveryError>;
