//! Error types for the Liveness Monitor

use ks_01_verification_ledger::LedgerError;
use shared_types::{ErrorCategory, KVStoreError, OwnerId};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MonitorError {
    #[error("Owner {owner} is not enrolled in check-ins")]
    NotEnrolled { owner: OwnerId },

    #[error("Owner {owner} is already enrolled")]
    AlreadyEnrolled { owner: OwnerId },

    /// No check-in record carries this token.
    #[error("Unknown check-in token")]
    UnknownCheckInToken,

    /// The token belongs to an earlier period.
    #[error("Stale check-in token for owner {owner}")]
    StaleCheckInToken { owner: OwnerId },

    /// Posthumous quorum already formed; check-ins are closed.
    #[error("Owner {owner} was already confirmed deceased")]
    AlreadyConfirmedDeceased { owner: OwnerId },

    /// Someone else wrote the record between our read and write.
    #[error("Check-in revision conflict for {owner}: expected {expected}, found {found}")]
    RevisionConflict {
        owner: OwnerId,
        expected: u64,
        found: u64,
    },

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Storage error: {0}")]
    Storage(#[from] KVStoreError),

    #[error("Worker failed: {0}")]
    Worker(String),
}

impl MonitorError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            MonitorError::NotEnrolled { .. }
            | MonitorError::AlreadyEnrolled { .. }
            | MonitorError::UnknownCheckInToken
            | MonitorError::StaleCheckInToken { .. }
            | MonitorError::AlreadyConfirmedDeceased { .. } => ErrorCategory::Validation,
            MonitorError::RevisionConflict { .. } | MonitorError::Worker(_) => {
                ErrorCategory::Consistency
            }
            MonitorError::Ledger(e) => e.category(),
            MonitorError::Storage(e) => e.category(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.category() == ErrorCategory::Transient
    }
}

pub type MonitorResult<T> = Result<T, MonitorError>;
