//! Error types for the Scheduler

use ks_01_verification_ledger::LedgerError;
use ks_02_liveness_monitor::MonitorError;
use ks_03_delivery::DeliveryError;
use shared_types::{ErrorCategory, MessageId};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    /// Another worker holds the message.
    #[error("Lease contention on message {message_id}")]
    LeaseContention { message_id: MessageId },

    #[error("Delivery error: {0}")]
    Delivery(#[from] DeliveryError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Monitor error: {0}")]
    Monitor(#[from] MonitorError),

    /// A worker task panicked or was cancelled.
    #[error("Worker failed: {0}")]
    Worker(String),
}

impl SchedulerError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            SchedulerError::LeaseContention { .. } => ErrorCategory::Transient,
            SchedulerError::Delivery(e) => e.category(),
            SchedulerError::Ledger(e) => e.category(),
            SchedulerError::Monitor(e) => e.category(),
            SchedulerError::Worker(_) => ErrorCategory::Consistency,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.category() == ErrorCategory::Transient
    }
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;
