//! # Error Types
//!
//! Errors raised by the collaborators every subsystem shares: the key-value
//! store, the content store, and the notifier.

use thiserror::Error;

/// Coarse classification used for retry decisions and for the failure
/// record persisted on a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ErrorCategory {
    /// Malformed input. Rejected synchronously, never retried.
    Validation,
    /// I/O or timeout. Retried with backoff.
    Transient,
    /// Concurrency or policy conflict. Retried only after state has changed.
    Consistency,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorCategory::Validation => "validation",
            ErrorCategory::Transient => "transient",
            ErrorCategory::Consistency => "consistency",
        };
        f.write_str(s)
    }
}

/// Key-value store failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KVStoreError {
    /// I/O error during read/write.
    #[error("KV store I/O error: {message}")]
    IOError { message: String },

    /// Stored bytes could not be decoded.
    #[error("KV store corruption: {message}")]
    CorruptionError { message: String },

    /// Key not found.
    #[error("Key not found in KV store")]
    NotFound,
}

impl KVStoreError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            KVStoreError::IOError { .. } => ErrorCategory::Transient,
            KVStoreError::CorruptionError { .. } | KVStoreError::NotFound => {
                ErrorCategory::Consistency
            }
        }
    }
}

/// Content store failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContentStoreError {
    /// The reference does not resolve to anything.
    #[error("Content not found: {content_ref}")]
    ContentNotFound { content_ref: String },

    /// The store did not answer in time.
    #[error("Content store timed out")]
    Timeout,

    /// The store is reachable but refused or failed the call.
    #[error("Content store unavailable: {0}")]
    Unavailable(String),
}

impl ContentStoreError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ContentStoreError::ContentNotFound { .. } => ErrorCategory::Validation,
            ContentStoreError::Timeout | ContentStoreError::Unavailable(_) => {
                ErrorCategory::Transient
            }
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.category() == ErrorCategory::Transient
    }
}

/// Notifier failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotifierError {
    /// Transport is down or timed out.
    #[error("Notifier unavailable: {0}")]
    Unavailable(String),

    /// The address was rejected by the transport.
    #[error("Invalid recipient: {0}")]
    InvalidRecipient(String),
}

impl NotifierError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            NotifierError::Unavailable(_) => ErrorCategory::Transient,
            NotifierError::InvalidRecipient(_) => ErrorCategory::Validation,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.category() == ErrorCategory::Transient
    }
}
