//! # ks-01-verification-ledger
//!
//! Durable, idempotent bookkeeping of verification requests and quorum.
//!
//! ## Overview
//!
//! - **Requests**: one pending request per (subject, verifier); re-issuing
//!   returns the same token so verifiers are never spammed.
//! - **Tokens**: single use. A second answer is rejected, never ignored.
//! - **Quorum**: a pure read over the latest request per verifier. Denials
//!   are audit-only unless the veto mode says otherwise.
//! - **Trusted contacts**: only `Accepted` contacts may verify.
//!
//! ```text
//! Scheduler ──issue──→ Ledger ←──respond── verifier (token)
//!     │                  │
//!     └──quorum_status───┘   (pure read, no side effects)
//! ```
//!
//! Subjects are either a message (event triggers) or an owner
//! (posthumous escalation).

pub mod adapters;
pub mod domain;
pub mod error;
pub mod metrics;
pub mod ports;
pub mod service;

pub use adapters::KvVerificationRepository;
pub use domain::{
    Decision, DocumentVerification, InvitationStatus, QuorumPolicy, QuorumStatus, RequestStatus,
    TrustedContact, VerificationRequest, VerificationSubject, VetoMode,
};
pub use error::{LedgerError, LedgerResult};
pub use ports::{IssueOutcome, RespondOutcome, TrustedContactRegistry, VerificationLedgerApi};
pub use service::VerificationLedger;
