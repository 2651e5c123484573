//! Ports layer (hexagonal architecture)

pub mod inbound;
pub mod outbound;

pub use inbound::{IssueOutcome, RespondOutcome, TrustedContactRegistry, VerificationLedgerApi};
pub use outbound::VerificationRepository;
