//! Domain layer for the Verification Ledger

pub mod contact;
pub mod quorum;
pub mod request;

pub use contact::{next_invitation_status, InvitationStatus, TrustedContact};
pub use quorum::{compute_quorum, latest_per_verifier, QuorumPolicy, QuorumStatus, VetoMode};
pub use request::{
    Decision, DocumentVerification, RequestStatus, VerificationRequest, VerificationSubject,
};
