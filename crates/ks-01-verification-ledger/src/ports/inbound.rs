//! Driving Ports (API - Inbound)

use crate::domain::{
    Decision, DocumentVerification, QuorumPolicy, QuorumStatus, RequestStatus, TrustedContact,
    VerificationSubject,
};
use crate::error::LedgerResult;
use async_trait::async_trait;
use shared_types::{ContactId, OwnerId, RequestId, Timestamp, VerificationToken};

/// Result of `issue`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IssueOutcome {
    pub request_id: RequestId,
    pub token: VerificationToken,
    pub contact_email: String,
    pub expires_at: Timestamp,
    pub round: u32,
    /// False when an existing pending request was returned instead.
    /// Callers notify the verifier only when this is true.
    pub newly_issued: bool,
}

/// Result of a successful `respond`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RespondOutcome {
    pub request_id: RequestId,
    pub subject: VerificationSubject,
    pub status: RequestStatus,
}

/// Verification request bookkeeping and quorum reads.
#[async_trait]
pub trait VerificationLedgerApi: Send + Sync {
    /// Create one pending request for (subject, verifier) unless one is
    /// already pending, in which case the existing token is returned.
    async fn issue(
        &self,
        subject: VerificationSubject,
        verifier: ContactId,
        expires_at: Timestamp,
        now: Timestamp,
    ) -> LedgerResult<IssueOutcome>;

    /// Record a verifier's decision. A token answers exactly once.
    async fn respond(
        &self,
        token: &VerificationToken,
        decision: Decision,
        now: Timestamp,
    ) -> LedgerResult<RespondOutcome>;

    /// Pure read. Pending requests past their expiry at `as_of` count as expired.
    fn quorum_status(
        &self,
        subject: &VerificationSubject,
        policy: &QuorumPolicy,
        as_of: Timestamp,
    ) -> LedgerResult<QuorumStatus>;

    /// Verifiers whose latest request for `subject` has expired at `as_of`.
    fn expired_verifiers(
        &self,
        subject: &VerificationSubject,
        as_of: Timestamp,
    ) -> LedgerResult<Vec<ContactId>>;

    /// Mark every overdue pending request `Expired`. Returns how many changed.
    async fn expire_overdue(&self, now: Timestamp) -> LedgerResult<usize>;

    /// Close out a subject: pending requests expire and nothing it holds
    /// counts toward a future quorum. Returns how many requests changed.
    async fn archive_subject(
        &self,
        subject: &VerificationSubject,
        now: Timestamp,
    ) -> LedgerResult<usize>;

    async fn record_document_verification(
        &self,
        owner: &OwnerId,
        document_ref: String,
        verified_by: String,
        now: Timestamp,
    ) -> LedgerResult<DocumentVerification>;
}

/// Trusted contact registry.
#[async_trait]
pub trait TrustedContactRegistry: Send + Sync {
    async fn add_contact(
        &self,
        owner: &OwnerId,
        name: String,
        email: String,
        relation: String,
        now: Timestamp,
    ) -> LedgerResult<TrustedContact>;

    async fn mark_invitation_sent(
        &self,
        contact_id: &ContactId,
        now: Timestamp,
    ) -> LedgerResult<TrustedContact>;

    async fn respond_to_invitation(
        &self,
        contact_id: &ContactId,
        accept: bool,
        now: Timestamp,
    ) -> LedgerResult<TrustedContact>;

    fn get_contact(&self, contact_id: &ContactId) -> LedgerResult<TrustedContact>;

    fn list_contacts(&self, owner: &OwnerId) -> LedgerResult<Vec<TrustedContact>>;

    fn accepted_contacts(&self, owner: &OwnerId) -> LedgerResult<Vec<TrustedContact>>;

    async fn remove_contact(&self, owner: &OwnerId, contact_id: &ContactId) -> LedgerResult<()>;
}
