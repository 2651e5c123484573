//! Driven Ports (SPI - Outbound)
//!
//! Persistence the ledger requires. The production implementation is
//! `KvVerificationRepository` over the shared key-value store.

use crate::domain::{DocumentVerification, TrustedContact, VerificationRequest, VerificationSubject};
use crate::error::LedgerResult;
use shared_types::{ContactId, OwnerId, Timestamp, VerificationToken};

pub trait VerificationRepository: Send + Sync {
    fn find_by_token(&self, token: &VerificationToken) -> LedgerResult<Option<VerificationRequest>>;

    fn requests_for_subject(
        &self,
        subject: &VerificationSubject,
    ) -> LedgerResult<Vec<VerificationRequest>>;

    /// Pending requests whose window closed before `now`.
    fn overdue_pending(&self, now: Timestamp) -> LedgerResult<Vec<VerificationRequest>>;

    /// Atomically persist `requests` and their indexes.
    fn save_requests(&self, requests: &[VerificationRequest]) -> LedgerResult<()>;

    fn document_for(&self, owner: &OwnerId) -> LedgerResult<Option<DocumentVerification>>;

    fn save_document(&self, doc: &DocumentVerification) -> LedgerResult<()>;

    fn delete_document(&self, owner: &OwnerId) -> LedgerResult<()>;

    fn get_contact(&self, id: &ContactId) -> LedgerResult<Option<TrustedContact>>;

    fn contacts_for_owner(&self, owner: &OwnerId) -> LedgerResult<Vec<TrustedContact>>;

    fn save_contact(&self, contact: &TrustedContact) -> LedgerResult<()>;

    fn delete_contact(&self, contact: &TrustedContact) -> LedgerResult<()>;
}
