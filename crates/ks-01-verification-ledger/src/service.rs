//! Verification Ledger service
//!
//! Single writer for verification requests, document records, and trusted
//! contacts. Mutations are serialized by one mutex so that the
//! "at most one pending request per (subject, verifier)" rule holds even
//! when the scheduler and an owner request race.

use crate::domain::{
    compute_quorum, latest_per_verifier, next_invitation_status, Decision, DocumentVerification,
    InvitationStatus, QuorumPolicy, QuorumStatus, RequestStatus, TrustedContact,
    VerificationRequest, VerificationSubject,
};
use crate::error::{LedgerError, LedgerResult};
use crate::metrics;
use crate::ports::inbound::{
    IssueOutcome, RespondOutcome, TrustedContactRegistry, VerificationLedgerApi,
};
use crate::ports::outbound::VerificationRepository;
use async_trait::async_trait;
use parking_lot::Mutex;
use shared_bus::{EngineEvent, EventPublisher};
use shared_types::{ContactId, OwnerId, Timestamp, VerificationToken};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub struct VerificationLedger {
    repo: Arc<dyn VerificationRepository>,
    publisher: Arc<dyn EventPublisher>,
    write_lock: Mutex<()>,
}

impl VerificationLedger {
    pub fn new(repo: Arc<dyn VerificationRepository>, publisher: Arc<dyn EventPublisher>) -> Self {
        Self {
            repo,
            publisher,
            write_lock: Mutex::new(()),
        }
    }

    fn eligible_contact(&self, verifier: &ContactId) -> LedgerResult<TrustedContact> {
        let contact = self
            .repo
            .get_contact(verifier)?
            .ok_or(LedgerError::ContactNotFound {
                contact_id: *verifier,
            })?;
        if !contact.is_eligible_verifier() {
            return Err(LedgerError::ContactNotEligible {
                contact_id: contact.id,
                status: contact.invitation_status,
            });
        }
        Ok(contact)
    }

    fn issue_locked(
        &self,
        subject: &VerificationSubject,
        verifier: ContactId,
        expires_at: Timestamp,
        now: Timestamp,
    ) -> LedgerResult<IssueOutcome> {
        let contact = self.eligible_contact(&verifier)?;
        let existing = self.repo.requests_for_subject(subject)?;
        let pair: Vec<&VerificationRequest> = existing
            .iter()
            .filter(|r| r.verifier == verifier && !r.archived)
            .collect();

        if let Some(open) = pair
            .iter()
            .find(|r| r.status == RequestStatus::Pending && !r.is_overdue(now))
        {
            debug!(
                subject = %subject,
                request_id = %open.id,
                "[ks-01] pending request exists, re-issue is a no-op"
            );
            return Ok(IssueOutcome {
                request_id: open.id,
                token: open.token.clone(),
                contact_email: contact.email,
                expires_at: open.expires_at,
                round: open.round,
                newly_issued: false,
            });
        }

        if expires_at <= now {
            return Err(LedgerError::InvalidExpiry { expires_at, now });
        }

        let mut writes: Vec<VerificationRequest> = pair
            .iter()
            .filter(|r| r.is_overdue(now))
            .map(|r| {
                let mut r = (*r).clone();
                r.status = RequestStatus::Expired;
                r
            })
            .collect();

        let round = pair.iter().map(|r| r.round).max().unwrap_or(0) + 1;
        let request = VerificationRequest::new(subject.clone(), verifier, round, now, expires_at);
        writes.push(request.clone());
        self.repo.save_requests(&writes)?;

        metrics::record_request_issued();
        info!(
            subject = %subject,
            request_id = %request.id,
            contact_id = %verifier,
            round,
            expires_at = %expires_at,
            "[ks-01] verification request issued"
        );

        Ok(IssueOutcome {
            request_id: request.id,
            token: request.token,
            contact_email: contact.email,
            expires_at,
            round,
            newly_issued: true,
        })
    }

    fn respond_locked(
        &self,
        token: &VerificationToken,
        decision: Decision,
        now: Timestamp,
    ) -> LedgerResult<RespondOutcome> {
        let mut request = self
            .repo
            .find_by_token(token)?
            .ok_or(LedgerError::TokenNotFound)?;

        match request.status {
            RequestStatus::Confirmed | RequestStatus::Denied => {
                return Err(LedgerError::AlreadyResponded {
                    request_id: request.id,
                    status: request.status,
                })
            }
            RequestStatus::Expired => {
                return Err(LedgerError::TokenExpired {
                    request_id: request.id,
                })
            }
            RequestStatus::Pending => {}
        }

        if request.archived || request.is_overdue(now) {
            request.status = RequestStatus::Expired;
            self.repo.save_requests(std::slice::from_ref(&request))?;
            metrics::record_requests_expired(1);
            return Err(LedgerError::TokenExpired {
                request_id: request.id,
            });
        }

        let siblings = self.repo.requests_for_subject(&request.subject)?;
        if siblings.iter().any(|r| {
            r.id != request.id
                && r.verifier == request.verifier
                && r.round == request.round
                && !r.archived
                && r.status.is_answered()
        }) {
            error!(
                request_id = %request.id,
                contact_id = %request.verifier,
                round = request.round,
                "[ks-01] second live answer for the same verifier and round"
            );
            return Err(LedgerError::DuplicateVerificationResponse {
                request_id: request.id,
                contact_id: request.verifier,
            });
        }

        request.status = decision.into();
        request.responded_at = Some(now);
        self.repo.save_requests(std::slice::from_ref(&request))?;

        Ok(RespondOutcome {
            request_id: request.id,
            subject: request.subject,
            status: request.status,
        })
    }

    fn update_invitation(
        &self,
        contact_id: &ContactId,
        to: InvitationStatus,
        now: Timestamp,
    ) -> LedgerResult<TrustedContact> {
        let _guard = self.write_lock.lock();
        let mut contact = self
            .repo
            .get_contact(contact_id)?
            .ok_or(LedgerError::ContactNotFound {
                contact_id: *contact_id,
            })?;
        let from = contact.invitation_status;
        contact.invitation_status = next_invitation_status(from, to)
            .ok_or(LedgerError::InvalidInvitationTransition { from, to })?;
        contact.updated_at = now;
        self.repo.save_contact(&contact)?;

        info!(
            contact_id = %contact.id,
            owner_id = %contact.owner,
            from = ?from,
            to = ?contact.invitation_status,
            "[ks-01] invitation status changed"
        );
        Ok(contact)
    }
}

#[async_trait]
impl VerificationLedgerApi for VerificationLedger {
    async fn issue(
        &self,
        subject: VerificationSubject,
        verifier: ContactId,
        expires_at: Timestamp,
        now: Timestamp,
    ) -> LedgerResult<IssueOutcome> {
        let outcome = {
            let _guard = self.write_lock.lock();
            self.issue_locked(&subject, verifier, expires_at, now)?
        };

        if outcome.newly_issued {
            self.publisher
                .publish(EngineEvent::VerificationIssued {
                    request_id: outcome.request_id,
                    subject: subject.to_string(),
                    contact_id: verifier,
                    round: outcome.round,
                })
                .await;
        }
        Ok(outcome)
    }

    async fn respond(
        &self,
        token: &VerificationToken,
        decision: Decision,
        now: Timestamp,
    ) -> LedgerResult<RespondOutcome> {
        let result = {
            let _guard = self.write_lock.lock();
            self.respond_locked(token, decision, now)
        };

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                let reason = match &e {
                    LedgerError::TokenNotFound => "token_not_found",
                    LedgerError::TokenExpired { .. } => "token_expired",
                    LedgerError::AlreadyResponded { .. } => "already_responded",
                    LedgerError::DuplicateVerificationResponse { .. } => "duplicate",
                    _ => "other",
                };
                metrics::record_rejected_response(reason);
                debug!(error = %e, "[ks-01] verification response rejected");
                return Err(e);
            }
        };

        let confirmed = outcome.status == RequestStatus::Confirmed;
        metrics::record_response(if confirmed { "confirm" } else { "deny" });
        info!(
            request_id = %outcome.request_id,
            subject = %outcome.subject,
            confirmed,
            "[ks-01] verification response recorded"
        );

        self.publisher
            .publish(EngineEvent::VerificationResponded {
                request_id: outcome.request_id,
                subject: outcome.subject.to_string(),
                confirmed,
            })
            .await;
        Ok(outcome)
    }

    fn quorum_status(
        &self,
        subject: &VerificationSubject,
        policy: &QuorumPolicy,
        as_of: Timestamp,
    ) -> LedgerResult<QuorumStatus> {
        let requests = self.repo.requests_for_subject(subject)?;
        let document_verified = match subject {
            VerificationSubject::Owner(owner) => self.repo.document_for(owner)?.is_some(),
            VerificationSubject::Message(_) => false,
        };
        Ok(compute_quorum(&requests, policy, document_verified, as_of))
    }

    fn expired_verifiers(
        &self,
        subject: &VerificationSubject,
        as_of: Timestamp,
    ) -> LedgerResult<Vec<ContactId>> {
        let requests = self.repo.requests_for_subject(subject)?;
        let mut expired: Vec<ContactId> = latest_per_verifier(&requests)
            .into_iter()
            .filter(|(_, r)| r.effective_status(as_of) == RequestStatus::Expired)
            .map(|(id, _)| id)
            .collect();
        expired.sort();
        Ok(expired)
    }

    async fn expire_overdue(&self, now: Timestamp) -> LedgerResult<usize> {
        let _guard = self.write_lock.lock();
        let mut overdue = self.repo.overdue_pending(now)?;
        if overdue.is_empty() {
            return Ok(0);
        }
        for req in overdue.iter_mut() {
            req.status = RequestStatus::Expired;
        }
        self.repo.save_requests(&overdue)?;

        metrics::record_requests_expired(overdue.len() as u64);
        debug!(count = overdue.len(), "[ks-01] overdue requests expired");
        Ok(overdue.len())
    }

    async fn archive_subject(
        &self,
        subject: &VerificationSubject,
        now: Timestamp,
    ) -> LedgerResult<usize> {
        let _guard = self.write_lock.lock();
        let mut changed: Vec<VerificationRequest> = self
            .repo
            .requests_for_subject(subject)?
            .into_iter()
            .filter(|r| !r.archived)
            .collect();
        let mut expired = 0u64;
        for req in changed.iter_mut() {
            if req.status == RequestStatus::Pending {
                req.status = RequestStatus::Expired;
                expired += 1;
            }
            req.archived = true;
        }
        if !changed.is_empty() {
            self.repo.save_requests(&changed)?;
        }
        if let VerificationSubject::Owner(owner) = subject {
            self.repo.delete_document(owner)?;
        }

        metrics::record_requests_expired(expired);
        info!(
            subject = %subject,
            archived = changed.len(),
            expired,
            at = %now,
            "[ks-01] subject archived"
        );
        Ok(changed.len())
    }

    async fn record_document_verification(
        &self,
        owner: &OwnerId,
        document_ref: String,
        verified_by: String,
        now: Timestamp,
    ) -> LedgerResult<DocumentVerification> {
        if document_ref.trim().is_empty() {
            return Err(LedgerError::InvalidDocument {
                reason: "document reference is empty".into(),
            });
        }
        if verified_by.trim().is_empty() {
            return Err(LedgerError::InvalidDocument {
                reason: "verifier is empty".into(),
            });
        }

        let doc = DocumentVerification {
            owner: owner.clone(),
            document_ref,
            verified_by,
            recorded_at: now,
        };
        {
            let _guard = self.write_lock.lock();
            self.repo.save_document(&doc)?;
        }
        info!(owner_id = %owner, verified_by = %doc.verified_by, "[ks-01] legal document verification recorded");
        Ok(doc)
    }
}

#[async_trait]
impl TrustedContactRegistry for VerificationLedger {
    async fn add_contact(
        &self,
        owner: &OwnerId,
        name: String,
        email: String,
        relation: String,
        now: Timestamp,
    ) -> LedgerResult<TrustedContact> {
        let contact = TrustedContact::new(owner.clone(), name, email, relation, now);
        if let Some(reason) = contact.validation_error() {
            return Err(LedgerError::InvalidContact { reason });
        }
        {
            let _guard = self.write_lock.lock();
            self.repo.save_contact(&contact)?;
        }
        info!(owner_id = %owner, contact_id = %contact.id, "[ks-01] trusted contact added");
        Ok(contact)
    }

    async fn mark_invitation_sent(
        &self,
        contact_id: &ContactId,
        now: Timestamp,
    ) -> LedgerResult<TrustedContact> {
        self.update_invitation(contact_id, InvitationStatus::Sent, now)
    }

    async fn respond_to_invitation(
        &self,
        contact_id: &ContactId,
        accept: bool,
        now: Timestamp,
    ) -> LedgerResult<TrustedContact> {
        let to = if accept {
            InvitationStatus::Accepted
        } else {
            InvitationStatus::Declined
        };
        self.update_invitation(contact_id, to, now)
    }

    fn get_contact(&self, contact_id: &ContactId) -> LedgerResult<TrustedContact> {
        self.repo
            .get_contact(contact_id)?
            .ok_or(LedgerError::ContactNotFound {
                contact_id: *contact_id,
            })
    }

    fn list_contacts(&self, owner: &OwnerId) -> LedgerResult<Vec<TrustedContact>> {
        self.repo.contacts_for_owner(owner)
    }

    fn accepted_contacts(&self, owner: &OwnerId) -> LedgerResult<Vec<TrustedContact>> {
        Ok(self
            .repo
            .contacts_for_owner(owner)?
            .into_iter()
            .filter(TrustedContact::is_eligible_verifier)
            .collect())
    }

    async fn remove_contact(&self, owner: &OwnerId, contact_id: &ContactId) -> LedgerResult<()> {
        let _guard = self.write_lock.lock();
        let contact = self
            .repo
            .get_contact(contact_id)?
            .filter(|c| &c.owner == owner)
            .ok_or(LedgerError::ContactNotFound {
                contact_id: *contact_id,
            })?;
        self.repo.delete_contact(&contact)?;
        warn!(owner_id = %owner, contact_id = %contact_id, "[ks-01] trusted contact removed");
        Ok(())
    }
}
