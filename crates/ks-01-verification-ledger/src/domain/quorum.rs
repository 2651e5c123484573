//! Quorum computation
//!
//! Pure over a snapshot of a subject's requests. Only the latest
//! non-archived request per distinct verifier counts, so re-issue rounds
//! never double-count a contact.

use super::request::{RequestStatus, VerificationRequest};
use serde::{Deserialize, Serialize};
use shared_types::{ContactId, Timestamp};
use std::collections::HashMap;

/// How denials affect quorum.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum VetoMode {
    /// Denials are recorded for audit only.
    #[default]
    AuditOnly,
    /// Any single denial blocks the quorum outright.
    AnyDenialBlocks,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuorumPolicy {
    pub required: u32,
    pub veto: VetoMode,
    /// One confirmation plus a verified legal document also satisfies.
    pub allow_document_substitute: bool,
}

impl QuorumPolicy {
    pub fn new(required: u32) -> Self {
        Self {
            required,
            veto: VetoMode::AuditOnly,
            allow_document_substitute: false,
        }
    }

    pub fn with_veto(mut self, veto: VetoMode) -> Self {
        self.veto = veto;
        self
    }

    pub fn with_document_substitute(mut self, allow: bool) -> Self {
        self.allow_document_substitute = allow;
        self
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuorumStatus {
    pub satisfied: bool,
    pub vetoed: bool,
    pub required: u32,
    pub confirmed: u32,
    pub denied: u32,
    pub pending: u32,
    pub expired: u32,
    /// At least one request can still be answered.
    pub window_open: bool,
    /// Latest expiry among open requests.
    pub window_closes_at: Option<Timestamp>,
    pub document_verified: bool,
}

impl QuorumStatus {
    /// Number of verifiers with a live request.
    pub fn total(&self) -> u32 {
        self.confirmed + self.denied + self.pending + self.expired
    }

    /// `confirmed/required` for the owner-facing status view.
    pub fn progress(&self) -> String {
        format!("{}/{}", self.confirmed, self.required)
    }
}

/// Latest non-archived request per verifier.
pub fn latest_per_verifier(
    requests: &[VerificationRequest],
) -> HashMap<ContactId, &VerificationRequest> {
    let mut latest: HashMap<ContactId, &VerificationRequest> = HashMap::new();
    for req in requests.iter().filter(|r| !r.archived) {
        match latest.get(&req.verifier) {
            Some(prev) if (prev.round, prev.created_at) >= (req.round, req.created_at) => {}
            _ => {
                latest.insert(req.verifier, req);
            }
        }
    }
    latest
}

pub fn compute_quorum(
    requests: &[VerificationRequest],
    policy: &QuorumPolicy,
    document_verified: bool,
    as_of: Timestamp,
) -> QuorumStatus {
    let mut status = QuorumStatus {
        required: policy.required,
        document_verified,
        ..QuorumStatus::default()
    };

    for req in latest_per_verifier(requests).into_values() {
        match req.effective_status(as_of) {
            RequestStatus::Confirmed => status.confirmed += 1,
            RequestStatus::Denied => status.denied += 1,
            RequestStatus::Expired => status.expired += 1,
            RequestStatus::Pending => {
                status.pending += 1;
                status.window_closes_at = status.window_closes_at.max(Some(req.expires_at));
            }
        }
    }

    status.window_open = status.pending > 0;
    status.vetoed = policy.veto == VetoMode::AnyDenialBlocks && status.denied > 0;

    let by_count = status.confirmed >= policy.required;
    let by_document =
        policy.allow_document_substitute && document_verified && status.confirmed >= 1;
    status.satisfied = !status.vetoed && (by_count || by_document);
    status
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::request::VerificationSubject;
    use chrono::{Duration, Utc};
    use shared_types::MessageId;

    fn req(subject: &VerificationSubject, verifier: ContactId, status: RequestStatus) -> VerificationRequest {
        let now = Utc::now();
        let mut r = VerificationRequest::new(subject.clone(), verifier, 1, now, now + Duration::days(7));
        r.status = status;
        r
    }

    fn subject() -> VerificationSubject {
        VerificationSubject::Message(MessageId::new())
    }

    #[test]
    fn test_two_of_three_satisfied_regardless_of_order() {
        let s = subject();
        let (a, b, c) = (ContactId::new(), ContactId::new(), ContactId::new());
        let policy = QuorumPolicy::new(2);
        let orders = [
            vec![
                req(&s, a, RequestStatus::Confirmed),
                req(&s, b, RequestStatus::Denied),
                req(&s, c, RequestStatus::Confirmed),
            ],
            vec![
                req(&s, c, RequestStatus::Confirmed),
                req(&s, a, RequestStatus::Confirmed),
                req(&s, b, RequestStatus::Expired),
            ],
            vec![
                req(&s, b, RequestStatus::Pending),
                req(&s, a, RequestStatus::Confirmed),
                req(&s, c, RequestStatus::Confirmed),
            ],
        ];
        for requests in orders {
            let q = compute_quorum(&requests, &policy, false, Utc::now());
            assert!(q.satisfied, "{q:?}");
            assert_eq!(q.confirmed, 2);
        }
    }

    #[test]
    fn test_one_confirmation_is_not_enough() {
        let s = subject();
        let requests = vec![
            req(&s, ContactId::new(), RequestStatus::Confirmed),
            req(&s, ContactId::new(), RequestStatus::Denied),
            req(&s, ContactId::new(), RequestStatus::Pending),
        ];
        let q = compute_quorum(&requests, &QuorumPolicy::new(2), false, Utc::now());
        assert!(!q.satisfied);
        assert!(q.window_open);
        assert_eq!((q.confirmed, q.denied, q.pending), (1, 1, 1));
        assert_eq!(q.progress(), "1/2");
    }

    #[test]
    fn test_veto_mode_blocks_on_single_denial() {
        let s = subject();
        let requests = vec![
            req(&s, ContactId::new(), RequestStatus::Confirmed),
            req(&s, ContactId::new(), RequestStatus::Confirmed),
            req(&s, ContactId::new(), RequestStatus::Denied),
        ];

        let audit = compute_quorum(&requests, &QuorumPolicy::new(2), false, Utc::now());
        assert!(audit.satisfied);
        assert!(!audit.vetoed);

        let veto = compute_quorum(
            &requests,
            &QuorumPolicy::new(2).with_veto(VetoMode::AnyDenialBlocks),
            false,
            Utc::now(),
        );
        assert!(!veto.satisfied);
        assert!(veto.vetoed);
    }

    #[test]
    fn test_overdue_pending_counts_as_expired() {
        let s = subject();
        let requests = vec![req(&s, ContactId::new(), RequestStatus::Pending)];
        let later = Utc::now() + Duration::days(8);
        let q = compute_quorum(&requests, &QuorumPolicy::new(1), false, later);
        assert_eq!((q.pending, q.expired), (0, 1));
        assert!(!q.window_open);
        assert_eq!(q.window_closes_at, None);
    }

    #[test]
    fn test_document_substitute() {
        let s = subject();
        let requests = vec![req(&s, ContactId::new(), RequestStatus::Confirmed)];

        let off = QuorumPolicy::new(2);
        assert!(!compute_quorum(&requests, &off, true, Utc::now()).satisfied);

        let on = QuorumPolicy::new(2).with_document_substitute(true);
        assert!(!compute_quorum(&requests, &on, false, Utc::now()).satisfied);
        assert!(compute_quorum(&requests, &on, true, Utc::now()).satisfied);
    }

    #[test]
    fn test_latest_round_wins_and_archived_ignored() {
        let s = subject();
        let verifier = ContactId::new();
        let mut old = req(&s, verifier, RequestStatus::Expired);
        old.round = 1;
        let mut new = req(&s, verifier, RequestStatus::Confirmed);
        new.round = 2;
        let mut archived = req(&s, ContactId::new(), RequestStatus::Confirmed);
        archived.archived = true;

        let q = compute_quorum(&[new, old, archived], &QuorumPolicy::new(1), false, Utc::now());
        assert_eq!((q.confirmed, q.expired), (1, 0));
        assert_eq!(q.total(), 1);
    }
}
