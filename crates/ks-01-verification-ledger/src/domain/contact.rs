//! Trusted contacts and their invitation lifecycle
//!
//! ```text
//! NotSent ──sent──→ Sent ──accept──→ Accepted
//!                    │  ↑
//!                 decline  re-invite
//!                    ↓  │
//!                  Declined
//! ```

use serde::{Deserialize, Serialize};
use shared_types::{is_plausible_email, ContactId, OwnerId, Timestamp};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InvitationStatus {
    NotSent,
    Sent,
    Accepted,
    Declined,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustedContact {
    pub id: ContactId,
    pub owner: OwnerId,
    pub name: String,
    pub email: String,
    pub relation: String,
    pub invitation_status: InvitationStatus,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl TrustedContact {
    pub fn new(
        owner: OwnerId,
        name: impl Into<String>,
        email: impl Into<String>,
        relation: impl Into<String>,
        now: Timestamp,
    ) -> Self {
        Self {
            id: ContactId::new(),
            owner,
            name: name.into(),
            email: email.into(),
            relation: relation.into(),
            invitation_status: InvitationStatus::NotSent,
            created_at: now,
            updated_at: now,
        }
    }

    /// Reason the contact details are unusable, if any.
    pub fn validation_error(&self) -> Option<String> {
        if self.name.trim().is_empty() {
            return Some("name is empty".to_string());
        }
        if !is_plausible_email(&self.email) {
            return Some(format!("'{}' is not an e-mail address", self.email));
        }
        None
    }

    pub fn is_eligible_verifier(&self) -> bool {
        self.invitation_status == InvitationStatus::Accepted
    }
}

/// Next invitation status, or `None` if the move is not allowed.
pub fn next_invitation_status(
    from: InvitationStatus,
    to: InvitationStatus,
) -> Option<InvitationStatus> {
    use InvitationStatus::*;
    match (from, to) {
        (NotSent | Declined | Sent, Sent) => Some(Sent),
        (Sent, Accepted) => Some(Accepted),
        (Sent, Declined) => Some(Declined),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use InvitationStatus::*;

    #[test]
    fn test_invitation_transitions() {
        assert_eq!(next_invitation_status(NotSent, Sent), Some(Sent));
        assert_eq!(next_invitation_status(Sent, Sent), Some(Sent));
        assert_eq!(next_invitation_status(Sent, Accepted), Some(Accepted));
        assert_eq!(next_invitation_status(Sent, Declined), Some(Declined));
        assert_eq!(next_invitation_status(Declined, Sent), Some(Sent));

        assert_eq!(next_invitation_status(NotSent, Accepted), None);
        assert_eq!(next_invitation_status(Accepted, Sent), None);
        assert_eq!(next_invitation_status(Accepted, Declined), None);
    }

    #[test]
    fn test_validation() {
        let now = Utc::now();
        let ok = TrustedContact::new(OwnerId::new("o"), "Ada", "ada@example.com", "sister", now);
        assert!(ok.validation_error().is_none());
        assert!(!ok.is_eligible_verifier());

        let bad = TrustedContact::new(OwnerId::new("o"), " ", "ada@example.com", "", now);
        assert!(bad.validation_error().is_some());

        let bad_email = TrustedContact::new(OwnerId::new("o"), "Ada", "ada", "", now);
        assert!(bad_email.validation_error().is_some());
    }
}
