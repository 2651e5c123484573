//! # Control Surface
//!
//! The operations a host application exposes to owners, their trusted
//! contacts and recipients. Every call stamps `now` from the engine clock
//! and goes through the owning subsystem's inbound port; nothing here
//! mutates state directly.
//!
//! | Caller          | Operations |
//! |-----------------|------------|
//! | owner           | messages, content, contacts, check-in enrolment, `confirm_alive` |
//! | owner (token)   | `record_check_in` |
//! | trusted contact | `respond_to_invitation`, `respond_to_verification` |
//! | operator        | `record_document_verification` |

use std::sync::Arc;

use ks_01_verification_ledger::{
    Decision, DocumentVerification, LedgerError, RespondOutcome, TrustedContact,
    TrustedContactRegistry, VerificationLedgerApi,
};
use ks_02_liveness_monitor::{
    CheckIn, CheckInFrequency, CheckInSchedule, DeadMansSwitchApi, LivenessVerdict, MonitorError,
};
use ks_03_delivery::{
    DeliveryError, Message, MessageOperations, MessageStatusView, NewMessage, Trigger,
};
use shared_types::{
    ContactId, ContentRef, ContentStore, ContentStoreError, ErrorCategory, MessageId, OwnerId,
    TimeSource, VerificationToken,
};
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::container::EngineContainer;

#[derive(Debug, Error)]
pub enum ControlError {
    #[error(transparent)]
    Delivery(#[from] DeliveryError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Monitor(#[from] MonitorError),

    #[error(transparent)]
    Content(#[from] ContentStoreError),
}

impl ControlError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ControlError::Delivery(e) => e.category(),
            ControlError::Ledger(e) => e.category(),
            ControlError::Monitor(e) => e.category(),
            ControlError::Content(e) => e.category(),
        }
    }
}

pub type ControlResult<T> = Result<T, ControlError>;

/// Log a rejected call at the severity its category calls for.
fn logged<T>(op: &'static str, result: ControlResult<T>) -> ControlResult<T> {
    if let Err(e) = &result {
        match e.category() {
            ErrorCategory::Validation => debug!(op, error = %e, "[ks-node] request rejected"),
            ErrorCategory::Transient => warn!(op, error = %e, "[ks-node] request failed"),
            ErrorCategory::Consistency => error!(op, error = %e, "[ks-node] request failed"),
        }
    }
    result
}

/// Owner-facing facade over the engine.
#[derive(Clone)]
pub struct EngineControl {
    messages: Arc<dyn MessageOperations>,
    ledger: Arc<dyn VerificationLedgerApi>,
    contacts: Arc<dyn TrustedContactRegistry>,
    monitor: Arc<dyn DeadMansSwitchApi>,
    content: Arc<dyn ContentStore>,
    clock: Arc<dyn TimeSource>,
}

impl EngineControl {
    pub fn new(container: &EngineContainer) -> Self {
        Self {
            messages: container.messages.clone(),
            ledger: container.ledger.clone(),
            contacts: container.ledger.clone(),
            monitor: container.monitor.clone(),
            content: container.capabilities.content.clone(),
            clock: container.capabilities.clock.clone(),
        }
    }

    // =========================================================================
    // MESSAGES
    // =========================================================================

    /// Store a finished body and get the reference to attach.
    pub async fn upload_content(&self, bytes: Vec<u8>) -> ControlResult<ContentRef> {
        logged("upload_content", self.content.put(bytes).await.map_err(Into::into))
    }

    pub async fn create_message(&self, owner: &OwnerId, new: NewMessage) -> ControlResult<Message> {
        let now = self.clock.now();
        logged(
            "create_message",
            self.messages.create_message(owner, new, now).await.map_err(Into::into),
        )
    }

    pub async fn attach_content(
        &self,
        owner: &OwnerId,
        id: &MessageId,
        content_ref: ContentRef,
    ) -> ControlResult<Message> {
        let now = self.clock.now();
        logged(
            "attach_content",
            self.messages
                .attach_content(owner, id, content_ref, now)
                .await
                .map_err(Into::into),
        )
    }

    pub async fn schedule_message(
        &self,
        owner: &OwnerId,
        id: &MessageId,
        trigger: Trigger,
    ) -> ControlResult<Message> {
        let now = self.clock.now();
        logged(
            "schedule_message",
            self.messages
                .schedule_message(owner, id, trigger, now)
                .await
                .map_err(Into::into),
        )
    }

    pub async fn cancel_message(&self, owner: &OwnerId, id: &MessageId) -> ControlResult<Message> {
        let now = self.clock.now();
        logged(
            "cancel_message",
            self.messages.cancel_message(owner, id, now).await.map_err(Into::into),
        )
    }

    pub fn get_message_status(
        &self,
        owner: &OwnerId,
        id: &MessageId,
    ) -> ControlResult<MessageStatusView> {
        let now = self.clock.now();
        logged(
            "get_message_status",
            self.messages.get_message_status(owner, id, now).map_err(Into::into),
        )
    }

    pub fn list_messages(&self, owner: &OwnerId) -> ControlResult<Vec<Message>> {
        Ok(self.messages.list_messages(owner)?)
    }

    // =========================================================================
    // TRUSTED CONTACTS
    // =========================================================================

    pub async fn add_contact(
        &self,
        owner: &OwnerId,
        name: String,
        email: String,
        relation: String,
    ) -> ControlResult<TrustedContact> {
        let now = self.clock.now();
        logged(
            "add_contact",
            self.contacts
                .add_contact(owner, name, email, relation, now)
                .await
                .map_err(Into::into),
        )
    }

    /// The host sent the invitation e-mail.
    pub async fn mark_invitation_sent(
        &self,
        owner: &OwnerId,
        contact_id: &ContactId,
    ) -> ControlResult<TrustedContact> {
        self.owned_contact(owner, contact_id)?;
        let now = self.clock.now();
        logged(
            "mark_invitation_sent",
            self.contacts
                .mark_invitation_sent(contact_id, now)
                .await
                .map_err(Into::into),
        )
    }

    /// Called by the invited contact.
    pub async fn respond_to_invitation(
        &self,
        contact_id: &ContactId,
        accept: bool,
    ) -> ControlResult<TrustedContact> {
        let now = self.clock.now();
        logged(
            "respond_to_invitation",
            self.contacts
                .respond_to_invitation(contact_id, accept, now)
                .await
                .map_err(Into::into),
        )
    }

    pub fn list_contacts(&self, owner: &OwnerId) -> ControlResult<Vec<TrustedContact>> {
        Ok(self.contacts.list_contacts(owner)?)
    }

    pub async fn remove_contact(&self, owner: &OwnerId, contact_id: &ContactId) -> ControlResult<()> {
        logged(
            "remove_contact",
            self.contacts
                .remove_contact(owner, contact_id)
                .await
                .map_err(Into::into),
        )
    }

    fn owned_contact(&self, owner: &OwnerId, contact_id: &ContactId) -> ControlResult<TrustedContact> {
        let contact = self.contacts.get_contact(contact_id)?;
        if &contact.owner != owner {
            return Err(LedgerError::ContactNotFound {
                contact_id: *contact_id,
            }
            .into());
        }
        Ok(contact)
    }

    // =========================================================================
    // VERIFICATION
    // =========================================================================

    /// A verifier answers with the token from their request.
    pub async fn respond_to_verification(
        &self,
        token: &VerificationToken,
        decision: Decision,
    ) -> ControlResult<RespondOutcome> {
        let now = self.clock.now();
        logged(
            "respond_to_verification",
            self.ledger.respond(token, decision, now).await.map_err(Into::into),
        )
    }

    pub async fn record_document_verification(
        &self,
        owner: &OwnerId,
        document_ref: String,
        verified_by: String,
    ) -> ControlResult<DocumentVerification> {
        let now = self.clock.now();
        logged(
            "record_document_verification",
            self.ledger
                .record_document_verification(owner, document_ref, verified_by, now)
                .await
                .map_err(Into::into),
        )
    }

    // =========================================================================
    // LIVENESS
    // =========================================================================

    pub async fn enroll_check_in(
        &self,
        owner: &OwnerId,
        frequency: CheckInFrequency,
    ) -> ControlResult<CheckIn> {
        let now = self.clock.now();
        logged(
            "enroll_check_in",
            self.monitor.enroll(owner, frequency, now).await.map_err(Into::into),
        )
    }

    pub async fn next_check_in(&self, owner: &OwnerId) -> ControlResult<CheckInSchedule> {
        logged(
            "next_check_in",
            self.monitor.schedule_next_check_in(owner).await.map_err(Into::into),
        )
    }

    /// The owner followed the link in a check-in prompt.
    pub async fn record_check_in(&self, token: &VerificationToken) -> ControlResult<CheckIn> {
        let now = self.clock.now();
        logged(
            "record_check_in",
            self.monitor
                .record_check_in_by_token(token, now)
                .await
                .map_err(Into::into),
        )
    }

    /// Authenticated owner session, no token needed.
    pub async fn confirm_alive(&self, owner: &OwnerId) -> ControlResult<CheckIn> {
        let now = self.clock.now();
        logged(
            "confirm_alive",
            self.monitor.confirm_alive(owner, now).await.map_err(Into::into),
        )
    }

    pub fn liveness(&self, owner: &OwnerId) -> ControlResult<LivenessVerdict> {
        let now = self.clock.now();
        Ok(self.monitor.liveness_verdict(owner, now)?)
    }
}
