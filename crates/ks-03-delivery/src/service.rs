//! Message service: the owner-facing side of delivery.

use crate::domain::{DeliveryStateMachine, Effect, Message, MessageStatus, Trigger};
use crate::error::{DeliveryError, DeliveryResult};
use crate::metrics;
use crate::ports::inbound::{MessageOperations, MessageStatusView, NewMessage};
use crate::ports::outbound::MessageRepository;
use async_trait::async_trait;
use ks_01_verification_ledger::{LedgerError, TrustedContactRegistry, VerificationLedgerApi};
use ks_02_liveness_monitor::DeadMansSwitchApi;
use shared_bus::{EngineEvent, EventPublisher};
use shared_types::{ContentRef, MessageId, OwnerId, Timestamp};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct MessageService {
    repo: Arc<dyn MessageRepository>,
    machine: Arc<DeliveryStateMachine>,
    contacts: Arc<dyn TrustedContactRegistry>,
    ledger: Arc<dyn VerificationLedgerApi>,
    monitor: Arc<dyn DeadMansSwitchApi>,
    publisher: Arc<dyn EventPublisher>,
}

impl MessageService {
    pub fn new(
        repo: Arc<dyn MessageRepository>,
        machine: Arc<DeliveryStateMachine>,
        contacts: Arc<dyn TrustedContactRegistry>,
        ledger: Arc<dyn VerificationLedgerApi>,
        monitor: Arc<dyn DeadMansSwitchApi>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            repo,
            machine,
            contacts,
            ledger,
            monitor,
            publisher,
        }
    }

    fn owned(&self, owner: &OwnerId, id: &MessageId) -> DeliveryResult<Message> {
        self.repo
            .get(id)?
            .filter(|m| &m.owner == owner)
            .ok_or(DeliveryError::MessageNotFound { message_id: *id })
    }

    /// Every event verifier must be an accepted contact of this owner.
    fn check_verifiers(&self, owner: &OwnerId, trigger: &Trigger) -> DeliveryResult<()> {
        match trigger {
            Trigger::Event { verifier_ids, .. } => {
                for id in verifier_ids {
                    let contact = match self.contacts.get_contact(id) {
                        Ok(c) if &c.owner == owner => c,
                        Ok(_) | Err(LedgerError::ContactNotFound { .. }) => {
                            return Err(DeliveryError::InvalidTrigger {
                                reason: format!("verifier {id} is not a trusted contact"),
                            })
                        }
                        Err(e) => return Err(e.into()),
                    };
                    if !contact.is_eligible_verifier() {
                        return Err(DeliveryError::InvalidTrigger {
                            reason: format!(
                                "verifier {id} has not accepted ({:?})",
                                contact.invitation_status
                            ),
                        });
                    }
                }
                Ok(())
            }
            Trigger::Posthumous => {
                if self.monitor.get_check_in(owner)?.is_none() {
                    return Err(DeliveryError::InvalidTrigger {
                        reason: "owner is not enrolled in check-ins".into(),
                    });
                }
                Ok(())
            }
            Trigger::Date { .. } => Ok(()),
        }
    }

    fn quorum_progress(&self, message: &Message, as_of: Timestamp) -> DeliveryResult<Option<String>> {
        if message.status != MessageStatus::AwaitingVerification {
            return Ok(None);
        }
        Ok(match &message.trigger {
            Some(Trigger::Event {
                required_confirmations,
                ..
            }) => {
                let policy = self.machine.config().event_policy(*required_confirmations);
                Some(
                    self.ledger
                        .quorum_status(&message.subject(), &policy, as_of)?
                        .progress(),
                )
            }
            Some(Trigger::Posthumous) => self
                .monitor
                .liveness_verdict(&message.owner, as_of)?
                .progress(),
            _ => None,
        })
    }
}

#[async_trait]
impl MessageOperations for MessageService {
    async fn create_message(
        &self,
        owner: &OwnerId,
        new: NewMessage,
        now: Timestamp,
    ) -> DeliveryResult<Message> {
        if !new.recipient.has_plausible_email() {
            return Err(DeliveryError::InvalidMessage {
                reason: format!("'{}' is not an e-mail address", new.recipient.email),
            });
        }
        let message = Message::draft(
            owner.clone(),
            new.kind,
            new.title,
            new.recipient,
            new.content_ref,
            now,
        );
        let message = self.repo.save(&message)?;
        metrics::record_message_created();
        info!(message_id = %message.id, owner_id = %owner, kind = %message.kind, "[ks-03] draft created");
        Ok(message)
    }

    async fn attach_content(
        &self,
        owner: &OwnerId,
        id: &MessageId,
        content_ref: ContentRef,
        now: Timestamp,
    ) -> DeliveryResult<Message> {
        let mut message = self.owned(owner, id)?;
        if message.status != MessageStatus::Draft {
            return Err(DeliveryError::InvalidStateTransition {
                message_id: *id,
                from: message.status,
                attempted: "attach content".into(),
            });
        }
        message.content_ref = Some(content_ref);
        message.updated_at = now;
        self.repo.save(&message)
    }

    async fn schedule_message(
        &self,
        owner: &OwnerId,
        id: &MessageId,
        trigger: Trigger,
        now: Timestamp,
    ) -> DeliveryResult<Message> {
        let message = self.owned(owner, id)?;
        self.check_verifiers(owner, &trigger)?;
        let scheduled = match self.machine.finalize(&message, trigger, now) {
            Ok(m) => m,
            Err(e) => {
                debug!(message_id = %id, error = %e, "[ks-03] finalize rejected");
                return Err(e);
            }
        };
        let scheduled = self.repo.save(&scheduled)?;

        let trigger_kind = scheduled
            .trigger
            .as_ref()
            .map(Trigger::kind)
            .unwrap_or("none");
        metrics::record_message_scheduled(trigger_kind);
        info!(message_id = %id, owner_id = %owner, trigger = trigger_kind, "[ks-03] message scheduled");
        self.publisher
            .publish(EngineEvent::MessageScheduled {
                message_id: *id,
                owner_id: owner.clone(),
                trigger: trigger_kind.to_string(),
            })
            .await;
        Ok(scheduled)
    }

    async fn cancel_message(
        &self,
        owner: &OwnerId,
        id: &MessageId,
        now: Timestamp,
    ) -> DeliveryResult<Message> {
        let message = self.owned(owner, id)?;
        let transition = self.machine.cancel(&message, now)?;
        let cancelled = self.repo.save(&transition.message)?;

        if transition.effect == Some(Effect::ArchiveVerification) {
            if let Err(e) = self.ledger.archive_subject(&cancelled.subject(), now).await {
                warn!(message_id = %id, error = %e, "[ks-03] could not archive verification subject");
            }
        }

        metrics::record_message_cancelled();
        info!(message_id = %id, owner_id = %owner, from = %message.status, "[ks-03] message cancelled");
        self.publisher
            .publish(EngineEvent::MessageCancelled { message_id: *id })
            .await;
        Ok(cancelled)
    }

    fn get_message(&self, owner: &OwnerId, id: &MessageId) -> DeliveryResult<Message> {
        self.owned(owner, id)
    }

    fn get_message_status(
        &self,
        owner: &OwnerId,
        id: &MessageId,
        as_of: Timestamp,
    ) -> DeliveryResult<MessageStatusView> {
        let message = self.owned(owner, id)?;
        let quorum_progress = self.quorum_progress(&message, as_of)?;
        let failure = message
            .last_failure
            .as_ref()
            .filter(|_| message.status == MessageStatus::Failed);

        Ok(MessageStatusView {
            message_id: message.id,
            status: message.status,
            trigger: message.trigger.as_ref().map(|t| t.kind().to_string()),
            attempts: message.attempts,
            failure_category: failure.map(|f| f.reason.category()),
            failure_reason: failure.map(|f| f.reason),
            failure_detail: failure.map(|f| f.detail.clone()),
            retry_at: message.retry_at,
            delivered_at: message.delivered_at,
            quorum_progress,
        })
    }

    fn list_messages(&self, owner: &OwnerId) -> DeliveryResult<Vec<Message>> {
        self.repo.for_owner(owner)
    }
}
