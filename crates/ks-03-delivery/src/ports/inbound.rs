//! Driving Ports (API - Inbound)
//!
//! The owner-facing message operations. Owners write intents (create,
//! schedule, cancel) and read status; only the scheduler drives delivery.

use crate::domain::{FailureReason, Message, MessageStatus, Trigger};
use crate::error::DeliveryResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shared_types::{ContentRef, ErrorCategory, MessageId, MessageKind, OwnerId, Recipient, Timestamp};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewMessage {
    pub kind: MessageKind,
    pub title: String,
    pub recipient: Recipient,
    pub content_ref: Option<ContentRef>,
}

/// What the owner sees for one message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageStatusView {
    pub message_id: MessageId,
    pub status: MessageStatus,
    pub trigger: Option<String>,
    pub attempts: u32,
    pub failure_category: Option<ErrorCategory>,
    pub failure_reason: Option<FailureReason>,
    pub failure_detail: Option<String>,
    pub retry_at: Option<Timestamp>,
    pub delivered_at: Option<Timestamp>,
    /// `confirmed/required` while awaiting verification.
    pub quorum_progress: Option<String>,
}

#[async_trait]
pub trait MessageOperations: Send + Sync {
    async fn create_message(
        &self,
        owner: &OwnerId,
        new: NewMessage,
        now: Timestamp,
    ) -> DeliveryResult<Message>;

    /// Set or replace the content reference of a draft.
    async fn attach_content(
        &self,
        owner: &OwnerId,
        id: &MessageId,
        content_ref: ContentRef,
        now: Timestamp,
    ) -> DeliveryResult<Message>;

    /// Finalize a draft with its trigger.
    async fn schedule_message(
        &self,
        owner: &OwnerId,
        id: &MessageId,
        trigger: Trigger,
        now: Timestamp,
    ) -> DeliveryResult<Message>;

    async fn cancel_message(
        &self,
        owner: &OwnerId,
        id: &MessageId,
        now: Timestamp,
    ) -> DeliveryResult<Message>;

    fn get_message(&self, owner: &OwnerId, id: &MessageId) -> DeliveryResult<Message>;

    fn get_message_status(
        &self,
        owner: &OwnerId,
        id: &MessageId,
        as_of: Timestamp,
    ) -> DeliveryResult<MessageStatusView>;

    fn list_messages(&self, owner: &OwnerId) -> DeliveryResult<Vec<Message>>;
}
