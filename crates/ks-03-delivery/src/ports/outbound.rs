//! Driven Ports (SPI - Outbound)

use crate::domain::{DeliveryReceipt, Message, MessageStatus};
use crate::error::DeliveryResult;
use shared_types::{MessageId, OwnerId};

pub trait MessageRepository: Send + Sync {
    fn get(&self, id: &MessageId) -> DeliveryResult<Option<Message>>;

    /// Compare-and-set on `message.revision` (0 for a new message).
    /// Returns the stored message with the revision bumped.
    fn save(&self, message: &Message) -> DeliveryResult<Message>;

    /// Messages in `status`, ascending `created_at`.
    fn by_status(&self, status: MessageStatus) -> DeliveryResult<Vec<Message>>;

    fn for_owner(&self, owner: &OwnerId) -> DeliveryResult<Vec<Message>>;

    fn receipt(&self, delivery_key: &str) -> DeliveryResult<Option<DeliveryReceipt>>;

    fn save_receipt(&self, receipt: &DeliveryReceipt) -> DeliveryResult<()>;
}
