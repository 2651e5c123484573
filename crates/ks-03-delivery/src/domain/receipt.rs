//! Delivery idempotency receipts.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use shared_types::{MessageId, Timestamp};

/// Deterministic key for one delivery attempt of one message.
pub fn delivery_key(message_id: &MessageId, attempt: u32) -> String {
    let mut hasher = Sha256::new();
    hasher.update(message_id.0.as_bytes());
    hasher.update(attempt.to_be_bytes());
    hex::encode(hasher.finalize())
}

/// Written once the notifier acknowledged a delivery notice.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryReceipt {
    pub delivery_key: String,
    pub message_id: MessageId,
    pub attempt: u32,
    pub acknowledged_at: Timestamp,
}
