//! Key-value backed message repository
//!
//! | Key | Value |
//! |-----|-------|
//! | `msg/rec/{message_id}` | `Message` |
//! | `msg/status/{status}/{created_millis}/{message_id}` | empty |
//! | `msg/owner/{owner_hex}/{created_millis}/{message_id}` | empty |
//! | `dl/receipt/{delivery_key}` | `DeliveryReceipt` |

use crate::domain::{DeliveryReceipt, Message, MessageStatus};
use crate::error::{DeliveryError, DeliveryResult};
use crate::ports::outbound::MessageRepository;
use shared_types::storage::{decode, encode, millis_component};
use shared_types::{
    timestamp_key, BatchOperation, KVStoreError, MessageId, OwnerId, SharedKvStore,
};

pub struct KvMessageRepository {
    store: SharedKvStore,
}

impl KvMessageRepository {
    pub fn new(store: SharedKvStore) -> Self {
        Self { store }
    }

    fn record_key(id: &MessageId) -> Vec<u8> {
        format!("msg/rec/{id}").into_bytes()
    }

    fn status_prefix(status: MessageStatus) -> String {
        format!("msg/status/{}/", status.as_str())
    }

    fn status_key(message: &Message) -> Vec<u8> {
        format!(
            "{}{}/{}",
            Self::status_prefix(message.status),
            millis_component(timestamp_key(&message.created_at)),
            message.id
        )
        .into_bytes()
    }

    fn owner_prefix(owner: &OwnerId) -> String {
        format!("msg/owner/{}/", hex::encode(owner.as_str()))
    }

    fn owner_key(message: &Message) -> Vec<u8> {
        format!(
            "{}{}/{}",
            Self::owner_prefix(&message.owner),
            millis_component(timestamp_key(&message.created_at)),
            message.id
        )
        .into_bytes()
    }

    fn receipt_key(delivery_key: &str) -> Vec<u8> {
        format!("dl/receipt/{delivery_key}").into_bytes()
    }

    fn id_from_index_key(key: &[u8]) -> Result<MessageId, KVStoreError> {
        let key = String::from_utf8_lossy(key);
        key.rsplit('/')
            .next()
            .and_then(MessageId::parse)
            .ok_or_else(|| KVStoreError::CorruptionError {
                message: format!("malformed index key {key}"),
            })
    }

    fn scan(&self, prefix: &str) -> DeliveryResult<Vec<Message>> {
        let entries = self.store.read().prefix_scan(prefix.as_bytes())?;
        let mut messages = Vec::with_capacity(entries.len());
        for (key, _) in entries {
            let id = Self::id_from_index_key(&key)?;
            if let Some(message) = self.get(&id)? {
                messages.push(message);
            }
        }
        Ok(messages)
    }
}

impl MessageRepository for KvMessageRepository {
    fn get(&self, id: &MessageId) -> DeliveryResult<Option<Message>> {
        let bytes = self.store.read().get(&Self::record_key(id))?;
        Ok(bytes.map(|b| decode(&b)).transpose()?)
    }

    fn save(&self, message: &Message) -> DeliveryResult<Message> {
        let key = Self::record_key(&message.id);
        let mut store = self.store.write();

        let existing: Option<Message> = store.get(&key)?.map(|b| decode(&b)).transpose()?;
        let found = existing.as_ref().map(|m| m.revision).unwrap_or(0);
        if existing.is_some() == (message.revision == 0) || found != message.revision {
            return Err(DeliveryError::RevisionConflict {
                message_id: message.id,
                expected: message.revision,
                found,
            });
        }

        let mut ops = Vec::with_capacity(4);
        match &existing {
            Some(old) if old.status != message.status => {
                ops.push(BatchOperation::delete(Self::status_key(old)));
                ops.push(BatchOperation::put(Self::status_key(message), Vec::new()));
            }
            Some(_) => {}
            None => {
                ops.push(BatchOperation::put(Self::status_key(message), Vec::new()));
                ops.push(BatchOperation::put(Self::owner_key(message), Vec::new()));
            }
        }

        let mut stored = message.clone();
        stored.revision = message.revision + 1;
        ops.push(BatchOperation::put(key, encode(&stored)?));
        store.atomic_batch_write(ops)?;
        Ok(stored)
    }

    fn by_status(&self, status: MessageStatus) -> DeliveryResult<Vec<Message>> {
        self.scan(&Self::status_prefix(status))
    }

    fn for_owner(&self, owner: &OwnerId) -> DeliveryResult<Vec<Message>> {
        self.scan(&Self::owner_prefix(owner))
    }

    fn receipt(&self, delivery_key: &str) -> DeliveryResult<Option<DeliveryReceipt>> {
        let bytes = self.store.read().get(&Self::receipt_key(delivery_key))?;
        Ok(bytes.map(|b| decode(&b)).transpose()?)
    }

    fn save_receipt(&self, receipt: &DeliveryReceipt) -> DeliveryResult<()> {
        let value = encode(receipt)?;
        self.store
            .write()
            .put(&Self::receipt_key(&receipt.delivery_key), &value)?;
        Ok(())
    }
}
