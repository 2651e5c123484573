//! Key-value backed check-in repository
//!
//! | Key | Value |
//! |-----|-------|
//! | `ci/owner/{owner_hex}` | `CheckIn` |
//! | `ci/token/{token}` | owner id |
//! | `ci/due/{attention_millis}/{owner_hex}` | empty |

use crate::domain::CheckIn;
use crate::error::{MonitorError, MonitorResult};
use crate::ports::outbound::CheckInRepository;
use chrono::Duration;
use shared_types::storage::{decode, encode, millis_component};
use shared_types::{
    timestamp_key, BatchOperation, KVStoreError, OwnerId, SharedKvStore, Timestamp,
    VerificationToken,
};

const DUE_PREFIX: &str = "ci/due/";

pub struct KvCheckInRepository {
    store: SharedKvStore,
}

impl KvCheckInRepository {
    pub fn new(store: SharedKvStore) -> Self {
        Self { store }
    }

    fn record_key(owner: &OwnerId) -> Vec<u8> {
        format!("ci/owner/{}", hex::encode(owner.as_str())).into_bytes()
    }

    fn token_key(token: &VerificationToken) -> Vec<u8> {
        format!("ci/token/{}", token.as_str()).into_bytes()
    }

    fn due_key(record: &CheckIn, reminder_lead: Duration) -> Option<Vec<u8>> {
        record.attention_at(reminder_lead).map(|at| {
            format!(
                "{DUE_PREFIX}{}/{}",
                millis_component(timestamp_key(&at)),
                hex::encode(record.owner.as_str())
            )
            .into_bytes()
        })
    }

    fn owner_from_due_key(key: &[u8]) -> Result<OwnerId, KVStoreError> {
        let text = String::from_utf8_lossy(key);
        text.rsplit('/')
            .next()
            .and_then(|h| hex::decode(h).ok())
            .and_then(|raw| String::from_utf8(raw).ok())
            .map(OwnerId::new)
            .ok_or_else(|| KVStoreError::CorruptionError {
                message: format!("malformed due index key {text}"),
            })
    }
}

impl CheckInRepository for KvCheckInRepository {
    fn get(&self, owner: &OwnerId) -> MonitorResult<Option<CheckIn>> {
        let bytes = self.store.read().get(&Self::record_key(owner))?;
        Ok(bytes.map(|b| decode(&b)).transpose()?)
    }

    fn find_by_token(&self, token: &VerificationToken) -> MonitorResult<Option<CheckIn>> {
        let Some(raw) = self.store.read().get(&Self::token_key(token))? else {
            return Ok(None);
        };
        let owner: OwnerId = decode(&raw)?;
        self.get(&owner)
    }

    fn save(&self, record: &CheckIn, reminder_lead: Duration) -> MonitorResult<CheckIn> {
        let key = Self::record_key(&record.owner);
        let mut store = self.store.write();

        let existing: Option<CheckIn> = store.get(&key)?.map(|b| decode(&b)).transpose()?;
        let found = existing.as_ref().map(|c| c.revision).unwrap_or(0);
        if existing.is_some() == (record.revision == 0) || found != record.revision {
            return Err(MonitorError::RevisionConflict {
                owner: record.owner.clone(),
                expected: record.revision,
                found,
            });
        }

        let mut ops = Vec::new();
        if let Some(old) = &existing {
            if old.token != record.token {
                ops.push(BatchOperation::delete(Self::token_key(&old.token)));
            }
            if let Some(old_due) = Self::due_key(old, reminder_lead) {
                ops.push(BatchOperation::delete(old_due));
            }
        }

        let mut stored = record.clone();
        stored.revision = record.revision + 1;
        ops.push(BatchOperation::put(key, encode(&stored)?));
        ops.push(BatchOperation::put(
            Self::token_key(&stored.token),
            encode(&stored.owner)?,
        ));
        if let Some(due) = Self::due_key(&stored, reminder_lead) {
            ops.push(BatchOperation::put(due, Vec::new()));
        }
        store.atomic_batch_write(ops)?;
        Ok(stored)
    }

    fn due_owners(&self, now: Timestamp) -> MonitorResult<Vec<OwnerId>> {
        let cutoff = timestamp_key(&now);
        let entries = self.store.read().prefix_scan(DUE_PREFIX.as_bytes())?;
        let mut owners = Vec::new();
        for (key, _) in entries {
            let text = String::from_utf8_lossy(&key);
            let millis = text
                .split('/')
                .nth(2)
                .and_then(|m| m.parse::<u64>().ok())
                .unwrap_or(u64::MAX);
            if millis > cutoff {
                break;
            }
            owners.push(Self::owner_from_due_key(&key)?);
        }
        Ok(owners)
    }
}
