//! Key-value backed repository
//!
//! Key layout:
//!
//! | Key | Value |
//! |-----|-------|
//! | `vr/req/{request_id}` | `VerificationRequest` |
//! | `vr/token/{token}` | request id |
//! | `vr/subject/{subject_key}/{request_id}` | empty |
//! | `vr/pending/{expires_millis}/{request_id}` | empty |
//! | `vr/doc/{owner_hex}` | `DocumentVerification` |
//! | `tc/contact/{contact_id}` | `TrustedContact` |
//! | `tc/owner/{owner_hex}/{contact_id}` | empty |

use crate::domain::{
    DocumentVerification, RequestStatus, TrustedContact, VerificationRequest, VerificationSubject,
};
use crate::error::LedgerResult;
use crate::ports::outbound::VerificationRepository;
use shared_types::storage::{decode, encode, millis_component};
use shared_types::{
    timestamp_key, BatchOperation, ContactId, KVStoreError, OwnerId, RequestId, SharedKvStore,
    Timestamp, VerificationToken,
};

pub struct KvVerificationRepository {
    store: SharedKvStore,
}

impl KvVerificationRepository {
    pub fn new(store: SharedKvStore) -> Self {
        Self { store }
    }

    fn request_key(id: &RequestId) -> Vec<u8> {
        format!("vr/req/{id}").into_bytes()
    }

    fn token_key(token: &VerificationToken) -> Vec<u8> {
        format!("vr/token/{}", token.as_str()).into_bytes()
    }

    fn subject_prefix(subject: &VerificationSubject) -> String {
        format!("vr/subject/{}/", subject.key())
    }

    fn pending_key(req: &VerificationRequest) -> Vec<u8> {
        format!(
            "vr/pending/{}/{}",
            millis_component(timestamp_key(&req.expires_at)),
            req.id
        )
        .into_bytes()
    }

    fn doc_key(owner: &OwnerId) -> Vec<u8> {
        format!("vr/doc/{}", hex::encode(owner.as_str())).into_bytes()
    }

    fn contact_key(id: &ContactId) -> Vec<u8> {
        format!("tc/contact/{id}").into_bytes()
    }

    fn owner_contact_prefix(owner: &OwnerId) -> String {
        format!("tc/owner/{}/", hex::encode(owner.as_str()))
    }

    fn load_request(&self, id: &RequestId) -> LedgerResult<Option<VerificationRequest>> {
        let bytes = self.store.read().get(&Self::request_key(id))?;
        Ok(bytes.map(|b| decode(&b)).transpose()?)
    }

    /// Trailing path component of an index key, parsed as a request id.
    fn id_from_index_key(key: &[u8]) -> Result<RequestId, KVStoreError> {
        let key = String::from_utf8_lossy(key);
        key.rsplit('/')
            .next()
            .and_then(RequestId::parse)
            .ok_or_else(|| KVStoreError::CorruptionError {
                message: format!("malformed index key {key}"),
            })
    }
}

impl VerificationRepository for KvVerificationRepository {
    fn find_by_token(&self, token: &VerificationToken) -> LedgerResult<Option<VerificationRequest>> {
        let Some(raw) = self.store.read().get(&Self::token_key(token))? else {
            return Ok(None);
        };
        let id: RequestId = decode(&raw)?;
        self.load_request(&id)
    }

    fn requests_for_subject(
        &self,
        subject: &VerificationSubject,
    ) -> LedgerResult<Vec<VerificationRequest>> {
        let entries = self
            .store
            .read()
            .prefix_scan(Self::subject_prefix(subject).as_bytes())?;
        let mut requests = Vec::with_capacity(entries.len());
        for (key, _) in entries {
            let id = Self::id_from_index_key(&key)?;
            if let Some(req) = self.load_request(&id)? {
                requests.push(req);
            }
        }
        Ok(requests)
    }

    fn overdue_pending(&self, now: Timestamp) -> LedgerResult<Vec<VerificationRequest>> {
        let cutoff = timestamp_key(&now);
        let entries = self.store.read().prefix_scan(b"vr/pending/")?;
        let mut overdue = Vec::new();
        for (key, _) in entries {
            let text = String::from_utf8_lossy(&key);
            let millis = text
                .split('/')
                .nth(2)
                .and_then(|m| m.parse::<u64>().ok())
                .unwrap_or(u64::MAX);
            // Index is ordered by expiry; everything after this is still open.
            if millis >= cutoff {
                break;
            }
            let id = Self::id_from_index_key(&key)?;
            if let Some(req) = self.load_request(&id)? {
                if req.is_overdue(now) {
                    overdue.push(req);
                }
            }
        }
        Ok(overdue)
    }

    fn save_requests(&self, requests: &[VerificationRequest]) -> LedgerResult<()> {
        let mut ops = Vec::with_capacity(requests.len() * 4);
        for req in requests {
            ops.push(BatchOperation::put(Self::request_key(&req.id), encode(req)?));
            ops.push(BatchOperation::put(Self::token_key(&req.token), encode(&req.id)?));
            ops.push(BatchOperation::put(
                format!("{}{}", Self::subject_prefix(&req.subject), req.id).into_bytes(),
                Vec::new(),
            ));
            if req.status == RequestStatus::Pending {
                ops.push(BatchOperation::put(Self::pending_key(req), Vec::new()));
            } else {
                ops.push(BatchOperation::delete(Self::pending_key(req)));
            }
        }
        self.store.write().atomic_batch_write(ops)?;
        Ok(())
    }

    fn document_for(&self, owner: &OwnerId) -> LedgerResult<Option<DocumentVerification>> {
        let bytes = self.store.read().get(&Self::doc_key(owner))?;
        Ok(bytes.map(|b| decode(&b)).transpose()?)
    }

    fn save_document(&self, doc: &DocumentVerification) -> LedgerResult<()> {
        self.store
            .write()
            .put(&Self::doc_key(&doc.owner), &encode(doc)?)?;
        Ok(())
    }

    fn delete_document(&self, owner: &OwnerId) -> LedgerResult<()> {
        self.store.write().delete(&Self::doc_key(owner))?;
        Ok(())
    }

    fn get_contact(&self, id: &ContactId) -> LedgerResult<Option<TrustedContact>> {
        let bytes = self.store.read().get(&Self::contact_key(id))?;
        Ok(bytes.map(|b| decode(&b)).transpose()?)
    }

    fn contacts_for_owner(&self, owner: &OwnerId) -> LedgerResult<Vec<TrustedContact>> {
        let entries = self
            .store
            .read()
            .prefix_scan(Self::owner_contact_prefix(owner).as_bytes())?;
        let mut contacts = Vec::with_capacity(entries.len());
        for (key, _) in entries {
            let text = String::from_utf8_lossy(&key);
            let Some(id) = text.rsplit('/').next().and_then(ContactId::parse) else {
                continue;
            };
            if let Some(contact) = self.get_contact(&id)? {
                contacts.push(contact);
            }
        }
        contacts.sort_by_key(|c| c.created_at);
        Ok(contacts)
    }

    fn save_contact(&self, contact: &TrustedContact) -> LedgerResult<()> {
        let ops = vec![
            BatchOperation::put(Self::contact_key(&contact.id), encode(contact)?),
            BatchOperation::put(
                format!("{}{}", Self::owner_contact_prefix(&contact.owner), contact.id)
                    .into_bytes(),
                Vec::new(),
            ),
        ];
        self.store.write().atomic_batch_write(ops)?;
        Ok(())
    }

    fn delete_contact(&self, contact: &TrustedContact) -> LedgerResult<()> {
        let ops = vec![
            BatchOperation::delete(Self::contact_key(&contact.id)),
            BatchOperation::delete(
                format!("{}{}", Self::owner_contact_prefix(&contact.owner), contact.id)
                    .into_bytes(),
            ),
        ];
        self.store.write().atomic_batch_write(ops)?;
        Ok(())
    }
}
