//! # In-Process Capability Adapters
//!
//! `InMemoryContentStore` and `TracingNotifier` back a single-node
//! development runtime. `RecordingNotifier` is the controllable test double
//! used throughout the workspace's tests: it records every call and can be
//! told to fail.

use crate::capabilities::{ContentStore, DeliveryNotice, Notifier, ResolvedContent};
use crate::entities::{ContentRef, OwnerId, Timestamp, VerificationToken};
use crate::errors::{ContentStoreError, NotifierError};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::time::Duration;

/// Content store holding blobs in a map.
#[derive(Default)]
pub struct InMemoryContentStore {
    blobs: RwLock<HashMap<ContentRef, Vec<u8>>>,
    fail_with: RwLock<Option<ContentStoreError>>,
}

impl InMemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a blob under a caller-chosen reference.
    pub fn insert(&self, content_ref: ContentRef, bytes: Vec<u8>) {
        self.blobs.write().insert(content_ref, bytes);
    }

    /// Make every subsequent call fail with `err` (or succeed again with `None`).
    pub fn set_failure(&self, err: Option<ContentStoreError>) {
        *self.fail_with.write() = err;
    }
}

#[async_trait]
impl ContentStore for InMemoryContentStore {
    async fn put(&self, bytes: Vec<u8>) -> Result<ContentRef, ContentStoreError> {
        if let Some(err) = self.fail_with.read().clone() {
            return Err(err);
        }
        let content_ref = ContentRef::new(format!("mem://{}", uuid::Uuid::new_v4()));
        self.blobs.write().insert(content_ref.clone(), bytes);
        Ok(content_ref)
    }

    async fn resolve(&self, content_ref: &ContentRef) -> Result<ResolvedContent, ContentStoreError> {
        if let Some(err) = self.fail_with.read().clone() {
            return Err(err);
        }
        self.blobs
            .read()
            .get(content_ref)
            .cloned()
            .map(ResolvedContent::Bytes)
            .ok_or_else(|| ContentStoreError::ContentNotFound {
                content_ref: content_ref.to_string(),
            })
    }
}

/// Notifier that only logs. Used when no transport is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn send_check_in_prompt(
        &self,
        owner_id: &OwnerId,
        due_at: Timestamp,
    ) -> Result<(), NotifierError> {
        tracing::info!(owner_id = %owner_id, due_at = %due_at, "[notifier] check-in prompt");
        Ok(())
    }

    async fn send_verification_request(
        &self,
        contact_email: &str,
        token: &VerificationToken,
        expires_at: Timestamp,
    ) -> Result<(), NotifierError> {
        tracing::info!(
            contact_email,
            token = %token,
            expires_at = %expires_at,
            "[notifier] verification request"
        );
        Ok(())
    }

    async fn send_delivery_notice(&self, notice: DeliveryNotice) -> Result<(), NotifierError> {
        tracing::info!(
            recipient = %notice.recipient_email,
            message_id = %notice.meta.message_id,
            delivery_key = %notice.delivery_key,
            "[notifier] delivery notice"
        );
        Ok(())
    }
}

/// One recorded notifier call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifierCall {
    CheckInPrompt {
        owner_id: OwnerId,
        due_at: Timestamp,
    },
    VerificationRequest {
        contact_email: String,
        token: VerificationToken,
        expires_at: Timestamp,
    },
    DeliveryNotice(DeliveryNotice),
}

#[derive(Default)]
struct FailurePlan {
    /// Remaining calls that fail before the notifier recovers. `None` fails forever.
    remaining: Option<u32>,
    error: Option<NotifierError>,
}

/// Test double recording every call.
#[derive(Default)]
pub struct RecordingNotifier {
    calls: Mutex<Vec<NotifierCall>>,
    failure: Mutex<FailurePlan>,
    delay: RwLock<Option<Duration>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every call with `err` until cleared.
    pub fn fail_always(&self, err: NotifierError) {
        *self.failure.lock() = FailurePlan {
            remaining: None,
            error: Some(err),
        };
    }

    /// Fail the next `n` calls with `err`, then succeed.
    pub fn fail_next(&self, n: u32, err: NotifierError) {
        *self.failure.lock() = FailurePlan {
            remaining: Some(n),
            error: Some(err),
        };
    }

    pub fn clear_failures(&self) {
        *self.failure.lock() = FailurePlan::default();
    }

    /// Sleep this long inside every call (timeout tests).
    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.write() = delay;
    }

    pub fn calls(&self) -> Vec<NotifierCall> {
        self.calls.lock().clone()
    }

    pub fn delivery_notices(&self) -> Vec<DeliveryNotice> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                NotifierCall::DeliveryNotice(n) => Some(n.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn verification_requests(&self) -> Vec<(String, VerificationToken)> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                NotifierCall::VerificationRequest {
                    contact_email,
                    token,
                    ..
                } => Some((contact_email.clone(), token.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn check_in_prompts(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, NotifierCall::CheckInPrompt { .. }))
            .count()
    }

    async fn record(&self, call: NotifierCall) -> Result<(), NotifierError> {
        let delay = *self.delay.read();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        {
            let mut plan = self.failure.lock();
            if let Some(err) = plan.error.clone() {
                match plan.remaining {
                    None => return Err(err),
                    Some(0) => *plan = FailurePlan::default(),
                    Some(n) => {
                        plan.remaining = Some(n - 1);
                        return Err(err);
                    }
                }
            }
        }

        self.calls.lock().push(call);
        Ok(())
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_check_in_prompt(
        &self,
        owner_id: &OwnerId,
        due_at: Timestamp,
    ) -> Result<(), NotifierError> {
        self.record(NotifierCall::CheckInPrompt {
            owner_id: owner_id.clone(),
            due_at,
        })
        .await
    }

    async fn send_verification_request(
        &self,
        contact_email: &str,
        token: &VerificationToken,
        expires_at: Timestamp,
    ) -> Result<(), NotifierError> {
        self.record(NotifierCall::VerificationRequest {
            contact_email: contact_email.to_string(),
            token: token.clone(),
            expires_at,
        })
        .await
    }

    async fn send_delivery_notice(&self, notice: DeliveryNotice) -> Result<(), NotifierError> {
        self.record(NotifierCall::DeliveryNotice(notice)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn test_content_store_put_and_resolve() {
        let store = InMemoryContentStore::new();
        let content_ref = store.put(b"dear future".to_vec()).await.unwrap();

        assert_eq!(
            store.resolve(&content_ref).await.unwrap(),
            ResolvedContent::Bytes(b"dear future".to_vec())
        );

        let missing = store.resolve(&ContentRef::new("mem://nope")).await;
        assert!(matches!(missing, Err(ContentStoreError::ContentNotFound { .. })));
    }

    #[tokio::test]
    async fn test_recording_notifier_fail_next_then_recover() {
        let notifier = RecordingNotifier::new();
        notifier.fail_next(2, NotifierError::Unavailable("down".into()));
        let owner = OwnerId::new("owner-1");

        assert!(notifier.send_check_in_prompt(&owner, Utc::now()).await.is_err());
        assert!(notifier.send_check_in_prompt(&owner, Utc::now()).await.is_err());
        assert!(notifier.send_check_in_prompt(&owner, Utc::now()).await.is_ok());
        assert_eq!(notifier.check_in_prompts(), 1);
    }

    #[tokio::test]
    async fn test_recording_notifier_fail_always() {
        let notifier = RecordingNotifier::new();
        notifier.fail_always(NotifierError::InvalidRecipient("x".into()));
        let token = VerificationToken::generate();

        for _ in 0..3 {
            assert!(notifier
                .send_verification_request("a@b.co", &token, Utc::now())
                .await
                .is_err());
        }
        assert!(notifier.calls().is_empty());

        notifier.clear_failures();
        notifier
            .send_verification_request("a@b.co", &token, Utc::now())
            .await
            .unwrap();
        assert_eq!(notifier.verification_requests().len(), 1);
    }
}
