//! Delivery executor
//!
//! Runs one delivery attempt: resolve content, send the notice, write the
//! receipt. Both external calls are bounded by the I/O timeout. A receipt
//! already present for the attempt's key means the notice went out before
//! a crash, so nothing is sent again.

use crate::domain::{delivery_key, DeliveryOutcome, DeliveryReceipt, FailureReason, Message};
use crate::error::DeliveryResult;
use crate::metrics;
use crate::ports::outbound::MessageRepository;
use shared_types::{
    ContentStore, ContentStoreError, DeliveryNotice, Notifier, NotifierError, Timestamp,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{error, info, warn};

const RECEIPT_WRITE_ATTEMPTS: usize = 3;

pub struct DeliveryExecutor {
    content: Arc<dyn ContentStore>,
    notifier: Arc<dyn Notifier>,
    repo: Arc<dyn MessageRepository>,
    io_timeout: Duration,
}

impl DeliveryExecutor {
    pub fn new(
        content: Arc<dyn ContentStore>,
        notifier: Arc<dyn Notifier>,
        repo: Arc<dyn MessageRepository>,
        io_timeout: Duration,
    ) -> Self {
        Self {
            content,
            notifier,
            repo,
            io_timeout,
        }
    }

    fn failed(attempt: u32, reason: FailureReason, detail: impl Into<String>) -> DeliveryOutcome {
        metrics::record_delivery_attempt(&reason.to_string());
        DeliveryOutcome::Failed {
            attempt,
            reason,
            detail: detail.into(),
        }
    }

    /// The notice is already out: the attempt stays acknowledged even when
    /// every write fails, so the caller still records the message delivered.
    fn persist_receipt(&self, receipt: &DeliveryReceipt) {
        let mut last_error = None;
        for _ in 0..RECEIPT_WRITE_ATTEMPTS {
            match self.repo.save_receipt(receipt) {
                Ok(()) => return,
                Err(e) => last_error = Some(e),
            }
        }
        metrics::record_receipt_write_failure();
        if let Some(e) = last_error {
            error!(
                message_id = %receipt.message_id,
                attempt = receipt.attempt,
                category = ?e.category(),
                error = %e,
                "[ks-03] delivery receipt not persisted, crash recovery may resend"
            );
        }
    }

    /// Storage errors are returned as `Err`; every other failure is an
    /// outcome for the state machine.
    pub async fn execute(
        &self,
        message: &Message,
        attempt: u32,
        now: Timestamp,
    ) -> DeliveryResult<DeliveryOutcome> {
        let key = delivery_key(&message.id, attempt);
        if self.repo.receipt(&key)?.is_some() {
            metrics::record_receipt_hit();
            info!(
                message_id = %message.id,
                attempt,
                "[ks-03] receipt already present, completing without resend"
            );
            return Ok(DeliveryOutcome::Acknowledged { attempt });
        }

        let Some(content_ref) = message.content_ref.clone() else {
            return Ok(Self::failed(
                attempt,
                FailureReason::ContentNotFound,
                "message has no content reference",
            ));
        };

        let content = match timeout(self.io_timeout, self.content.resolve(&content_ref)).await {
            Ok(Ok(content)) => content,
            Ok(Err(e)) => {
                let reason = match &e {
                    ContentStoreError::ContentNotFound { .. } => FailureReason::ContentNotFound,
                    ContentStoreError::Timeout => FailureReason::ContentStoreTimeout,
                    ContentStoreError::Unavailable(_) => FailureReason::ContentStoreUnavailable,
                };
                warn!(message_id = %message.id, attempt, error = %e, "[ks-03] content resolution failed");
                return Ok(Self::failed(attempt, reason, e.to_string()));
            }
            Err(_) => {
                warn!(message_id = %message.id, attempt, "[ks-03] content resolution timed out");
                return Ok(Self::failed(
                    attempt,
                    FailureReason::ContentStoreTimeout,
                    format!("no answer within {:?}", self.io_timeout),
                ));
            }
        };

        let notice = DeliveryNotice {
            recipient_email: message.recipient.email.clone(),
            content_ref,
            content,
            meta: message.meta(),
            delivery_key: key.clone(),
        };
        match timeout(self.io_timeout, self.notifier.send_delivery_notice(notice)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let reason = match &e {
                    NotifierError::Unavailable(_) => FailureReason::NotifierUnavailable,
                    NotifierError::InvalidRecipient(_) => FailureReason::InvalidRecipient,
                };
                warn!(message_id = %message.id, attempt, error = %e, "[ks-03] delivery notice failed");
                return Ok(Self::failed(attempt, reason, e.to_string()));
            }
            Err(_) => {
                warn!(message_id = %message.id, attempt, "[ks-03] delivery notice timed out");
                return Ok(Self::failed(
                    attempt,
                    FailureReason::NotifierUnavailable,
                    format!("no answer within {:?}", self.io_timeout),
                ));
            }
        }

        let receipt = DeliveryReceipt {
            delivery_key: key,
            message_id: message.id,
            attempt,
            acknowledged_at: now,
        };
        self.persist_receipt(&receipt);

        metrics::record_delivery_attempt("acknowledged");
        info!(
            message_id = %message.id,
            attempt,
            recipient = %message.recipient.email,
            "[ks-03] delivery notice acknowledged"
        );
        Ok(DeliveryOutcome::Acknowledged { attempt })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::KvMessageRepository;
    use chrono::Utc;
    use shared_types::storage::shared;
    use crate::domain::MessageStatus;
    use shared_types::{
        ContentRef, InMemoryContentStore, InMemoryKVStore, KVStoreError, MessageId, MessageKind,
        OwnerId, Recipient, RecordingNotifier,
    };
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails the first `failures` receipt writes.
    struct FlakyReceipts {
        inner: KvMessageRepository,
        failures: AtomicU32,
    }

    impl MessageRepository for FlakyReceipts {
        fn get(&self, id: &MessageId) -> DeliveryResult<Option<Message>> {
            self.inner.get(id)
        }

        fn save(&self, message: &Message) -> DeliveryResult<Message> {
            self.inner.save(message)
        }

        fn by_status(&self, status: MessageStatus) -> DeliveryResult<Vec<Message>> {
            self.inner.by_status(status)
        }

        fn for_owner(&self, owner: &OwnerId) -> DeliveryResult<Vec<Message>> {
            self.inner.for_owner(owner)
        }

        fn receipt(&self, delivery_key: &str) -> DeliveryResult<Option<DeliveryReceipt>> {
            self.inner.receipt(delivery_key)
        }

        fn save_receipt(&self, receipt: &DeliveryReceipt) -> DeliveryResult<()> {
            let left = self.failures.load(Ordering::SeqCst);
            if left > 0 {
                self.failures.store(left - 1, Ordering::SeqCst);
                return Err(KVStoreError::IOError {
                    message: "disk full".into(),
                }
                .into());
            }
            self.inner.save_receipt(receipt)
        }
    }

    fn flaky_executor(failures: u32) -> (DeliveryExecutor, Arc<FlakyReceipts>, Arc<RecordingNotifier>) {
        let content = Arc::new(InMemoryContentStore::new());
        content.insert(ContentRef::new("mem://letter"), b"dear ann".to_vec());
        let notifier = Arc::new(RecordingNotifier::new());
        let repo = Arc::new(FlakyReceipts {
            inner: KvMessageRepository::new(shared(InMemoryKVStore::new())),
            failures: AtomicU32::new(failures),
        });
        let executor = DeliveryExecutor::new(
            content,
            notifier.clone(),
            repo.clone(),
            Duration::from_secs(30),
        );
        (executor, repo, notifier)
    }

    struct Fixture {
        executor: DeliveryExecutor,
        content: Arc<InMemoryContentStore>,
        notifier: Arc<RecordingNotifier>,
        message: Message,
    }

    fn fixture() -> Fixture {
        let content = Arc::new(InMemoryContentStore::new());
        content.insert(ContentRef::new("mem://letter"), b"dear ann".to_vec());
        let notifier = Arc::new(RecordingNotifier::new());
        let repo = Arc::new(KvMessageRepository::new(shared(InMemoryKVStore::new())));
        let executor = DeliveryExecutor::new(
            content.clone(),
            notifier.clone(),
            repo,
            Duration::from_secs(30),
        );
        let message = Message::draft(
            OwnerId::new("owner-1"),
            MessageKind::Letter,
            "For later",
            Recipient::new("Ann", "ann@example.com"),
            Some(ContentRef::new("mem://letter")),
            Utc::now(),
        );
        Fixture {
            executor,
            content,
            notifier,
            message,
        }
    }

    #[tokio::test]
    async fn test_successful_delivery_sends_once_per_attempt() {
        let f = fixture();
        let first = f.executor.execute(&f.message, 1, Utc::now()).await.unwrap();
        assert_eq!(first, DeliveryOutcome::Acknowledged { attempt: 1 });

        // Same attempt again: the receipt short-circuits the notifier.
        let again = f.executor.execute(&f.message, 1, Utc::now()).await.unwrap();
        assert_eq!(again, DeliveryOutcome::Acknowledged { attempt: 1 });

        let notices = f.notifier.delivery_notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].recipient_email, "ann@example.com");
        assert_eq!(notices[0].delivery_key, delivery_key(&f.message.id, 1));
    }

    #[tokio::test]
    async fn test_content_errors_map_to_reasons() {
        let f = fixture();
        f.content
            .set_failure(Some(ContentStoreError::Unavailable("s3".into())));
        let outcome = f.executor.execute(&f.message, 1, Utc::now()).await.unwrap();
        assert!(matches!(
            outcome,
            DeliveryOutcome::Failed {
                reason: FailureReason::ContentStoreUnavailable,
                ..
            }
        ));

        f.content.set_failure(None);
        let mut missing = f.message.clone();
        missing.content_ref = Some(ContentRef::new("mem://nope"));
        let outcome = f.executor.execute(&missing, 1, Utc::now()).await.unwrap();
        assert!(matches!(
            outcome,
            DeliveryOutcome::Failed {
                reason: FailureReason::ContentNotFound,
                ..
            }
        ));
        assert!(f.notifier.delivery_notices().is_empty());
    }

    #[tokio::test]
    async fn test_notifier_errors_map_to_reasons() {
        let f = fixture();
        f.notifier
            .fail_next(1, NotifierError::InvalidRecipient("bounced".into()));
        let outcome = f.executor.execute(&f.message, 1, Utc::now()).await.unwrap();
        assert!(matches!(
            outcome,
            DeliveryOutcome::Failed {
                reason: FailureReason::InvalidRecipient,
                attempt: 1,
                ..
            }
        ));

        // No receipt was written for the failed attempt.
        let retry = f.executor.execute(&f.message, 1, Utc::now()).await.unwrap();
        assert_eq!(retry, DeliveryOutcome::Acknowledged { attempt: 1 });
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_notifier_times_out() {
        let f = fixture();
        f.notifier.set_delay(Some(Duration::from_secs(60)));
        let outcome = f.executor.execute(&f.message, 1, Utc::now()).await.unwrap();
        assert!(matches!(
            outcome,
            DeliveryOutcome::Failed {
                reason: FailureReason::NotifierUnavailable,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_receipt_write_is_retried() {
        let (executor, repo, notifier) = flaky_executor(2);
        let message = fixture().message;

        let outcome = executor.execute(&message, 1, Utc::now()).await.unwrap();
        assert_eq!(outcome, DeliveryOutcome::Acknowledged { attempt: 1 });
        assert!(repo.receipt(&delivery_key(&message.id, 1)).unwrap().is_some());

        // The stored receipt guards a replay of the same attempt.
        executor.execute(&message, 1, Utc::now()).await.unwrap();
        assert_eq!(notifier.delivery_notices().len(), 1);
    }

    #[tokio::test]
    async fn test_lost_receipt_keeps_attempt_acknowledged() {
        let (executor, repo, notifier) = flaky_executor(u32::MAX);
        let message = fixture().message;

        let outcome = executor.execute(&message, 1, Utc::now()).await.unwrap();
        assert_eq!(outcome, DeliveryOutcome::Acknowledged { attempt: 1 });
        assert_eq!(notifier.delivery_notices().len(), 1);
        assert!(repo.receipt(&delivery_key(&message.id, 1)).unwrap().is_none());
    }
}
