//! # Engine Fixture
//!
//! A fully wired engine on a manual clock. Every capability is an
//! in-process double so scenarios can inspect what left the engine.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use keepsake_node::{Capabilities, EngineConfig, EngineContainer, EngineControl};
use ks_03_delivery::{Message, MessageStatus, NewMessage, Trigger};
use ks_04_scheduler::{ClockDriver, DriverPass, SchedulerApi, TickReport};
use shared_types::storage::{shared, SharedKvStore};
use shared_types::{
    ContactId, InMemoryContentStore, InMemoryKVStore, ManualTimeSource, MessageId, MessageKind,
    OwnerId, Recipient, RecordingNotifier, TimeSource, Timestamp,
};

/// 2025-01-01 09:00 UTC.
pub fn t0() -> Timestamp {
    Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

pub struct Engine {
    pub container: EngineContainer,
    pub control: EngineControl,
    pub clock: Arc<ManualTimeSource>,
    pub notifier: Arc<RecordingNotifier>,
    pub content: Arc<InMemoryContentStore>,
    driver: ClockDriver,
}

impl Engine {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self::with_store(config, shared(InMemoryKVStore::new()), t0())
    }

    /// Engine over an existing store, clock starting at `start`.
    pub fn with_store(config: EngineConfig, store: SharedKvStore, start: Timestamp) -> Self {
        let clock = Arc::new(ManualTimeSource::new(start));
        let notifier = Arc::new(RecordingNotifier::new());
        let content = Arc::new(InMemoryContentStore::new());
        let container = EngineContainer::new(
            config,
            store,
            Capabilities {
                content: content.clone(),
                notifier: notifier.clone(),
                clock: clock.clone(),
            },
        );
        let control = EngineControl::new(&container);
        let driver = container.clock_driver();
        Self {
            container,
            control,
            clock,
            notifier,
            content,
            driver,
        }
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// One driver pass at the current clock reading.
    pub async fn pass(&self) -> DriverPass {
        self.driver.run_once().await
    }

    /// Move the clock to `at` and run one driver pass.
    pub async fn pass_at(&self, at: Timestamp) -> DriverPass {
        self.clock.set(at);
        self.pass().await
    }

    /// Scheduler tick only, at an explicit instant.
    pub async fn tick_at(&self, at: Timestamp) -> TickReport {
        self.container
            .scheduler
            .tick(at)
            .await
            .expect("scheduler tick")
    }

    /// Upload a body, create the message, and schedule it.
    pub async fn letter(&self, owner: &OwnerId, trigger: Trigger) -> Message {
        self.letter_to(owner, Recipient::new("Ann", "ann@example.com"), trigger)
            .await
    }

    pub async fn letter_to(&self, owner: &OwnerId, recipient: Recipient, trigger: Trigger) -> Message {
        let content_ref = self
            .control
            .upload_content(b"Open this when the time comes.".to_vec())
            .await
            .expect("upload");
        let draft = self
            .control
            .create_message(
                owner,
                NewMessage {
                    kind: MessageKind::Letter,
                    title: "For later".into(),
                    recipient,
                    content_ref: Some(content_ref),
                },
            )
            .await
            .expect("create");
        self.control
            .schedule_message(owner, &draft.id, trigger)
            .await
            .expect("schedule")
    }

    /// Invite and accept one contact per name. E-mail is `{name}@example.com`.
    pub async fn accepted_contacts(&self, owner: &OwnerId, names: &[&str]) -> Vec<ContactId> {
        let mut ids = Vec::with_capacity(names.len());
        for name in names {
            let contact = self
                .control
                .add_contact(
                    owner,
                    (*name).to_string(),
                    format!("{name}@example.com"),
                    "friend".into(),
                )
                .await
                .expect("add contact");
            self.control
                .mark_invitation_sent(owner, &contact.id)
                .await
                .expect("invite");
            self.control
                .respond_to_invitation(&contact.id, true)
                .await
                .expect("accept");
            ids.push(contact.id);
        }
        ids
    }

    pub fn status(&self, owner: &OwnerId, id: &MessageId) -> MessageStatus {
        self.control
            .get_message_status(owner, id)
            .expect("status")
            .status
    }

    pub fn stored(&self, owner: &OwnerId, id: &MessageId) -> Message {
        self.control
            .list_messages(owner)
            .expect("list")
            .into_iter()
            .find(|m| &m.id == id)
            .expect("message present")
    }

    /// Delivery notices sent for one message.
    pub fn notices_for(&self, id: &MessageId) -> usize {
        self.notifier
            .delivery_notices()
            .iter()
            .filter(|n| &n.meta.message_id == id)
            .count()
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}
