//! # Event Publisher
//!
//! Broadcast side of the bus. Publishing is fire-and-forget: lifecycle
//! events with no listener are dropped, and the bus keeps a running count
//! per topic for the audit handler and tests.

use crate::events::{EngineEvent, EventFilter, EventTopic};
use crate::subscriber::{EventStream, Subscription};
use crate::DEFAULT_CHANNEL_CAPACITY;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;
use tracing::{debug, trace};

#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish an event, returning the number of subscribers that received it.
    async fn publish(&self, event: EngineEvent) -> usize;

    /// Events published since startup, across all topics.
    fn events_published(&self) -> u64;
}

/// In-memory bus over `tokio::sync::broadcast`.
pub struct InMemoryEventBus {
    sender: broadcast::Sender<EngineEvent>,
    delivery: AtomicU64,
    verification: AtomicU64,
    liveness: AtomicU64,
}

impl InMemoryEventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// `capacity` events are buffered per subscriber before it lags.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            delivery: AtomicU64::new(0),
            verification: AtomicU64::new(0),
            liveness: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn subscribe(&self, filter: EventFilter) -> Subscription {
        debug!(topics = ?filter.topics, "[bus] subscription opened");
        Subscription::new(self.sender.subscribe(), filter)
    }

    #[must_use]
    pub fn event_stream(&self, filter: EventFilter) -> EventStream {
        EventStream::new(self.sender.subscribe(), filter)
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Events published on `topic`. `EventTopic::All` sums every topic.
    #[must_use]
    pub fn published_on(&self, topic: EventTopic) -> u64 {
        match topic {
            EventTopic::All => {
                self.published_on(EventTopic::Delivery)
                    + self.published_on(EventTopic::Verification)
                    + self.published_on(EventTopic::Liveness)
            }
            concrete => self.counter(concrete).map_or(0, |c| c.load(Ordering::Relaxed)),
        }
    }

    fn counter(&self, topic: EventTopic) -> Option<&AtomicU64> {
        match topic {
            EventTopic::Delivery => Some(&self.delivery),
            EventTopic::Verification => Some(&self.verification),
            EventTopic::Liveness => Some(&self.liveness),
            EventTopic::All => None,
        }
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventBus {
    async fn publish(&self, event: EngineEvent) -> usize {
        let topic = event.topic();
        let source = event.source_subsystem();
        if let Some(counter) = self.counter(topic) {
            counter.fetch_add(1, Ordering::Relaxed);
        }

        match self.sender.send(event) {
            Ok(receivers) => {
                trace!(topic = ?topic, source, receivers, "[bus] event published");
                receivers
            }
            Err(_) => {
                trace!(topic = ?topic, source, "[bus] event dropped, no subscribers");
                0
            }
        }
    }

    fn events_published(&self) -> u64 {
        self.published_on(EventTopic::All)
    }
}

/// Publisher that discards every event.
///
/// Lets subsystems be constructed without a bus in unit tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPublisher;

#[async_trait]
impl EventPublisher for NoopPublisher {
    async fn publish(&self, _event: EngineEvent) -> usize {
        0
    }

    fn events_published(&self) -> u64 {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::entities::{MessageId, OwnerId};

    fn cancelled() -> EngineEvent {
        EngineEvent::MessageCancelled {
            message_id: MessageId::new(),
        }
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_still_counts() {
        let bus = InMemoryEventBus::new();
        assert_eq!(bus.publish(cancelled()).await, 0);
        assert_eq!(bus.events_published(), 1);
    }

    #[tokio::test]
    async fn test_every_subscriber_receives() {
        let bus = InMemoryEventBus::new();
        let _a = bus.subscribe(EventFilter::all());
        let _b = bus.subscribe(EventFilter::all());
        let _c = bus.subscribe(EventFilter::topics(vec![EventTopic::Liveness]));

        // Filtering happens on receive; the broadcast reaches all three.
        assert_eq!(bus.publish(cancelled()).await, 3);
        assert_eq!(bus.subscriber_count(), 3);
    }

    #[tokio::test]
    async fn test_counts_by_topic() {
        let bus = InMemoryEventBus::with_capacity(16);
        bus.publish(cancelled()).await;
        bus.publish(cancelled()).await;
        bus.publish(EngineEvent::CheckInPromptFailed {
            owner_id: OwnerId::new("owner-1"),
            attempts: 3,
        })
        .await;

        assert_eq!(bus.published_on(EventTopic::Delivery), 2);
        assert_eq!(bus.published_on(EventTopic::Liveness), 1);
        assert_eq!(bus.published_on(EventTopic::Verification), 0);
        assert_eq!(bus.published_on(EventTopic::All), 3);
    }
}
