//! # Engine Events
//!
//! Lifecycle events published by the engine's subsystems. Consumers are
//! observers only (audit log, metrics, host callbacks); no subsystem
//! drives a state transition off the bus.

use serde::{Deserialize, Serialize};
use shared_types::entities::{ContactId, MessageId, OwnerId, RequestId, Timestamp};
use shared_types::errors::ErrorCategory;

/// Subsystem identifiers used as event sources.
pub mod source {
    pub const VERIFICATION_LEDGER: u8 = 1;
    pub const LIVENESS_MONITOR: u8 = 2;
    pub const DELIVERY: u8 = 3;
    pub const SCHEDULER: u8 = 4;
}

/// All events that can be published to the event bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EngineEvent {
    // =========================================================================
    // DELIVERY
    // =========================================================================
    /// A draft was finalized and now waits for its trigger.
    MessageScheduled {
        message_id: MessageId,
        owner_id: OwnerId,
        trigger: String,
    },

    /// A message moved between two lifecycle states.
    MessageTransitioned {
        message_id: MessageId,
        from: String,
        to: String,
    },

    /// The notifier acknowledged the delivery notice.
    MessageDelivered {
        message_id: MessageId,
        attempt: u32,
        delivery_key: String,
    },

    /// A message entered `Failed`.
    MessageFailed {
        message_id: MessageId,
        category: ErrorCategory,
        detail: String,
        terminal: bool,
        retry_at: Option<Timestamp>,
    },

    /// The owner cancelled a message.
    MessageCancelled { message_id: MessageId },

    // =========================================================================
    // VERIFICATION
    // =========================================================================
    /// A new verification request was issued to a trusted contact.
    VerificationIssued {
        request_id: RequestId,
        subject: String,
        contact_id: ContactId,
        round: u32,
    },

    /// A verifier answered a request.
    VerificationResponded {
        request_id: RequestId,
        subject: String,
        confirmed: bool,
    },

    // =========================================================================
    // LIVENESS
    // =========================================================================
    /// The owner confirmed they are alive.
    CheckInRecorded {
        owner_id: OwnerId,
        next_due_at: Timestamp,
    },

    /// A check-in prompt could not be delivered after all retries.
    CheckInPromptFailed { owner_id: OwnerId, attempts: u32 },

    /// Missed check-ins crossed the threshold; contacts were asked to confirm.
    EscalationStarted {
        owner_id: OwnerId,
        verifiers: usize,
        window_closes_at: Timestamp,
    },

    /// Escalation ended without quorum, or the owner checked in.
    EscalationStoodDown { owner_id: OwnerId, reason: String },

    /// Posthumous quorum formed.
    OwnerConfirmedDeceased { owner_id: OwnerId, at: Timestamp },
}

impl EngineEvent {
    /// Get the topic this event belongs to.
    #[must_use]
    pub fn topic(&self) -> EventTopic {
        match self {
            Self::MessageScheduled { .. }
            | Self::MessageTransitioned { .. }
            | Self::MessageDelivered { .. }
            | Self::MessageFailed { .. }
            | Self::MessageCancelled { .. } => EventTopic::Delivery,
            Self::VerificationIssued { .. } | Self::VerificationResponded { .. } => {
                EventTopic::Verification
            }
            Self::CheckInRecorded { .. }
            | Self::CheckInPromptFailed { .. }
            | Self::EscalationStarted { .. }
            | Self::EscalationStoodDown { .. }
            | Self::OwnerConfirmedDeceased { .. } => EventTopic::Liveness,
        }
    }

    /// Get the subsystem that emits this event.
    #[must_use]
    pub fn source_subsystem(&self) -> u8 {
        match self {
            Self::MessageScheduled { .. } | Self::MessageCancelled { .. } => source::DELIVERY,
            Self::MessageTransitioned { .. }
            | Self::MessageDelivered { .. }
            | Self::MessageFailed { .. } => source::SCHEDULER,
            Self::VerificationIssued { .. } | Self::VerificationResponded { .. } => {
                source::VERIFICATION_LEDGER
            }
            Self::CheckInRecorded { .. }
            | Self::CheckInPromptFailed { .. }
            | Self::EscalationStarted { .. }
            | Self::EscalationStoodDown { .. }
            | Self::OwnerConfirmedDeceased { .. } => source::LIVENESS_MONITOR,
        }
    }
}

/// Event topics for filtering subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventTopic {
    /// Message lifecycle.
    Delivery,
    /// Verification requests and responses.
    Verification,
    /// Check-ins and escalations.
    Liveness,
    /// All events (no filtering).
    All,
}

/// Filter for subscribing to specific events.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Topics to include. Empty means all topics.
    pub topics: Vec<EventTopic>,
    /// Source subsystems to include. Empty means all sources.
    pub source_subsystems: Vec<u8>,
}

impl EventFilter {
    /// Create a filter that accepts all events.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Create a filter for specific topics.
    #[must_use]
    pub fn topics(topics: Vec<EventTopic>) -> Self {
        Self {
            topics,
            source_subsystems: Vec::new(),
        }
    }

    /// Create a filter for events from specific subsystems.
    #[must_use]
    pub fn from_subsystems(subsystems: Vec<u8>) -> Self {
        Self {
            topics: Vec::new(),
            source_subsystems: subsystems,
        }
    }

    /// Check if an event matches this filter.
    #[must_use]
    pub fn matches(&self, event: &EngineEvent) -> bool {
        let topic_match = self.topics.is_empty()
            || self.topics.contains(&EventTopic::All)
            || self.topics.contains(&event.topic());

        let source_match = self.source_subsystems.is_empty()
            || self.source_subsystems.contains(&event.source_subsystem());

        topic_match && source_match
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cancelled() -> EngineEvent {
        EngineEvent::MessageCancelled {
            message_id: MessageId::new(),
        }
    }

    fn stood_down() -> EngineEvent {
        EngineEvent::EscalationStoodDown {
            owner_id: OwnerId::new("owner-1"),
            reason: "check-in".into(),
        }
    }

    #[test]
    fn test_event_topic_mapping() {
        assert_eq!(cancelled().topic(), EventTopic::Delivery);
        assert_eq!(cancelled().source_subsystem(), source::DELIVERY);
        assert_eq!(stood_down().topic(), EventTopic::Liveness);
        assert_eq!(stood_down().source_subsystem(), source::LIVENESS_MONITOR);
    }

    #[test]
    fn test_filter_all() {
        assert!(EventFilter::all().matches(&cancelled()));
        assert!(EventFilter::topics(vec![EventTopic::All]).matches(&stood_down()));
    }

    #[test]
    fn test_filter_by_topic() {
        let filter = EventFilter::topics(vec![EventTopic::Liveness]);
        assert!(filter.matches(&stood_down()));
        assert!(!filter.matches(&cancelled()));
    }

    #[test]
    fn test_filter_by_subsystem() {
        let filter = EventFilter::from_subsystems(vec![source::DELIVERY]);
        assert!(filter.matches(&cancelled()));
        assert!(!filter.matches(&stood_down()));
    }
}
