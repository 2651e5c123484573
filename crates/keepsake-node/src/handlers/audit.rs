//! Audit trail of every engine event.
//!
//! Observes the bus and never acts on it. Each event becomes one
//! structured log line and bumps `ks_events_observed_total{topic}`;
//! delivery failures also count toward `ks_errors_total`.

use keepsake_telemetry::{log_message_event, log_owner_event, ENGINE_ERRORS, EVENTS_OBSERVED};
use shared_bus::{EngineEvent, EventTopic, Subscription};
use tracing::info;

pub struct AuditHandler {
    subscription: Subscription,
}

fn topic_label(topic: EventTopic) -> &'static str {
    match topic {
        EventTopic::Delivery => "delivery",
        EventTopic::Verification => "verification",
        EventTopic::Liveness => "liveness",
        EventTopic::All => "all",
    }
}

impl AuditHandler {
    pub fn new(subscription: Subscription) -> Self {
        Self { subscription }
    }

    /// Consume events until the bus closes. Returns how many were seen.
    pub async fn run(mut self) -> u64 {
        info!("[ks-node] audit handler started");
        let mut seen = 0u64;
        while let Some(event) = self.subscription.recv().await {
            record(&event);
            seen += 1;
        }
        info!(events = seen, "[ks-node] audit handler stopped");
        seen
    }
}

fn record(event: &EngineEvent) {
    EVENTS_OBSERVED
        .with_label_values(&[topic_label(event.topic())])
        .inc();

    match event {
        EngineEvent::MessageScheduled {
            message_id,
            owner_id,
            trigger,
        } => log_message_event!(info, "ks-03", "[audit] message scheduled", message_id, owner_id = %owner_id, trigger = %trigger),
        EngineEvent::MessageTransitioned {
            message_id,
            from,
            to,
        } => log_message_event!(info, "ks-04", "[audit] message transitioned", message_id, from = %from, to = %to),
        EngineEvent::MessageDelivered {
            message_id,
            attempt,
            delivery_key,
        } => log_message_event!(info, "ks-04", "[audit] message delivered", message_id, attempt = *attempt, delivery_key = %delivery_key),
        EngineEvent::MessageFailed {
            message_id,
            category,
            detail,
            terminal,
            retry_at,
        } => {
            ENGINE_ERRORS
                .with_label_values(&["ks-04", &category.to_string()])
                .inc();
            if *terminal {
                log_message_event!(error, "ks-04", "[audit] message failed permanently", message_id, category = %category, detail = %detail)
            } else {
                log_message_event!(warn, "ks-04", "[audit] message failed, will retry", message_id, category = %category, detail = %detail, retry_at = ?retry_at)
            }
        }
        EngineEvent::MessageCancelled { message_id } => {
            log_message_event!(info, "ks-03", "[audit] message cancelled", message_id)
        }
        EngineEvent::VerificationIssued {
            request_id,
            subject,
            contact_id,
            round,
        } => info!(
            subsystem = "ks-01",
            request_id = %request_id,
            subject = %subject,
            contact_id = %contact_id,
            round = *round,
            "[audit] verification requested"
        ),
        EngineEvent::VerificationResponded {
            request_id,
            subject,
            confirmed,
        } => info!(
            subsystem = "ks-01",
            request_id = %request_id,
            subject = %subject,
            confirmed = *confirmed,
            "[audit] verification answered"
        ),
        EngineEvent::CheckInRecorded {
            owner_id,
            next_due_at,
        } => log_owner_event!(info, "ks-02", "[audit] check-in recorded", owner_id, next_due_at = %next_due_at),
        EngineEvent::CheckInPromptFailed { owner_id, attempts } => {
            ENGINE_ERRORS.with_label_values(&["ks-02", "transient"]).inc();
            log_owner_event!(warn, "ks-02", "[audit] check-in prompt undeliverable", owner_id, attempts = *attempts)
        }
        EngineEvent::EscalationStarted {
            owner_id,
            verifiers,
            window_closes_at,
        } => log_owner_event!(warn, "ks-02", "[audit] escalation started", owner_id, verifiers = *verifiers, window_closes_at = %window_closes_at),
        EngineEvent::EscalationStoodDown { owner_id, reason } => {
            log_owner_event!(info, "ks-02", "[audit] escalation stood down", owner_id, reason = %reason)
        }
        EngineEvent::OwnerConfirmedDeceased { owner_id, at } => {
            log_owner_event!(warn, "ks-02", "[audit] owner confirmed deceased", owner_id, at = %at)
        }
    }
}
