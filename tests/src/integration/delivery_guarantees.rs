//! # Delivery Guarantees
//!
//! Exactly-once release under overlapping ticks, idempotent state
//! transitions, terminal immutability and date exactness, observed through
//! the wired engine rather than a single subsystem.

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use chrono::Duration;
    use keepsake_node::ControlError;
    use ks_03_delivery::{
        DeliveryConfig, DeliveryError, DeliveryOutcome, DeliveryStateMachine, Evidence,
        FailureReason, MessageStatus, Trigger,
    };
    use ks_04_scheduler::SchedulerApi;
    use shared_types::{OwnerId, Recipient};

    use crate::integration::harness::{t0, Engine};

    fn owner() -> OwnerId {
        OwnerId::new("owner-ann")
    }

    // =========================================================================
    // EXACTLY ONCE
    // =========================================================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_ticks_deliver_each_message_once() {
        let engine = Engine::new();
        let deliver_at = t0() + Duration::minutes(10);
        let mut ids = Vec::new();
        for i in 0..20 {
            let recipient = Recipient::new(format!("r{i}"), format!("r{i}@example.com"));
            let message = engine
                .letter_to(&owner(), recipient, Trigger::Date { deliver_at })
                .await;
            ids.push(message.id);
        }
        engine
            .notifier
            .set_delay(Some(std::time::Duration::from_millis(20)));

        let scheduler = engine.container.scheduler.clone();
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let scheduler = Arc::clone(&scheduler);
                tokio::spawn(async move { scheduler.tick(deliver_at).await })
            })
            .collect();

        let mut delivered = 0;
        for handle in handles {
            let report = handle.await.unwrap().unwrap();
            assert_eq!(report.errors, 0);
            delivered += report.delivered;
        }
        // A sweep after the dust settles finds nothing left to send.
        let late = engine.tick_at(deliver_at + Duration::minutes(5)).await;
        delivered += late.delivered;

        assert_eq!(delivered, ids.len());
        assert_eq!(engine.notifier.delivery_notices().len(), ids.len());
        for id in &ids {
            assert_eq!(engine.notices_for(id), 1, "message {id} sent more than once");
            assert_eq!(engine.status(&owner(), id), MessageStatus::Delivered);
        }
        let keys: HashSet<_> = engine
            .notifier
            .delivery_notices()
            .into_iter()
            .map(|n| n.delivery_key)
            .collect();
        assert_eq!(keys.len(), ids.len());
        assert_eq!(engine.container.scheduler.leases().held_count(), 0);
    }

    #[tokio::test]
    async fn test_repeated_passes_after_delivery_send_nothing() {
        let engine = Engine::new();
        let message = engine
            .letter(&owner(), Trigger::Date { deliver_at: t0() })
            .await;

        engine.pass().await;
        for minutes in 1..=5 {
            engine.pass_at(t0() + Duration::minutes(minutes)).await;
        }
        assert_eq!(engine.notices_for(&message.id), 1);
    }

    // =========================================================================
    // STATE MACHINE
    // =========================================================================

    #[tokio::test]
    async fn test_advance_is_idempotent_for_repeated_outcome() {
        let engine = Engine::new();
        let scheduled = engine
            .letter(&owner(), Trigger::Date { deliver_at: t0() })
            .await;
        let mut processing = scheduled.clone();
        processing.status = MessageStatus::Processing;

        let machine = DeliveryStateMachine::new(DeliveryConfig::default());
        let evidence = Evidence::at(t0()).with_delivery(DeliveryOutcome::Failed {
            attempt: 1,
            reason: FailureReason::NotifierUnavailable,
            detail: "smtp down".into(),
        });

        let first = machine.advance(&processing, &evidence).unwrap();
        assert!(first.changed);
        assert_eq!(first.message.status, MessageStatus::Failed);
        assert_eq!(first.message.attempts, 1);
        assert!(first.message.retry_at.is_some());

        // Same input, same output.
        assert_eq!(machine.advance(&processing, &evidence).unwrap(), first);

        // The outcome replayed against the already-failed message is a no-op.
        let replay = machine.advance(&first.message, &evidence).unwrap();
        assert!(!replay.changed);
        assert_eq!(replay.effect, None);
        assert_eq!(replay.message.attempts, 1);
    }

    #[tokio::test]
    async fn test_terminal_messages_are_immutable() {
        let engine = Engine::new();
        let message = engine
            .letter(&owner(), Trigger::Date { deliver_at: t0() })
            .await;
        engine.pass().await;
        let delivered = engine.stored(&owner(), &message.id);
        assert_eq!(delivered.status, MessageStatus::Delivered);

        let machine = DeliveryStateMachine::new(DeliveryConfig::default());
        let later = Evidence::at(t0() + Duration::days(1)).with_delivery(DeliveryOutcome::Failed {
            attempt: 1,
            reason: FailureReason::NotifierUnavailable,
            detail: "late failure report".into(),
        });
        assert!(matches!(
            machine.advance(&delivered, &later),
            Err(DeliveryError::InvalidStateTransition { .. })
        ));

        let err = engine
            .control
            .cancel_message(&owner(), &message.id)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ControlError::Delivery(DeliveryError::InvalidStateTransition { .. })
        ));

        engine.pass_at(t0() + Duration::days(2)).await;
        assert_eq!(engine.stored(&owner(), &message.id), delivered);
    }

    #[tokio::test]
    async fn test_cancelled_message_stays_cancelled() {
        let engine = Engine::new();
        let deliver_at = t0() + Duration::hours(1);
        let message = engine.letter(&owner(), Trigger::Date { deliver_at }).await;

        engine
            .control
            .cancel_message(&owner(), &message.id)
            .await
            .unwrap();
        let cancelled = engine.stored(&owner(), &message.id);

        engine.pass_at(deliver_at).await;
        engine.pass_at(deliver_at + Duration::days(1)).await;
        assert_eq!(engine.stored(&owner(), &message.id), cancelled);
        assert!(engine.notifier.delivery_notices().is_empty());
    }

    // =========================================================================
    // DATE TRIGGER
    // =========================================================================

    #[tokio::test]
    async fn test_date_trigger_fires_at_deliver_at_and_not_before() {
        let engine = Engine::new();
        let deliver_at = t0() + Duration::days(3);
        let message = engine.letter(&owner(), Trigger::Date { deliver_at }).await;

        engine.pass_at(deliver_at - Duration::seconds(1)).await;
        assert_eq!(engine.status(&owner(), &message.id), MessageStatus::Scheduled);

        engine.pass_at(deliver_at).await;
        assert_eq!(engine.status(&owner(), &message.id), MessageStatus::Delivered);
    }

    #[tokio::test]
    async fn test_one_hour_letter_reaches_its_recipient() {
        let engine = Engine::new();
        let deliver_at = t0() + Duration::hours(1);
        let message = engine
            .letter_to(
                &owner(),
                Recipient::new("Bea", "bea@example.com"),
                Trigger::Date { deliver_at },
            )
            .await;

        engine.pass_at(t0() + Duration::minutes(30)).await;
        assert_eq!(engine.status(&owner(), &message.id), MessageStatus::Scheduled);
        assert!(engine.notifier.delivery_notices().is_empty());

        engine.pass_at(t0() + Duration::minutes(61)).await;
        let view = engine
            .control
            .get_message_status(&owner(), &message.id)
            .unwrap();
        assert_eq!(view.status, MessageStatus::Delivered);
        assert_eq!(view.delivered_at, Some(t0() + Duration::minutes(61)));

        let notices = engine.notifier.delivery_notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].recipient_email, "bea@example.com");
        assert_eq!(notices[0].meta.message_id, message.id);
    }

    #[tokio::test]
    async fn test_transient_outage_retries_then_delivers() {
        let engine = Engine::new();
        let message = engine
            .letter(&owner(), Trigger::Date { deliver_at: t0() })
            .await;
        engine
            .notifier
            .fail_next(1, shared_types::NotifierError::Unavailable("smtp down".into()));

        engine.pass().await;
        let failed = engine.stored(&owner(), &message.id);
        assert_eq!(failed.status, MessageStatus::Failed);
        assert_eq!(failed.attempts, 1);
        let retry_at = failed.retry_at.unwrap();

        engine.pass_at(retry_at).await;
        assert_eq!(engine.status(&owner(), &message.id), MessageStatus::Delivered);
        assert_eq!(engine.notices_for(&message.id), 1);
    }
}
