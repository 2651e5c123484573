//! # Dead-Man's-Switch Scenarios
//!
//! Posthumous messages released by the liveness monitor and the ledger
//! together, driven one clock pass at a time.

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use keepsake_node::ControlError;
    use ks_01_verification_ledger::{Decision, LedgerError};
    use ks_02_liveness_monitor::{CheckInFrequency, DeadMansSwitchApi, LivenessVerdict, TickOutcome};
    use ks_03_delivery::{Message, MessageStatus, Trigger};
    use shared_bus::{EngineEvent, EventFilter};
    use shared_types::{OwnerId, Recipient, Timestamp};

    use crate::integration::harness::Engine;

    fn owner() -> OwnerId {
        OwnerId::new("owner-dana")
    }

    /// Monthly check-ins, three accepted contacts, two posthumous letters.
    async fn enrolled(engine: &Engine) -> (Vec<Message>, Timestamp) {
        engine
            .accepted_contacts(&owner(), &["ada", "bea", "cy"])
            .await;
        let record = engine
            .control
            .enroll_check_in(&owner(), CheckInFrequency::Monthly)
            .await
            .unwrap();

        let mut letters = Vec::new();
        for (name, email) in [("Eli", "eli@example.com"), ("Fay", "fay@example.com")] {
            letters.push(
                engine
                    .letter_to(&owner(), Recipient::new(name, email), Trigger::Posthumous)
                    .await,
            );
        }
        (letters, record.next_due_at)
    }

    fn escalation_started(outcomes: &[(OwnerId, TickOutcome)]) -> Option<usize> {
        outcomes.iter().find_map(|(_, outcome)| match outcome {
            TickOutcome::EscalationStarted { verifiers } => Some(*verifiers),
            _ => None,
        })
    }

    #[tokio::test]
    async fn test_monthly_owner_confirmed_deceased_releases_posthumous_letters() {
        let engine = Engine::new();
        let (letters, due_at) = enrolled(&engine).await;
        let mut events = engine.container.event_bus.subscribe(EventFilter::all());

        let schedule = engine.control.next_check_in(&owner()).await.unwrap();
        engine.pass_at(schedule.prompt_at).await;
        assert_eq!(engine.notifier.check_in_prompts(), 1);

        // Nobody checks in.
        let pass = engine.pass_at(due_at + Duration::minutes(1)).await;
        let sweep = pass.monitor.unwrap();
        assert_eq!(escalation_started(&sweep.outcomes), Some(3));

        let requests = engine.notifier.verification_requests();
        assert_eq!(requests.len(), 3);
        let mut emails: Vec<_> = requests.iter().map(|(email, _)| email.as_str()).collect();
        emails.sort_unstable();
        assert_eq!(emails, ["ada@example.com", "bea@example.com", "cy@example.com"]);
        for letter in &letters {
            assert_eq!(
                engine.status(&owner(), &letter.id),
                MessageStatus::AwaitingVerification
            );
        }
        assert!(engine.notifier.delivery_notices().is_empty());

        engine.clock.advance(Duration::days(2));
        engine
            .control
            .respond_to_verification(&requests[0].1, Decision::Confirm)
            .await
            .unwrap();
        engine.pass().await;
        assert!(matches!(
            engine.control.liveness(&owner()).unwrap(),
            LivenessVerdict::Escalated { ref quorum, .. } if quorum.confirmed == 1
        ));
        assert!(engine.notifier.delivery_notices().is_empty());

        engine.clock.advance(Duration::days(1));
        engine
            .control
            .respond_to_verification(&requests[2].1, Decision::Confirm)
            .await
            .unwrap();
        engine.pass().await;

        assert!(matches!(
            engine.control.liveness(&owner()).unwrap(),
            LivenessVerdict::Deceased { .. }
        ));
        for letter in &letters {
            assert_eq!(engine.status(&owner(), &letter.id), MessageStatus::Delivered);
            assert_eq!(engine.notices_for(&letter.id), 1);
        }
        let mut recipients: Vec<_> = engine
            .notifier
            .delivery_notices()
            .into_iter()
            .map(|n| n.recipient_email)
            .collect();
        recipients.sort();
        assert_eq!(recipients, ["eli@example.com", "fay@example.com"]);

        let observed = events.drain();
        assert!(observed
            .iter()
            .any(|e| matches!(e, EngineEvent::EscalationStarted { verifiers: 3, .. })));
        assert!(observed
            .iter()
            .any(|e| matches!(e, EngineEvent::OwnerConfirmedDeceased { .. })));
    }

    #[tokio::test]
    async fn test_owner_check_in_during_escalation_stands_everything_down() {
        let engine = Engine::new();
        let (letters, due_at) = enrolled(&engine).await;
        let token = engine
            .container
            .monitor
            .get_check_in(&owner())
            .unwrap()
            .unwrap()
            .token;

        engine.pass_at(due_at + Duration::minutes(1)).await;
        let requests = engine.notifier.verification_requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(
            engine.status(&owner(), &letters[0].id),
            MessageStatus::AwaitingVerification
        );

        // The owner was on holiday, not gone.
        engine.clock.advance(Duration::days(1));
        let record = engine.control.record_check_in(&token).await.unwrap();
        assert_eq!(record.missed_count, 0);

        engine.pass().await;
        for letter in &letters {
            assert_eq!(engine.status(&owner(), &letter.id), MessageStatus::Scheduled);
        }
        assert!(matches!(
            engine.control.liveness(&owner()).unwrap(),
            LivenessVerdict::Monitoring { missed_count: 0, .. }
        ));

        // Confirmations that arrive late no longer count.
        for (_, token) in &requests[..2] {
            let err = engine
                .control
                .respond_to_verification(token, Decision::Confirm)
                .await
                .unwrap_err();
            assert!(matches!(
                err,
                ControlError::Ledger(LedgerError::TokenExpired { .. })
            ));
        }

        engine.clock.advance(Duration::days(3));
        engine.pass().await;
        assert!(engine.notifier.delivery_notices().is_empty());
        for letter in &letters {
            assert_eq!(engine.status(&owner(), &letter.id), MessageStatus::Scheduled);
        }
    }

    #[tokio::test]
    async fn test_escalation_without_quorum_stands_down_after_window() {
        let engine = Engine::new();
        let (letters, due_at) = enrolled(&engine).await;

        let escalated_at = due_at + Duration::minutes(1);
        engine.pass_at(escalated_at).await;
        let requests = engine.notifier.verification_requests();
        engine
            .control
            .respond_to_verification(&requests[0].1, Decision::Confirm)
            .await
            .unwrap();

        let window = engine.container.config.monitor.escalation_window;
        engine
            .pass_at(escalated_at + window + Duration::minutes(1))
            .await;

        assert!(matches!(
            engine.control.liveness(&owner()).unwrap(),
            LivenessVerdict::Monitoring { missed_count: 0, .. }
        ));
        for letter in &letters {
            assert_eq!(engine.status(&owner(), &letter.id), MessageStatus::Scheduled);
        }
        assert!(engine.notifier.delivery_notices().is_empty());
    }

    #[tokio::test]
    async fn test_posthumous_scheduling_requires_enrollment() {
        let engine = Engine::new();
        let content_ref = engine
            .control
            .upload_content(b"goodbye".to_vec())
            .await
            .unwrap();
        let draft = engine
            .control
            .create_message(
                &owner(),
                ks_03_delivery::NewMessage {
                    kind: shared_types::MessageKind::Letter,
                    title: "Goodbye".into(),
                    recipient: Recipient::new("Eli", "eli@example.com"),
                    content_ref: Some(content_ref),
                },
            )
            .await
            .unwrap();

        let result = engine
            .control
            .schedule_message(&owner(), &draft.id, Trigger::Posthumous)
            .await;
        assert!(result.is_err());
        assert_eq!(engine.status(&owner(), &draft.id), MessageStatus::Draft);
    }
}
