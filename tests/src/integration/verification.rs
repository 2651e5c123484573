//! # Verification Scenarios
//!
//! Quorum arithmetic over every response order, event-triggered messages
//! end to end, and single-use tokens.

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::Duration;
    use keepsake_node::{ControlError, EngineConfig};
    use ks_01_verification_ledger::{
        Decision, LedgerError, QuorumPolicy, VerificationLedgerApi, VerificationSubject, VetoMode,
    };
    use ks_03_delivery::{FailureReason, MessageStatus, Trigger};
    use shared_types::{ContactId, MessageId, OwnerId, VerificationToken};

    use crate::integration::harness::{t0, Engine};

    fn owner() -> OwnerId {
        OwnerId::new("owner-gil")
    }

    fn event(required: u32, verifiers: &[ContactId]) -> Trigger {
        Trigger::Event {
            event_label: "wedding".into(),
            required_confirmations: required,
            verifier_ids: verifiers.iter().copied().collect::<BTreeSet<_>>(),
        }
    }

    // =========================================================================
    // QUORUM
    // =========================================================================

    #[derive(Clone, Copy, Debug, PartialEq)]
    enum Answer {
        Confirm,
        Deny,
        Silent,
    }

    const ORDERS: [[usize; 3]; 6] = [
        [0, 1, 2],
        [0, 2, 1],
        [1, 0, 2],
        [1, 2, 0],
        [2, 0, 1],
        [2, 1, 0],
    ];

    fn answer_sets() -> Vec<[Answer; 3]> {
        let all = [Answer::Confirm, Answer::Deny, Answer::Silent];
        let mut sets = Vec::new();
        for a in all {
            for b in all {
                for c in all {
                    sets.push([a, b, c]);
                }
            }
        }
        sets
    }

    async fn check_quorum_for_every_order(veto: VetoMode) {
        let engine = Engine::new();
        let ledger = engine.container.ledger.clone();
        let verifiers = engine
            .accepted_contacts(&owner(), &["ada", "bea", "cy"])
            .await;
        let policy = QuorumPolicy::new(2).with_veto(veto);
        let expires_at = t0() + Duration::days(7);

        for answers in answer_sets() {
            for order in ORDERS {
                let subject = VerificationSubject::Message(MessageId::new());
                let mut tokens: Vec<VerificationToken> = Vec::new();
                for verifier in &verifiers {
                    let issued = ledger
                        .issue(subject.clone(), *verifier, expires_at, t0())
                        .await
                        .unwrap();
                    tokens.push(issued.token);
                }

                let (mut confirmed, mut denied) = (0u32, 0u32);
                for (step, &who) in order.iter().enumerate() {
                    let at = t0() + Duration::hours(step as i64 + 1);
                    match answers[who] {
                        Answer::Confirm => {
                            ledger.respond(&tokens[who], Decision::Confirm, at).await.unwrap();
                            confirmed += 1;
                        }
                        Answer::Deny => {
                            ledger.respond(&tokens[who], Decision::Deny, at).await.unwrap();
                            denied += 1;
                        }
                        Answer::Silent => {}
                    }

                    let status = ledger.quorum_status(&subject, &policy, at).unwrap();
                    let vetoed = veto == VetoMode::AnyDenialBlocks && denied > 0;
                    assert_eq!(status.confirmed, confirmed, "{answers:?} in {order:?}");
                    assert_eq!(status.denied, denied, "{answers:?} in {order:?}");
                    assert_eq!(status.vetoed, vetoed, "{answers:?} in {order:?}");
                    assert_eq!(
                        status.satisfied,
                        !vetoed && confirmed >= 2,
                        "{answers:?} in {order:?}"
                    );
                }

                let silent = answers.iter().filter(|a| **a == Answer::Silent).count() as u32;
                let closed = ledger
                    .quorum_status(&subject, &policy, expires_at + Duration::seconds(1))
                    .unwrap();
                assert_eq!(closed.expired, silent);
                assert_eq!(closed.pending, 0);
                assert!(!closed.window_open);
                assert_eq!(closed.total(), 3);
            }
        }
    }

    #[tokio::test]
    async fn test_quorum_counts_in_every_response_order() {
        check_quorum_for_every_order(VetoMode::AuditOnly).await;
    }

    #[tokio::test]
    async fn test_quorum_counts_in_every_response_order_with_veto() {
        check_quorum_for_every_order(VetoMode::AnyDenialBlocks).await;
    }

    // =========================================================================
    // EVENT TRIGGER
    // =========================================================================

    #[tokio::test]
    async fn test_event_message_delivered_once_quorum_forms() {
        let engine = Engine::new();
        let verifiers = engine
            .accepted_contacts(&owner(), &["ada", "bea", "cy"])
            .await;
        let message = engine.letter(&owner(), event(2, &verifiers)).await;

        engine.pass().await;
        assert_eq!(
            engine.status(&owner(), &message.id),
            MessageStatus::AwaitingVerification
        );
        let requests = engine.notifier.verification_requests();
        assert_eq!(requests.len(), 3);

        engine.clock.advance(Duration::hours(1));
        engine
            .control
            .respond_to_verification(&requests[0].1, Decision::Confirm)
            .await
            .unwrap();
        engine
            .control
            .respond_to_verification(&requests[1].1, Decision::Deny)
            .await
            .unwrap();
        engine.pass().await;

        let view = engine
            .control
            .get_message_status(&owner(), &message.id)
            .unwrap();
        assert_eq!(view.status, MessageStatus::AwaitingVerification);
        assert_eq!(view.quorum_progress.as_deref(), Some("1/2"));
        assert!(engine.notifier.delivery_notices().is_empty());
        // Re-evaluation does not re-notify verifiers.
        assert_eq!(engine.notifier.verification_requests().len(), 3);

        engine.clock.advance(Duration::hours(1));
        engine
            .control
            .respond_to_verification(&requests[2].1, Decision::Confirm)
            .await
            .unwrap();
        engine.pass().await;

        assert_eq!(engine.status(&owner(), &message.id), MessageStatus::Delivered);
        assert_eq!(engine.notices_for(&message.id), 1);
    }

    #[tokio::test]
    async fn test_event_message_vetoed_under_blocking_policy() {
        let mut config = EngineConfig::default();
        config.delivery.veto = VetoMode::AnyDenialBlocks;
        let engine = Engine::with_config(config);
        let verifiers = engine.accepted_contacts(&owner(), &["ada", "bea"]).await;
        let message = engine.letter(&owner(), event(1, &verifiers)).await;

        engine.pass().await;
        let requests = engine.notifier.verification_requests();
        engine
            .control
            .respond_to_verification(&requests[0].1, Decision::Deny)
            .await
            .unwrap();
        engine.pass_at(engine.now() + Duration::minutes(1)).await;

        let stored = engine.stored(&owner(), &message.id);
        assert_eq!(stored.status, MessageStatus::Failed);
        assert!(stored.is_terminal());
        assert_eq!(
            stored.last_failure.map(|f| f.reason),
            Some(FailureReason::Vetoed)
        );

        // The other verifier's token died with the message.
        let err = engine
            .control
            .respond_to_verification(&requests[1].1, Decision::Confirm)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ControlError::Ledger(LedgerError::TokenExpired { .. })
        ));
        assert!(engine.notifier.delivery_notices().is_empty());
    }

    #[tokio::test]
    async fn test_event_verifier_must_be_an_accepted_contact() {
        let engine = Engine::new();
        let pending = engine
            .control
            .add_contact(
                &owner(),
                "Hal".into(),
                "hal@example.com".into(),
                "cousin".into(),
            )
            .await
            .unwrap();
        let content_ref = engine.control.upload_content(b"congrats".to_vec()).await.unwrap();
        let draft = engine
            .control
            .create_message(
                &owner(),
                ks_03_delivery::NewMessage {
                    kind: shared_types::MessageKind::Letter,
                    title: "Congratulations".into(),
                    recipient: shared_types::Recipient::new("Ivy", "ivy@example.com"),
                    content_ref: Some(content_ref),
                },
            )
            .await
            .unwrap();

        let result = engine
            .control
            .schedule_message(&owner(), &draft.id, event(1, &[pending.id]))
            .await;
        assert!(result.is_err());
        assert_eq!(engine.status(&owner(), &draft.id), MessageStatus::Draft);
    }

    // =========================================================================
    // TOKENS
    // =========================================================================

    #[tokio::test]
    async fn test_verification_token_is_single_use() {
        let engine = Engine::new();
        let verifiers = engine
            .accepted_contacts(&owner(), &["ada", "bea", "cy"])
            .await;
        let message = engine.letter(&owner(), event(2, &verifiers)).await;
        engine.pass().await;
        let requests = engine.notifier.verification_requests();

        engine
            .control
            .respond_to_verification(&requests[0].1, Decision::Confirm)
            .await
            .unwrap();
        let before = engine
            .control
            .get_message_status(&owner(), &message.id)
            .unwrap()
            .quorum_progress;

        for decision in [Decision::Confirm, Decision::Deny] {
            let err = engine
                .control
                .respond_to_verification(&requests[0].1, decision)
                .await
                .unwrap_err();
            assert!(matches!(
                err,
                ControlError::Ledger(LedgerError::AlreadyResponded { .. })
            ));
        }

        let after = engine
            .control
            .get_message_status(&owner(), &message.id)
            .unwrap()
            .quorum_progress;
        assert_eq!(before.as_deref(), Some("1/2"));
        assert_eq!(after, before);

        engine.pass().await;
        assert_eq!(
            engine.status(&owner(), &message.id),
            MessageStatus::AwaitingVerification
        );
    }
}
