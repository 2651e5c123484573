//! # Restart Scenarios
//!
//! The engine keeps nothing that matters in memory: messages, receipts,
//! check-ins and contacts all come back from a file-backed store.

#[cfg(test)]
mod tests {
    use std::path::Path;

    use chrono::Duration;
    use keepsake_node::EngineConfig;
    use ks_02_liveness_monitor::{CheckInFrequency, LivenessVerdict};
    use ks_03_delivery::{
        delivery_key, DeliveryReceipt, KvMessageRepository, MessageRepository, MessageStatus,
        Trigger,
    };
    use shared_types::storage::{shared, SharedKvStore};
    use shared_types::{FileBackedKVStore, OwnerId, Timestamp};
    use tempfile::TempDir;

    use crate::integration::harness::{t0, Engine};

    fn owner() -> OwnerId {
        OwnerId::new("owner-jo")
    }

    fn open(path: &Path) -> SharedKvStore {
        shared(FileBackedKVStore::open(path).unwrap())
    }

    fn engine_at(path: &Path, start: Timestamp) -> Engine {
        Engine::with_store(EngineConfig::default(), open(path), start)
    }

    #[tokio::test]
    async fn test_scheduled_message_survives_restart() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("keepsake.db");
        let deliver_at = t0() + Duration::days(30);

        let message_id = {
            let engine = engine_at(&path, t0());
            let message = engine.letter(&owner(), Trigger::Date { deliver_at }).await;
            engine.pass().await;
            assert_eq!(engine.status(&owner(), &message.id), MessageStatus::Scheduled);
            message.id
        };

        let engine = engine_at(&path, deliver_at);
        assert_eq!(engine.status(&owner(), &message_id), MessageStatus::Scheduled);
        engine.pass().await;

        assert_eq!(engine.status(&owner(), &message_id), MessageStatus::Delivered);
        assert_eq!(engine.notices_for(&message_id), 1);
    }

    #[tokio::test]
    async fn test_acknowledged_delivery_is_not_resent_after_crash() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("keepsake.db");
        let deliver_at = t0() + Duration::hours(1);

        let message_id = {
            let engine = engine_at(&path, t0());
            let message = engine.letter(&owner(), Trigger::Date { deliver_at }).await;

            // Crash between the notifier's acknowledgement and the final save.
            let repo = KvMessageRepository::new(engine.container.store.clone());
            let mut stuck = repo.get(&message.id).unwrap().unwrap();
            stuck.status = MessageStatus::Processing;
            repo.save(&stuck).unwrap();
            repo.save_receipt(&DeliveryReceipt {
                delivery_key: delivery_key(&message.id, 1),
                message_id: message.id,
                attempt: 1,
                acknowledged_at: deliver_at,
            })
            .unwrap();
            message.id
        };

        let engine = engine_at(&path, deliver_at + Duration::minutes(5));
        engine.pass().await;

        assert_eq!(engine.status(&owner(), &message_id), MessageStatus::Delivered);
        assert!(engine.notifier.delivery_notices().is_empty());
    }

    #[tokio::test]
    async fn test_liveness_and_contacts_survive_restart() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("keepsake.db");

        let due_at = {
            let engine = engine_at(&path, t0());
            engine.accepted_contacts(&owner(), &["ada", "bea"]).await;
            let record = engine
                .control
                .enroll_check_in(&owner(), CheckInFrequency::Weekly)
                .await
                .unwrap();
            engine.letter(&owner(), Trigger::Posthumous).await;
            record.next_due_at
        };

        let engine = engine_at(&path, due_at + Duration::minutes(1));
        assert_eq!(engine.control.list_contacts(&owner()).unwrap().len(), 2);
        assert!(matches!(
            engine.control.liveness(&owner()).unwrap(),
            LivenessVerdict::Monitoring { .. }
        ));

        engine.pass().await;
        assert_eq!(engine.notifier.verification_requests().len(), 2);
        assert!(matches!(
            engine.control.liveness(&owner()).unwrap(),
            LivenessVerdict::Escalated { .. }
        ));
        let messages = engine.control.list_messages(&owner()).unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].status, MessageStatus::AwaitingVerification);

        // A store handle opened later sees the same state.
        drop(engine);
        let reopened = open(&path);
        assert_eq!(reopened.read().prefix_scan(b"vr/req/").unwrap().len(), 2);
    }
}
