//! Per-message processing leases.
//!
//! A lease is an exclusive, time-bounded claim on one message. Acquire is
//! check-and-set under a single lock, so two overlapping ticks can never
//! both hold the same message. Expiry is measured on engine time (the
//! `now` handed to `tick`), and a lease past its TTL is reclaimed by
//! [`LeaseManager::reap_expired`] or by the next `acquire`.

use parking_lot::Mutex;
use shared_types::{MessageId, Timestamp};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};
use uuid::Uuid;

/// Proof of holding a lease. Only the holder can release it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LeaseToken(Uuid);

#[derive(Clone, Copy, Debug)]
struct Lease {
    token: LeaseToken,
    expires_at: Timestamp,
}

#[derive(Debug, Default)]
pub struct LeaseStats {
    pub acquired: AtomicU64,
    pub contended: AtomicU64,
    pub reclaimed: AtomicU64,
}

pub struct LeaseManager {
    leases: Mutex<HashMap<MessageId, Lease>>,
    ttl: chrono::Duration,
    stats: LeaseStats,
}

impl LeaseManager {
    pub fn new(ttl: chrono::Duration) -> Self {
        Self {
            leases: Mutex::new(HashMap::new()),
            ttl,
            stats: LeaseStats::default(),
        }
    }

    /// Claim `message_id` until `now + ttl`. `None` while someone else holds it.
    pub fn acquire(&self, message_id: &MessageId, now: Timestamp) -> Option<LeaseToken> {
        let mut leases = self.leases.lock();
        if let Some(existing) = leases.get(message_id) {
            if existing.expires_at > now {
                self.stats.contended.fetch_add(1, Ordering::Relaxed);
                debug!(message_id = %message_id, "[ks-04] lease held elsewhere");
                return None;
            }
            self.stats.reclaimed.fetch_add(1, Ordering::Relaxed);
            warn!(
                message_id = %message_id,
                expired_at = %existing.expires_at,
                "[ks-04] reclaiming expired lease"
            );
        }
        let token = LeaseToken(Uuid::new_v4());
        leases.insert(
            *message_id,
            Lease {
                token,
                expires_at: now + self.ttl,
            },
        );
        self.stats.acquired.fetch_add(1, Ordering::Relaxed);
        Some(token)
    }

    /// Release a lease. A stale token (the lease was reclaimed and handed
    /// to another worker) leaves the current holder alone.
    pub fn release(&self, message_id: &MessageId, token: LeaseToken) -> bool {
        let mut leases = self.leases.lock();
        match leases.get(message_id) {
            Some(lease) if lease.token == token => {
                leases.remove(message_id);
                true
            }
            _ => false,
        }
    }

    /// Drop every lease whose TTL elapsed before `now`.
    pub fn reap_expired(&self, now: Timestamp) -> usize {
        let mut leases = self.leases.lock();
        let before = leases.len();
        leases.retain(|id, lease| {
            let keep = lease.expires_at > now;
            if !keep {
                warn!(message_id = %id, "[ks-04] reaping expired lease");
            }
            keep
        });
        let reaped = before - leases.len();
        self.stats
            .reclaimed
            .fetch_add(reaped as u64, Ordering::Relaxed);
        reaped
    }

    pub fn is_held(&self, message_id: &MessageId, now: Timestamp) -> bool {
        self.leases
            .lock()
            .get(message_id)
            .is_some_and(|l| l.expires_at > now)
    }

    pub fn held_count(&self) -> usize {
        self.leases.lock().len()
    }

    pub fn stats(&self) -> &LeaseStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn t0() -> Timestamp {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_second_acquire_is_refused() {
        let leases = LeaseManager::new(Duration::seconds(120));
        let id = MessageId::new();
        assert!(leases.acquire(&id, t0()).is_some());
        assert!(leases.acquire(&id, t0() + Duration::seconds(119)).is_none());
        assert_eq!(leases.stats().contended.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_release_frees_the_message() {
        let leases = LeaseManager::new(Duration::seconds(120));
        let id = MessageId::new();
        let token = leases.acquire(&id, t0()).unwrap();
        assert!(leases.release(&id, token));
        assert!(!leases.is_held(&id, t0()));
        assert!(leases.acquire(&id, t0()).is_some());
    }

    #[test]
    fn test_expired_lease_is_reclaimed_and_stale_release_ignored() {
        let leases = LeaseManager::new(Duration::seconds(120));
        let id = MessageId::new();
        let stale = leases.acquire(&id, t0()).unwrap();

        let later = t0() + Duration::seconds(121);
        let fresh = leases.acquire(&id, later).unwrap();
        assert_ne!(stale, fresh);

        assert!(!leases.release(&id, stale));
        assert!(leases.is_held(&id, later));
        assert!(leases.release(&id, fresh));
    }

    #[test]
    fn test_reaper_drops_only_expired() {
        let leases = LeaseManager::new(Duration::seconds(120));
        let old = MessageId::new();
        let young = MessageId::new();
        leases.acquire(&old, t0()).unwrap();
        leases.acquire(&young, t0() + Duration::seconds(100)).unwrap();

        assert_eq!(leases.reap_expired(t0() + Duration::seconds(150)), 1);
        assert_eq!(leases.held_count(), 1);
        assert!(leases.is_held(&young, t0() + Duration::seconds(150)));
    }
}
