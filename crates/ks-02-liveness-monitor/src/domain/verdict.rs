//! Derived liveness status, read by the scheduler for posthumous messages.

use ks_01_verification_ledger::QuorumStatus;
use serde::{Deserialize, Serialize};
use shared_types::Timestamp;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LivenessVerdict {
    /// The owner never enrolled in the dead-man's-switch.
    Unenrolled,
    Monitoring {
        next_due_at: Timestamp,
        missed_count: u32,
    },
    Escalated {
        started_at: Timestamp,
        window_closes_at: Timestamp,
        quorum: QuorumStatus,
    },
    Deceased { at: Timestamp },
}

impl LivenessVerdict {
    pub fn is_deceased(&self) -> bool {
        matches!(self, LivenessVerdict::Deceased { .. })
    }

    /// `confirmed/required` while escalated.
    pub fn progress(&self) -> Option<String> {
        match self {
            LivenessVerdict::Escalated { quorum, .. } => Some(quorum.progress()),
            _ => None,
        }
    }
}
