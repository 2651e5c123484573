//! Evidence snapshot handed to `advance`.

use super::message::FailureReason;
use ks_01_verification_ledger::QuorumStatus;
use ks_02_liveness_monitor::LivenessVerdict;
use shared_types::Timestamp;

/// Result of one delivery attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Acknowledged {
        attempt: u32,
    },
    Failed {
        attempt: u32,
        reason: FailureReason,
        detail: String,
    },
}

impl DeliveryOutcome {
    pub fn attempt(&self) -> u32 {
        match self {
            DeliveryOutcome::Acknowledged { attempt } | DeliveryOutcome::Failed { attempt, .. } => {
                *attempt
            }
        }
    }
}

/// Everything `advance` may look at. The scheduler fills in what the
/// message's trigger needs; absent evidence leaves the message where it is.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Evidence {
    pub now: Timestamp,
    /// Event triggers: quorum for the message subject.
    pub quorum: Option<QuorumStatus>,
    /// Posthumous triggers: the owner's liveness verdict.
    pub liveness: Option<LivenessVerdict>,
    pub delivery: Option<DeliveryOutcome>,
}

impl Evidence {
    pub fn at(now: Timestamp) -> Self {
        Self {
            now,
            quorum: None,
            liveness: None,
            delivery: None,
        }
    }

    pub fn with_quorum(mut self, quorum: QuorumStatus) -> Self {
        self.quorum = Some(quorum);
        self
    }

    pub fn with_liveness(mut self, verdict: LivenessVerdict) -> Self {
        self.liveness = Some(verdict);
        self
    }

    pub fn with_delivery(mut self, outcome: DeliveryOutcome) -> Self {
        self.delivery = Some(outcome);
        self
    }
}
