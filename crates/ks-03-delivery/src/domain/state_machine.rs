//! Delivery State Machine
//!
//! ```text
//! Draft ──finalize──→ Scheduled ──date reached / quorum / deceased──→ Processing ──ack──→ Delivered
//!                       │   ↑                                            │
//!                       │   └──────────── retry_at reached ──── Failed ←─┘ error
//!                       ↓                                        ↑
//!              AwaitingVerification ──window closed / veto───────┘
//! ```
//!
//! `advance` is a pure function of the message and an evidence snapshot.
//! Side effects are returned as an [`Effect`] for the scheduler to run.

use super::config::DeliveryConfig;
use super::evidence::{DeliveryOutcome, Evidence};
use super::message::{FailureReason, FailureRecord, Message, MessageStatus, Trigger};
use crate::error::{DeliveryError, DeliveryResult};
use ks_02_liveness_monitor::LivenessVerdict;
use shared_types::{ErrorCategory, Timestamp};

/// Work the scheduler performs after persisting a transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Effect {
    /// Issue verification requests for the message subject.
    RequestVerification { round: u32, only_expired: bool },
    /// Resolve content and send the delivery notice.
    Deliver { attempt: u32 },
    /// The message is terminal; close out its ledger subject.
    ArchiveVerification,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transition {
    pub message: Message,
    pub effect: Option<Effect>,
    /// False when the message is exactly as it was handed in.
    pub changed: bool,
}

pub struct DeliveryStateMachine {
    config: DeliveryConfig,
}

impl DeliveryStateMachine {
    pub fn new(config: DeliveryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DeliveryConfig {
        &self.config
    }

    fn rejected(message: &Message, attempted: &str) -> DeliveryError {
        DeliveryError::InvalidStateTransition {
            message_id: message.id,
            from: message.status,
            attempted: attempted.to_string(),
        }
    }

    /// Structural trigger checks. Verifier eligibility needs the contact
    /// registry and is checked by the caller.
    pub fn validate_trigger(trigger: &Trigger) -> DeliveryResult<()> {
        if let Trigger::Event {
            event_label,
            required_confirmations,
            verifier_ids,
        } = trigger
        {
            if event_label.trim().is_empty() {
                return Err(DeliveryError::InvalidTrigger {
                    reason: "event label is empty".into(),
                });
            }
            if verifier_ids.is_empty() {
                return Err(DeliveryError::InvalidTrigger {
                    reason: "event trigger names no verifiers".into(),
                });
            }
            let required = *required_confirmations as usize;
            if required == 0 || required > verifier_ids.len() {
                return Err(DeliveryError::InvalidTrigger {
                    reason: format!(
                        "required confirmations {required} must be between 1 and {}",
                        verifier_ids.len()
                    ),
                });
            }
        }
        Ok(())
    }

    /// `Draft -> Scheduled`.
    pub fn finalize(
        &self,
        message: &Message,
        trigger: Trigger,
        now: Timestamp,
    ) -> DeliveryResult<Message> {
        if message.status != MessageStatus::Draft {
            return Err(Self::rejected(message, "finalize"));
        }
        if message
            .content_ref
            .as_ref()
            .map_or(true, |r| r.as_str().trim().is_empty())
        {
            return Err(DeliveryError::MissingContentRef {
                message_id: message.id,
            });
        }
        if !message.recipient.has_plausible_email() {
            return Err(DeliveryError::InvalidMessage {
                reason: format!("'{}' is not an e-mail address", message.recipient.email),
            });
        }
        Self::validate_trigger(&trigger)?;

        let mut next = message.clone();
        next.trigger = Some(trigger);
        next.status = MessageStatus::Scheduled;
        next.updated_at = now;
        Ok(next)
    }

    /// Owner cancellation. `Processing` is never interrupted.
    pub fn cancel(&self, message: &Message, now: Timestamp) -> DeliveryResult<Transition> {
        let allowed = match message.status {
            MessageStatus::Draft | MessageStatus::Scheduled | MessageStatus::AwaitingVerification => {
                true
            }
            MessageStatus::Failed => !message.is_terminal(),
            MessageStatus::Processing | MessageStatus::Delivered | MessageStatus::Cancelled => false,
        };
        if !allowed {
            return Err(Self::rejected(message, "cancel"));
        }

        let mut next = message.clone();
        next.status = MessageStatus::Cancelled;
        next.retry_at = None;
        next.updated_at = now;
        let effect = matches!(message.trigger, Some(Trigger::Event { .. }))
            .then_some(Effect::ArchiveVerification);
        Ok(Transition {
            message: next,
            effect,
            changed: true,
        })
    }

    /// Apply `evidence` to `message`.
    ///
    /// The same message and evidence always give the same transition, and a
    /// delivery outcome is applied only to the attempt it belongs to.
    pub fn advance(&self, message: &Message, evidence: &Evidence) -> DeliveryResult<Transition> {
        if message.status == MessageStatus::Draft || message.is_terminal() {
            return Err(Self::rejected(message, "advance"));
        }
        let Some(trigger) = message.trigger.as_ref() else {
            return Err(Self::rejected(message, "advance without trigger"));
        };

        let mut next = message.clone();
        let effect = match message.status {
            MessageStatus::Scheduled => self.evaluate_scheduled(&mut next, trigger, evidence),
            MessageStatus::AwaitingVerification => {
                if matches!(trigger, Trigger::Date { .. }) {
                    return Err(Self::rejected(message, "date trigger awaiting verification"));
                }
                self.evaluate_awaiting(&mut next, trigger, evidence)
            }
            MessageStatus::Processing => self.evaluate_processing(&mut next, evidence),
            MessageStatus::Failed => Self::evaluate_retry(&mut next, evidence.now),
            MessageStatus::Draft | MessageStatus::Delivered | MessageStatus::Cancelled => {
                return Err(Self::rejected(message, "advance"))
            }
        };

        let changed = next != *message;
        if changed {
            next.updated_at = evidence.now;
        }
        Ok(Transition {
            message: next,
            effect,
            changed,
        })
    }

    fn start_processing(next: &mut Message) -> Option<Effect> {
        next.status = MessageStatus::Processing;
        next.retry_at = None;
        Some(Effect::Deliver {
            attempt: next.attempts + 1,
        })
    }

    fn evaluate_scheduled(
        &self,
        next: &mut Message,
        trigger: &Trigger,
        evidence: &Evidence,
    ) -> Option<Effect> {
        match trigger {
            Trigger::Date { deliver_at } if evidence.now >= *deliver_at => {
                Self::start_processing(next)
            }
            Trigger::Date { .. } => None,
            Trigger::Event { .. } => match &evidence.quorum {
                Some(q) if q.satisfied => Self::start_processing(next),
                Some(q) if q.vetoed => self.fail_verification(
                    next,
                    FailureReason::Vetoed,
                    format!("{} verifier(s) denied", q.denied),
                    evidence.now,
                ),
                Some(_) => {
                    next.status = MessageStatus::AwaitingVerification;
                    next.verification_rounds = next.verification_rounds.max(1);
                    Some(Effect::RequestVerification {
                        round: next.verification_rounds,
                        only_expired: false,
                    })
                }
                None => None,
            },
            Trigger::Posthumous => match &evidence.liveness {
                Some(LivenessVerdict::Deceased { .. }) => Self::start_processing(next),
                Some(LivenessVerdict::Escalated { .. }) => {
                    next.status = MessageStatus::AwaitingVerification;
                    None
                }
                _ => None,
            },
        }
    }

    fn evaluate_awaiting(
        &self,
        next: &mut Message,
        trigger: &Trigger,
        evidence: &Evidence,
    ) -> Option<Effect> {
        match trigger {
            Trigger::Event { .. } => match &evidence.quorum {
                Some(q) if q.satisfied => Self::start_processing(next),
                Some(q) if q.vetoed => self.fail_verification(
                    next,
                    FailureReason::Vetoed,
                    format!("{} verifier(s) denied", q.denied),
                    evidence.now,
                ),
                // Requests were never issued or were archived underneath us.
                Some(q) if q.total() == 0 => Some(Effect::RequestVerification {
                    round: next.verification_rounds.max(1),
                    only_expired: false,
                }),
                Some(q) if !q.window_open => self.fail_verification(
                    next,
                    FailureReason::VerificationExpired,
                    format!(
                        "verification window closed with {} of {} confirmations",
                        q.confirmed, q.required
                    ),
                    evidence.now,
                ),
                _ => None,
            },
            Trigger::Posthumous => match &evidence.liveness {
                Some(LivenessVerdict::Deceased { .. }) => Self::start_processing(next),
                Some(LivenessVerdict::Escalated { .. }) | None => None,
                // Escalation stood down: wait for the next one.
                Some(_) => {
                    next.status = MessageStatus::Scheduled;
                    None
                }
            },
            Trigger::Date { .. } => None,
        }
    }

    fn fail_verification(
        &self,
        next: &mut Message,
        reason: FailureReason,
        detail: String,
        now: Timestamp,
    ) -> Option<Effect> {
        let retryable = reason == FailureReason::VerificationExpired
            && next.verification_rounds < self.config.max_verification_rounds;
        next.status = MessageStatus::Failed;
        next.last_failure = Some(FailureRecord {
            reason,
            detail,
            at: now,
        });
        if retryable {
            next.retry_at = Some(now);
            None
        } else {
            next.retry_at = None;
            Some(Effect::ArchiveVerification)
        }
    }

    fn evaluate_processing(&self, next: &mut Message, evidence: &Evidence) -> Option<Effect> {
        let expected = next.attempts + 1;
        match &evidence.delivery {
            // Found mid-flight (lease reclaimed after a crash): resume.
            None => Some(Effect::Deliver { attempt: expected }),
            Some(outcome) if outcome.attempt() != expected => None,
            Some(DeliveryOutcome::Acknowledged { .. }) => {
                next.status = MessageStatus::Delivered;
                next.delivered_at = Some(evidence.now);
                next.retry_at = None;
                Some(Effect::ArchiveVerification)
            }
            Some(DeliveryOutcome::Failed { reason, detail, .. }) => {
                next.attempts = expected;
                next.status = MessageStatus::Failed;
                next.last_failure = Some(FailureRecord {
                    reason: *reason,
                    detail: detail.clone(),
                    at: evidence.now,
                });
                let policy = self.config.retry_policy();
                let retryable = reason.category() == ErrorCategory::Transient
                    && policy.allows_another(next.attempts);
                if retryable {
                    let delay = policy.delay_for_attempt(next.attempts);
                    let delay = chrono::Duration::milliseconds(
                        i64::try_from(delay.as_millis()).unwrap_or(i64::MAX),
                    );
                    next.retry_at = Some(evidence.now + delay);
                    None
                } else {
                    next.retry_at = None;
                    Some(Effect::ArchiveVerification)
                }
            }
        }
    }

    fn evaluate_retry(next: &mut Message, now: Timestamp) -> Option<Effect> {
        match next.retry_at {
            Some(retry_at) if now >= retry_at => {}
            _ => return None,
        }
        next.retry_at = None;
        match next.last_failure.as_ref().map(|f| f.reason) {
            Some(FailureReason::VerificationExpired) => {
                next.status = MessageStatus::AwaitingVerification;
                next.verification_rounds += 1;
                Some(Effect::RequestVerification {
                    round: next.verification_rounds,
                    only_expired: true,
                })
            }
            _ => {
                next.status = MessageStatus::Scheduled;
                None
            }
        }
    }
}
