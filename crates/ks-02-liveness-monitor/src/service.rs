//! Dead-Man's-Switch Monitor service
//!
//! Owns every `CheckIn` record. Writes are compare-and-set on the record
//! revision, so a check-in that lands while a tick is awaiting the
//! notifier wins and the tick's stale write is dropped.
//!
//! Escalation requests go through the Verification Ledger's own API; the
//! monitor never writes ledger state directly.
//!
//! `tick_due` runs one task per due owner on a bounded pool, so a slow
//! prompt for one owner never holds up another.

use crate::domain::{CheckIn, CheckInFrequency, LivenessState, LivenessVerdict, MonitorConfig};
use crate::error::{MonitorError, MonitorResult};
use crate::metrics;
use crate::ports::inbound::{CheckInSchedule, DeadMansSwitchApi, MonitorSweep, TickOutcome};
use crate::ports::outbound::CheckInRepository;
use async_trait::async_trait;
use ks_01_verification_ledger::{
    TrustedContactRegistry, VerificationLedgerApi, VerificationSubject,
};
use shared_bus::{EngineEvent, EventPublisher};
use shared_types::{
    retry_with_backoff, ErrorCategory, Notifier, NotifierError, OwnerId, Timestamp,
    VerificationToken,
};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Saves attempted by one check-in before a revision conflict is returned.
const CHECK_IN_SAVE_ATTEMPTS: usize = 3;

pub struct DeadMansSwitchMonitor {
    core: Arc<Core>,
    permits: Arc<Semaphore>,
}

struct Core {
    repo: Arc<dyn CheckInRepository>,
    ledger: Arc<dyn VerificationLedgerApi>,
    contacts: Arc<dyn TrustedContactRegistry>,
    notifier: Arc<dyn Notifier>,
    publisher: Arc<dyn EventPublisher>,
    config: MonitorConfig,
}

impl DeadMansSwitchMonitor {
    pub fn new(
        repo: Arc<dyn CheckInRepository>,
        ledger: Arc<dyn VerificationLedgerApi>,
        contacts: Arc<dyn TrustedContactRegistry>,
        notifier: Arc<dyn Notifier>,
        publisher: Arc<dyn EventPublisher>,
        config: MonitorConfig,
    ) -> Self {
        let permits = Arc::new(Semaphore::new(config.worker_pool_size.max(1)));
        Self {
            core: Arc::new(Core {
                repo,
                ledger,
                contacts,
                notifier,
                publisher,
                config,
            }),
            permits,
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.core.config
    }
}

impl Core {
    fn load(&self, owner: &OwnerId) -> MonitorResult<CheckIn> {
        self.repo
            .get(owner)?
            .ok_or_else(|| MonitorError::NotEnrolled {
                owner: owner.clone(),
            })
    }

    fn save(&self, record: &CheckIn) -> MonitorResult<CheckIn> {
        self.repo.save(record, self.config.reminder_lead)
    }

    /// Save after an await point. A conflict means the owner acted in the
    /// meantime; their write stands and this tick becomes a no-op.
    fn save_after_io(&self, record: &CheckIn, outcome: TickOutcome) -> MonitorResult<TickOutcome> {
        match self.save(record) {
            Ok(_) => Ok(outcome),
            Err(MonitorError::RevisionConflict { owner, .. }) => {
                warn!(owner_id = %owner, "[ks-02] check-in changed during tick, dropping stale write");
                Ok(TickOutcome::Idle)
            }
            Err(e) => Err(e),
        }
    }

    fn subject(owner: &OwnerId) -> VerificationSubject {
        VerificationSubject::Owner(owner.clone())
    }

    async fn send_prompt(&self, owner: &OwnerId, due_at: Timestamp) -> Result<(), u32> {
        let notifier = &self.notifier;
        retry_with_backoff(
            &self.config.prompt_retry,
            self.config.io_timeout,
            NotifierError::is_retryable,
            || NotifierError::Unavailable("check-in prompt timed out".into()),
            move || notifier.send_check_in_prompt(owner, due_at),
        )
        .await
        .map_err(|(e, attempts)| {
            warn!(owner_id = %owner, attempts, error = %e, "[ks-02] check-in prompt undeliverable");
            attempts
        })
    }

    async fn notify_verifier(&self, email: &str, token: &VerificationToken, expires_at: Timestamp) {
        let notifier = &self.notifier;
        let sent = retry_with_backoff(
            &self.config.prompt_retry,
            self.config.io_timeout,
            NotifierError::is_retryable,
            || NotifierError::Unavailable("verification request timed out".into()),
            move || notifier.send_verification_request(email, token, expires_at),
        )
        .await;
        if let Err((e, attempts)) = sent {
            warn!(attempts, error = %e, "[ks-02] verification request undeliverable");
        }
    }

    /// Issue a request to every accepted contact. Returns how many hold one.
    async fn issue_requests(
        &self,
        owner: &OwnerId,
        window_closes_at: Timestamp,
        now: Timestamp,
    ) -> MonitorResult<usize> {
        let contacts = self.contacts.accepted_contacts(owner)?;
        if contacts.is_empty() {
            warn!(owner_id = %owner, "[ks-02] escalation has no accepted trusted contacts");
        }

        let mut issued = 0;
        for contact in contacts {
            match self
                .ledger
                .issue(Self::subject(owner), contact.id, window_closes_at, now)
                .await
            {
                Ok(outcome) => {
                    issued += 1;
                    if outcome.newly_issued {
                        self.notify_verifier(&outcome.contact_email, &outcome.token, outcome.expires_at)
                            .await;
                    }
                }
                Err(e) if e.category() == ErrorCategory::Validation => {
                    warn!(owner_id = %owner, contact_id = %contact.id, error = %e, "[ks-02] contact skipped");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(issued)
    }

    async fn escalate(&self, mut record: CheckIn, now: Timestamp) -> MonitorResult<TickOutcome> {
        let window_closes_at = now + self.config.escalation_window;
        record.state = LivenessState::EscalatedLivenessReview {
            started_at: now,
            window_closes_at,
        };
        record.updated_at = now;
        let record = self.save(&record)?;

        let verifiers = self.issue_requests(&record.owner, window_closes_at, now).await?;

        metrics::record_escalation_started();
        warn!(
            owner_id = %record.owner,
            missed_count = record.missed_count,
            verifiers,
            window_closes_at = %window_closes_at,
            "[ks-02] missed check-ins crossed threshold, escalating"
        );
        self.publisher
            .publish(EngineEvent::EscalationStarted {
                owner_id: record.owner.clone(),
                verifiers,
                window_closes_at,
            })
            .await;
        Ok(TickOutcome::EscalationStarted { verifiers })
    }

    async fn evaluate_escalation(
        &self,
        mut record: CheckIn,
        window_closes_at: Timestamp,
        now: Timestamp,
    ) -> MonitorResult<TickOutcome> {
        let subject = Self::subject(&record.owner);
        let quorum = self
            .ledger
            .quorum_status(&subject, &self.config.quorum_policy(), now)?;

        if quorum.satisfied {
            record.state = LivenessState::ConfirmedDeceased { at: now };
            record.updated_at = now;
            self.save(&record)?;

            metrics::record_confirmed_deceased();
            info!(
                owner_id = %record.owner,
                confirmed = quorum.confirmed,
                document_verified = quorum.document_verified,
                "[ks-02] posthumous quorum formed"
            );
            self.publisher
                .publish(EngineEvent::OwnerConfirmedDeceased {
                    owner_id: record.owner.clone(),
                    at: now,
                })
                .await;
            return Ok(TickOutcome::ConfirmedDeceased);
        }

        if quorum.vetoed || now > window_closes_at {
            let reason = if quorum.vetoed {
                "verifier denied"
            } else {
                "window closed without quorum"
            };
            self.ledger.archive_subject(&subject, now).await?;
            record.stand_down(now);
            self.save(&record)?;

            metrics::record_stood_down();
            info!(owner_id = %record.owner, reason, "[ks-02] escalation stood down, resuming monitoring");
            self.publisher
                .publish(EngineEvent::EscalationStoodDown {
                    owner_id: record.owner.clone(),
                    reason: reason.to_string(),
                })
                .await;
            return Ok(TickOutcome::StoodDown);
        }

        // Escalation saved but requests never issued (crash in between).
        if quorum.total() == 0 {
            self.issue_requests(&record.owner, window_closes_at, now).await?;
        }
        Ok(TickOutcome::AwaitingQuorum {
            progress: quorum.progress(),
        })
    }

    /// Apply a check-in. A conflicting write re-reads the record and applies
    /// the check-in on top of it, so an escalation archived here is always
    /// stood down in storage too.
    async fn accept_check_in(&self, mut record: CheckIn, now: Timestamp) -> MonitorResult<CheckIn> {
        let owner = record.owner.clone();
        let mut was_escalated = false;
        let mut attempt = 1;

        let saved = loop {
            if record.state.is_deceased() {
                return Err(MonitorError::AlreadyConfirmedDeceased { owner });
            }
            if record.state.is_escalated() {
                was_escalated = true;
                // Before the state flips, so no earlier confirmation survives.
                self.ledger
                    .archive_subject(&Self::subject(&owner), now)
                    .await?;
            }
            record.confirm(now);

            match self.save(&record) {
                Ok(saved) => break saved,
                Err(MonitorError::RevisionConflict { .. }) if attempt < CHECK_IN_SAVE_ATTEMPTS => {
                    debug!(owner_id = %owner, attempt, "[ks-02] check-in raced another write, reapplying");
                    attempt += 1;
                    record = self.load(&owner)?;
                }
                Err(e) => return Err(e),
            }
        };

        metrics::record_check_in();
        info!(
            owner_id = %saved.owner,
            next_due_at = %saved.next_due_at,
            cancelled_escalation = was_escalated,
            "[ks-02] check-in recorded"
        );
        if was_escalated {
            metrics::record_stood_down();
            self.publisher
                .publish(EngineEvent::EscalationStoodDown {
                    owner_id: saved.owner.clone(),
                    reason: "owner checked in".to_string(),
                })
                .await;
        }
        self.publisher
            .publish(EngineEvent::CheckInRecorded {
                owner_id: saved.owner.clone(),
                next_due_at: saved.next_due_at,
            })
            .await;
        Ok(saved)
    }

    async fn tick(&self, owner: &OwnerId, now: Timestamp) -> MonitorResult<TickOutcome> {
        let mut record = self.load(owner)?;

        match record.state {
            LivenessState::ConfirmedDeceased { .. } => Ok(TickOutcome::Idle),
            LivenessState::EscalatedLivenessReview {
                window_closes_at, ..
            } => self.evaluate_escalation(record, window_closes_at, now).await,
            LivenessState::Monitoring => {
                if record.is_overdue(now) {
                    let added = record.register_missed(now);
                    metrics::record_missed_check_ins(u64::from(added));
                    info!(
                        owner_id = %owner,
                        missed_count = record.missed_count,
                        "[ks-02] check-in missed"
                    );
                    if record.missed_count >= self.config.missed_threshold {
                        return self.escalate(record, now).await;
                    }
                    let missed_count = record.missed_count;
                    self.save(&record)?;
                    return Ok(TickOutcome::Missed { missed_count });
                }

                if record.needs_prompt(now, self.config.reminder_lead) {
                    let due_at = record.next_due_at;
                    let outcome = match self.send_prompt(owner, due_at).await {
                        Ok(()) => {
                            metrics::record_prompt("sent");
                            TickOutcome::Prompted
                        }
                        Err(attempts) => {
                            metrics::record_prompt("failed");
                            self.publisher
                                .publish(EngineEvent::CheckInPromptFailed {
                                    owner_id: owner.clone(),
                                    attempts,
                                })
                                .await;
                            TickOutcome::PromptFailed { attempts }
                        }
                    };
                    record.prompted_for = Some(due_at);
                    record.updated_at = now;
                    return self.save_after_io(&record, outcome);
                }

                Ok(TickOutcome::Idle)
            }
        }
    }
}

#[async_trait]
impl DeadMansSwitchApi for DeadMansSwitchMonitor {
    async fn enroll(
        &self,
        owner: &OwnerId,
        frequency: CheckInFrequency,
        now: Timestamp,
    ) -> MonitorResult<CheckIn> {
        if self.core.repo.get(owner)?.is_some() {
            return Err(MonitorError::AlreadyEnrolled {
                owner: owner.clone(),
            });
        }
        let record = self.core.save(&CheckIn::enroll(owner.clone(), frequency, now))?;
        info!(
            owner_id = %owner,
            frequency = %frequency,
            next_due_at = %record.next_due_at,
            "[ks-02] owner enrolled in check-ins"
        );
        Ok(record)
    }

    async fn schedule_next_check_in(&self, owner: &OwnerId) -> MonitorResult<CheckInSchedule> {
        let mut record = self.core.load(owner)?;
        if record.state.is_deceased() {
            return Err(MonitorError::AlreadyConfirmedDeceased {
                owner: owner.clone(),
            });
        }

        // Missed periods already moved the due date forward.
        if record.state == LivenessState::Monitoring && record.missed_count == 0 {
            let next_due_at = record.frequency.next_after(record.last_confirmed_at);
            if next_due_at != record.next_due_at {
                record.next_due_at = next_due_at;
                record.prompted_for = None;
                record = self.core.save(&record)?;
            }
        }

        let schedule = CheckInSchedule {
            next_due_at: record.next_due_at,
            prompt_at: record.prompt_at(self.core.config.reminder_lead),
        };
        debug!(
            owner_id = %owner,
            next_due_at = %schedule.next_due_at,
            prompt_at = %schedule.prompt_at,
            "[ks-02] next check-in scheduled"
        );
        Ok(schedule)
    }

    async fn record_check_in(
        &self,
        owner: &OwnerId,
        token: &VerificationToken,
        now: Timestamp,
    ) -> MonitorResult<CheckIn> {
        let record = self.core.load(owner)?;
        if record.state.is_deceased() {
            return Err(MonitorError::AlreadyConfirmedDeceased {
                owner: owner.clone(),
            });
        }
        if &record.token != token {
            debug!(owner_id = %owner, "[ks-02] stale check-in token rejected");
            return Err(MonitorError::StaleCheckInToken {
                owner: owner.clone(),
            });
        }
        self.core.accept_check_in(record, now).await
    }

    async fn record_check_in_by_token(
        &self,
        token: &VerificationToken,
        now: Timestamp,
    ) -> MonitorResult<CheckIn> {
        let record = self
            .core
            .repo
            .find_by_token(token)?
            .ok_or(MonitorError::UnknownCheckInToken)?;
        self.core.accept_check_in(record, now).await
    }

    async fn confirm_alive(&self, owner: &OwnerId, now: Timestamp) -> MonitorResult<CheckIn> {
        let record = self.core.load(owner)?;
        self.core.accept_check_in(record, now).await
    }

    async fn tick(&self, owner: &OwnerId, now: Timestamp) -> MonitorResult<TickOutcome> {
        self.core.tick(owner, now).await
    }

    async fn tick_due(&self, now: Timestamp) -> MonitorResult<MonitorSweep> {
        let owners = self.core.repo.due_owners(now)?;
        let mut sweep = MonitorSweep {
            evaluated: owners.len(),
            ..MonitorSweep::default()
        };

        let mut workers = JoinSet::new();
        for (position, owner) in owners.into_iter().enumerate() {
            let permit = Arc::clone(&self.permits)
                .acquire_owned()
                .await
                .map_err(|e| MonitorError::Worker(e.to_string()))?;
            let core = Arc::clone(&self.core);
            workers.spawn(async move {
                let _permit = permit;
                let result = core.tick(&owner, now).await;
                (position, owner, result)
            });
        }

        let mut settled = Vec::with_capacity(sweep.evaluated);
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok((position, owner, Ok(outcome))) => settled.push((position, owner, outcome)),
                Ok((_, owner, Err(e))) => {
                    sweep.errors += 1;
                    match e.category() {
                        ErrorCategory::Consistency => {
                            error!(owner_id = %owner, error = %e, "[ks-02] liveness tick failed")
                        }
                        _ => warn!(owner_id = %owner, error = %e, "[ks-02] liveness tick failed"),
                    }
                }
                Err(e) => {
                    sweep.errors += 1;
                    error!(error = %e, "[ks-02] liveness worker task failed");
                }
            }
        }
        // Report in due-index order regardless of completion order.
        settled.sort_by_key(|(position, ..)| *position);
        sweep.outcomes = settled
            .into_iter()
            .map(|(_, owner, outcome)| (owner, outcome))
            .collect();

        if sweep.evaluated > 0 {
            debug!(
                evaluated = sweep.evaluated,
                errors = sweep.errors,
                "[ks-02] liveness sweep complete"
            );
        }
        Ok(sweep)
    }

    fn liveness_verdict(&self, owner: &OwnerId, as_of: Timestamp) -> MonitorResult<LivenessVerdict> {
        let Some(record) = self.core.repo.get(owner)? else {
            return Ok(LivenessVerdict::Unenrolled);
        };
        Ok(match record.state {
            LivenessState::Monitoring => LivenessVerdict::Monitoring {
                next_due_at: record.next_due_at,
                missed_count: record.missed_count,
            },
            LivenessState::EscalatedLivenessReview {
                started_at,
                window_closes_at,
            } => LivenessVerdict::Escalated {
                started_at,
                window_closes_at,
                quorum: self.core.ledger.quorum_status(
                    &Core::subject(owner),
                    &self.core.config.quorum_policy(),
                    as_of,
                )?,
            },
            LivenessState::ConfirmedDeceased { at } => LivenessVerdict::Deceased { at },
        })
    }

    fn get_check_in(&self, owner: &OwnerId) -> MonitorResult<Option<CheckIn>> {
        self.core.repo.get(owner)
    }
}
