//! Scheduler service.
//!
//! ```text
//! tick(now)
//!   ├─ reap expired leases
//!   ├─ scan Scheduled / AwaitingVerification / Processing / Failed(retry due)
//!   │    ascending created_at
//!   └─ per message, on the worker pool:
//!        lease ─→ reload ─→ evidence ─→ advance ─→ save (CAS) ─→ effect ─┐
//!                              ↑                                          │
//!                              └──────── delivery outcome ───────────────┘
//! ```
//!
//! The scheduler never mutates ledger or monitor state beyond the
//! single-writer calls the state machine asks for (issue, archive).

use crate::domain::{Evaluation, LeaseManager, SchedulerConfig, TickReport};
use crate::error::{SchedulerError, SchedulerResult};
use crate::metrics;
use crate::ports::SchedulerApi;
use async_trait::async_trait;
use ks_01_verification_ledger::{IssueOutcome, VerificationLedgerApi};
use ks_02_liveness_monitor::DeadMansSwitchApi;
use ks_03_delivery::{
    delivery_key, DeliveryExecutor, DeliveryOutcome, DeliveryStateMachine, Effect, Evidence,
    Message, MessageRepository, MessageStatus, Trigger,
};
use shared_bus::{EngineEvent, EventPublisher};
use shared_types::{
    retry_with_backoff, ContactId, ErrorCategory, MessageId, Notifier, NotifierError, RetryPolicy,
    Timestamp,
};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Upper bound on advance/effect rounds for one message in one tick.
const MAX_STEPS: usize = 6;

const SCANNED: [MessageStatus; 4] = [
    MessageStatus::Scheduled,
    MessageStatus::AwaitingVerification,
    MessageStatus::Processing,
    MessageStatus::Failed,
];

pub struct Scheduler {
    worker: Arc<Worker>,
    permits: Arc<Semaphore>,
}

struct Worker {
    repo: Arc<dyn MessageRepository>,
    machine: Arc<DeliveryStateMachine>,
    executor: Arc<DeliveryExecutor>,
    ledger: Arc<dyn VerificationLedgerApi>,
    monitor: Arc<dyn DeadMansSwitchApi>,
    notifier: Arc<dyn Notifier>,
    publisher: Arc<dyn EventPublisher>,
    leases: LeaseManager,
    config: SchedulerConfig,
}

impl Scheduler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        repo: Arc<dyn MessageRepository>,
        machine: Arc<DeliveryStateMachine>,
        executor: Arc<DeliveryExecutor>,
        ledger: Arc<dyn VerificationLedgerApi>,
        monitor: Arc<dyn DeadMansSwitchApi>,
        notifier: Arc<dyn Notifier>,
        publisher: Arc<dyn EventPublisher>,
        config: SchedulerConfig,
    ) -> Self {
        let permits = Arc::new(Semaphore::new(config.worker_pool_size.max(1)));
        let leases = LeaseManager::new(config.lease_ttl_chrono());
        Self {
            worker: Arc::new(Worker {
                repo,
                machine,
                executor,
                ledger,
                monitor,
                notifier,
                publisher,
                leases,
                config,
            }),
            permits,
        }
    }

    pub fn leases(&self) -> &LeaseManager {
        &self.worker.leases
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.worker.config
    }
}

#[async_trait]
impl SchedulerApi for Scheduler {
    async fn tick(&self, now: Timestamp) -> SchedulerResult<TickReport> {
        let started = Instant::now();
        self.worker.leases.reap_expired(now);

        let candidates = self.worker.candidates(now)?;
        let mut report = TickReport {
            considered: candidates.len(),
            ..TickReport::default()
        };

        let mut workers = JoinSet::new();
        for id in candidates {
            let permit = Arc::clone(&self.permits)
                .acquire_owned()
                .await
                .map_err(|e| SchedulerError::Worker(e.to_string()))?;
            let worker = Arc::clone(&self.worker);
            workers.spawn(async move {
                let _permit = permit;
                worker.evaluate(id, now).await
            });
        }

        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(evaluation) => report.absorb(&evaluation),
                Err(e) => {
                    error!(error = %e, "[ks-04] worker task failed");
                    report.errors += 1;
                }
            }
        }

        metrics::record_tick(started.elapsed().as_secs_f64());
        if report.considered > 0 {
            info!(
                considered = report.considered,
                evaluated = report.evaluated,
                skipped_leased = report.skipped_leased,
                delivered = report.delivered,
                failed = report.failed,
                errors = report.errors,
                "[ks-04] tick complete"
            );
        }
        Ok(report)
    }
}

impl Worker {
    fn is_due(message: &Message, now: Timestamp) -> bool {
        match message.status {
            MessageStatus::Scheduled => match &message.trigger {
                Some(Trigger::Date { deliver_at }) => now >= *deliver_at,
                _ => true,
            },
            MessageStatus::AwaitingVerification | MessageStatus::Processing => true,
            MessageStatus::Failed => message.retry_at.is_some_and(|at| now >= at),
            MessageStatus::Draft | MessageStatus::Delivered | MessageStatus::Cancelled => false,
        }
    }

    fn candidates(&self, now: Timestamp) -> SchedulerResult<Vec<MessageId>> {
        let mut seen = HashSet::new();
        let mut due = Vec::new();
        for status in SCANNED {
            for message in self.repo.by_status(status)? {
                if Self::is_due(&message, now) && seen.insert(message.id) {
                    due.push(message);
                }
            }
        }
        due.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(due.into_iter().map(|m| m.id).collect())
    }

    async fn evaluate(&self, id: MessageId, now: Timestamp) -> Evaluation {
        let Some(token) = self.leases.acquire(&id, now) else {
            metrics::record_lease_contention();
            return Evaluation::SkippedLeased;
        };
        metrics::set_leases_held(self.leases.held_count());

        let result = self.drive(&id, now).await;
        self.leases.release(&id, token);
        metrics::set_leases_held(self.leases.held_count());

        match result {
            Ok(evaluation) => evaluation,
            Err(e) => {
                match e.category() {
                    ErrorCategory::Consistency => {
                        error!(message_id = %id, error = %e, "[ks-04] message left untouched")
                    }
                    ErrorCategory::Transient => {
                        warn!(message_id = %id, error = %e, "[ks-04] evaluation failed, next tick retries")
                    }
                    ErrorCategory::Validation => {
                        debug!(message_id = %id, error = %e, "[ks-04] evaluation rejected")
                    }
                }
                Evaluation::Errored
            }
        }
    }

    /// Advance one leased message until it settles for this tick.
    async fn drive(&self, id: &MessageId, now: Timestamp) -> SchedulerResult<Evaluation> {
        // Reload under the lease: a cancel may have landed since the scan.
        let Some(mut message) = self.repo.get(id)? else {
            return Ok(Evaluation::Gone);
        };
        if message.status == MessageStatus::Draft || message.is_terminal() {
            debug!(message_id = %id, status = %message.status, "[ks-04] no longer eligible");
            return Ok(Evaluation::Gone);
        }
        metrics::record_evaluated();

        let mut delivered = false;
        let mut failed = false;
        let mut outcome: Option<DeliveryOutcome> = None;

        for _ in 0..MAX_STEPS {
            let evidence = self.evidence(&message, now, outcome.take())?;
            let transition = self.machine.advance(&message, &evidence)?;

            if transition.changed {
                let from = message.status;
                message = self.repo.save(&transition.message)?;
                self.announce(from, &message).await;
                delivered |= message.status == MessageStatus::Delivered;
                failed |= message.status == MessageStatus::Failed;
            }

            match transition.effect {
                None if transition.changed => continue,
                None => break,
                Some(Effect::Deliver { attempt }) => {
                    outcome = Some(self.executor.execute(&message, attempt, now).await?);
                }
                Some(Effect::RequestVerification {
                    round,
                    only_expired,
                }) => {
                    self.request_verification(&message, round, only_expired, now)
                        .await?;
                    break;
                }
                Some(Effect::ArchiveVerification) => {
                    self.archive(&message, now).await;
                    break;
                }
            }
        }

        Ok(Evaluation::Settled { delivered, failed })
    }

    /// Read what the trigger needs. Reads only; nothing here writes.
    fn evidence(
        &self,
        message: &Message,
        now: Timestamp,
        outcome: Option<DeliveryOutcome>,
    ) -> SchedulerResult<Evidence> {
        let mut evidence = Evidence::at(now);
        if let Some(outcome) = outcome {
            evidence = evidence.with_delivery(outcome);
        }
        if !matches!(
            message.status,
            MessageStatus::Scheduled | MessageStatus::AwaitingVerification
        ) {
            return Ok(evidence);
        }
        match &message.trigger {
            Some(Trigger::Event {
                required_confirmations,
                ..
            }) => {
                let policy = self.machine.config().event_policy(*required_confirmations);
                let quorum = self
                    .ledger
                    .quorum_status(&message.subject(), &policy, now)?;
                evidence = evidence.with_quorum(quorum);
            }
            Some(Trigger::Posthumous) => {
                let verdict = self.monitor.liveness_verdict(&message.owner, now)?;
                evidence = evidence.with_liveness(verdict);
            }
            Some(Trigger::Date { .. }) | None => {}
        }
        Ok(evidence)
    }

    async fn announce(&self, from: MessageStatus, message: &Message) {
        if from != message.status {
            info!(
                message_id = %message.id,
                from = %from,
                to = %message.status,
                attempts = message.attempts,
                "[ks-04] message transitioned"
            );
            self.publisher
                .publish(EngineEvent::MessageTransitioned {
                    message_id: message.id,
                    from: from.as_str().to_string(),
                    to: message.status.as_str().to_string(),
                })
                .await;
        }

        match message.status {
            MessageStatus::Delivered => {
                let attempt = message.attempts + 1;
                metrics::record_delivered();
                self.publisher
                    .publish(EngineEvent::MessageDelivered {
                        message_id: message.id,
                        attempt,
                        delivery_key: delivery_key(&message.id, attempt),
                    })
                    .await;
            }
            MessageStatus::Failed => {
                let Some(failure) = message.last_failure.as_ref() else {
                    return;
                };
                let terminal = message.is_terminal();
                metrics::record_failed(terminal);
                warn!(
                    message_id = %message.id,
                    reason = %failure.reason,
                    terminal,
                    retry_at = ?message.retry_at,
                    "[ks-04] message failed"
                );
                self.publisher
                    .publish(EngineEvent::MessageFailed {
                        message_id: message.id,
                        category: failure.reason.category(),
                        detail: failure.detail.clone(),
                        terminal,
                        retry_at: message.retry_at,
                    })
                    .await;
            }
            _ => {}
        }
    }

    /// Notify newly issued verifiers concurrently. Sends still running when
    /// the budget runs out are detached so the lease is released in time.
    async fn notify_verifiers(&self, message_id: &MessageId, outcomes: Vec<IssueOutcome>) {
        let mut sends = JoinSet::new();
        for outcome in outcomes {
            let notifier = Arc::clone(&self.notifier);
            let retry = self.config.verifier_retry;
            let io_timeout = self.config.io_timeout;
            sends.spawn(notify_verifier(notifier, retry, io_timeout, outcome));
        }

        let budget = self.config.notify_budget();
        let drained = tokio::time::timeout(budget, async {
            while sends.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            warn!(
                message_id = %message_id,
                outstanding = sends.len(),
                budget_secs = budget.as_secs(),
                "[ks-04] verifier notifications outlived their budget, finishing in background"
            );
            sends.detach_all();
        }
    }

    async fn request_verification(
        &self,
        message: &Message,
        round: u32,
        only_expired: bool,
        now: Timestamp,
    ) -> SchedulerResult<()> {
        let Some(Trigger::Event { verifier_ids, .. }) = &message.trigger else {
            return Ok(());
        };
        let subject = message.subject();
        let targets: Vec<ContactId> = if only_expired {
            self.ledger
                .expired_verifiers(&subject, now)?
                .into_iter()
                .filter(|id| verifier_ids.contains(id))
                .collect()
        } else {
            verifier_ids.iter().copied().collect()
        };
        let expires_at = now + self.machine.config().event_verification_window;

        let mut issued = 0usize;
        let mut fresh = Vec::new();
        for verifier in targets {
            match self
                .ledger
                .issue(subject.clone(), verifier, expires_at, now)
                .await
            {
                Ok(outcome) => {
                    issued += 1;
                    if outcome.newly_issued {
                        fresh.push(outcome);
                    }
                }
                Err(e) if e.category() == ErrorCategory::Validation => {
                    warn!(message_id = %message.id, contact_id = %verifier, error = %e, "[ks-04] verifier skipped");
                }
                Err(e) => return Err(e.into()),
            }
        }
        let notified = fresh.len();
        self.notify_verifiers(&message.id, fresh).await;

        info!(
            message_id = %message.id,
            round,
            only_expired,
            issued,
            notified,
            "[ks-04] verification requested"
        );
        Ok(())
    }

    async fn archive(&self, message: &Message, now: Timestamp) {
        if !matches!(message.trigger, Some(Trigger::Event { .. })) {
            return;
        }
        if let Err(e) = self.ledger.archive_subject(&message.subject(), now).await {
            warn!(message_id = %message.id, error = %e, "[ks-04] could not archive verification subject");
        }
    }
}

async fn notify_verifier(
    notifier: Arc<dyn Notifier>,
    retry: RetryPolicy,
    io_timeout: std::time::Duration,
    outcome: IssueOutcome,
) {
    let email = outcome.contact_email.as_str();
    let token = &outcome.token;
    let expires_at = outcome.expires_at;
    let notifier = &notifier;
    let sent = retry_with_backoff(
        &retry,
        io_timeout,
        NotifierError::is_retryable,
        || NotifierError::Unavailable("verification request timed out".into()),
        move || notifier.send_verification_request(email, token, expires_at),
    )
    .await;
    if let Err((e, attempts)) = sent {
        warn!(
            request_id = %outcome.request_id,
            attempts,
            error = %e,
            "[ks-04] verification request undeliverable"
        );
    }
}
