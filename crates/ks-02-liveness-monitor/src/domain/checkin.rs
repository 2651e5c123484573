//! Per-owner check-in record and its escalation sub-state.

use chrono::{Duration, Months};
use serde::{Deserialize, Serialize};
use shared_types::{OwnerId, Timestamp, VerificationToken};
use std::fmt;

/// Upper bound on missed periods counted in one evaluation.
const MAX_CATCH_UP_PERIODS: u32 = 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CheckInFrequency {
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    Yearly,
}

impl CheckInFrequency {
    /// `from` plus one period. Calendar months are used where they apply.
    pub fn next_after(self, from: Timestamp) -> Timestamp {
        let months = match self {
            CheckInFrequency::Daily => return from + Duration::days(1),
            CheckInFrequency::Weekly => return from + Duration::weeks(1),
            CheckInFrequency::Monthly => 1,
            CheckInFrequency::Quarterly => 3,
            CheckInFrequency::Yearly => 12,
        };
        from.checked_add_months(Months::new(months))
            .unwrap_or_else(|| from + Duration::days(30 * i64::from(months)))
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "daily" => Some(CheckInFrequency::Daily),
            "weekly" => Some(CheckInFrequency::Weekly),
            "monthly" => Some(CheckInFrequency::Monthly),
            "quarterly" => Some(CheckInFrequency::Quarterly),
            "yearly" => Some(CheckInFrequency::Yearly),
            _ => None,
        }
    }
}

impl fmt::Display for CheckInFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CheckInFrequency::Daily => "daily",
            CheckInFrequency::Weekly => "weekly",
            CheckInFrequency::Monthly => "monthly",
            CheckInFrequency::Quarterly => "quarterly",
            CheckInFrequency::Yearly => "yearly",
        };
        f.write_str(s)
    }
}

/// Liveness sub-state of an enrolled owner.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LivenessState {
    Monitoring,
    EscalatedLivenessReview {
        started_at: Timestamp,
        window_closes_at: Timestamp,
    },
    /// Terminal.
    ConfirmedDeceased { at: Timestamp },
}

impl LivenessState {
    pub fn is_escalated(&self) -> bool {
        matches!(self, LivenessState::EscalatedLivenessReview { .. })
    }

    pub fn is_deceased(&self) -> bool {
        matches!(self, LivenessState::ConfirmedDeceased { .. })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckIn {
    pub owner: OwnerId,
    pub frequency: CheckInFrequency,
    pub last_confirmed_at: Timestamp,
    pub next_due_at: Timestamp,
    pub missed_count: u32,
    /// Response token for the current period. Rotated on every confirmation.
    pub token: VerificationToken,
    /// `next_due_at` the last prompt was sent for.
    pub prompted_for: Option<Timestamp>,
    pub state: LivenessState,
    pub enrolled_at: Timestamp,
    pub updated_at: Timestamp,
    pub revision: u64,
}

impl CheckIn {
    pub fn enroll(owner: OwnerId, frequency: CheckInFrequency, now: Timestamp) -> Self {
        Self {
            owner,
            frequency,
            last_confirmed_at: now,
            next_due_at: frequency.next_after(now),
            missed_count: 0,
            token: VerificationToken::generate(),
            prompted_for: None,
            state: LivenessState::Monitoring,
            enrolled_at: now,
            updated_at: now,
            revision: 0,
        }
    }

    /// When the prompt for the current period goes out.
    pub fn prompt_at(&self, reminder_lead: Duration) -> Timestamp {
        self.next_due_at - reminder_lead
    }

    pub fn needs_prompt(&self, now: Timestamp, reminder_lead: Duration) -> bool {
        self.state == LivenessState::Monitoring
            && self.prompted_for != Some(self.next_due_at)
            && now >= self.prompt_at(reminder_lead)
    }

    pub fn is_overdue(&self, now: Timestamp) -> bool {
        now > self.next_due_at
    }

    /// Count every period that elapsed without a response and move
    /// `next_due_at` past `now`. Returns how many were added.
    pub fn register_missed(&mut self, now: Timestamp) -> u32 {
        let mut added = 0;
        while self.is_overdue(now) && added < MAX_CATCH_UP_PERIODS {
            self.missed_count += 1;
            self.next_due_at = self.frequency.next_after(self.next_due_at);
            added += 1;
        }
        if added > 0 {
            self.updated_at = now;
        }
        added
    }

    /// A confirmed check-in: back to plain monitoring with a fresh period.
    pub fn confirm(&mut self, now: Timestamp) {
        self.last_confirmed_at = now;
        self.missed_count = 0;
        self.next_due_at = self.frequency.next_after(now);
        self.token = VerificationToken::generate();
        self.prompted_for = None;
        self.state = LivenessState::Monitoring;
        self.updated_at = now;
    }

    /// False alarm: the escalation closed without quorum.
    pub fn stand_down(&mut self, now: Timestamp) {
        self.missed_count = 0;
        self.next_due_at = self.frequency.next_after(now);
        self.prompted_for = None;
        self.state = LivenessState::Monitoring;
        self.updated_at = now;
    }

    /// Instant the due-index should surface this record again, if ever.
    pub fn attention_at(&self, reminder_lead: Duration) -> Option<Timestamp> {
        match self.state {
            LivenessState::Monitoring if self.prompted_for == Some(self.next_due_at) => {
                Some(self.next_due_at)
            }
            LivenessState::Monitoring => Some(self.prompt_at(reminder_lead)),
            // Responses can complete quorum at any time.
            LivenessState::EscalatedLivenessReview { started_at, .. } => Some(started_at),
            LivenessState::ConfirmedDeceased { .. } => None,
        }
    }
}
