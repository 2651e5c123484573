//! # ks-02-liveness-monitor
//!
//! Dead-man's-switch for posthumous delivery.
//!
//! Each enrolled owner has one `CheckIn` record. The owner is prompted
//! ahead of every due date; a period that passes without a response is a
//! miss. Once misses reach the threshold the owner enters
//! `EscalatedLivenessReview` and every accepted trusted contact is asked
//! to confirm or deny the owner's passing.
//!
//! ```text
//! Monitoring ──missed >= threshold──→ EscalatedLivenessReview ──quorum──→ ConfirmedDeceased
//!     ↑                                   │
//!     └──── check-in / window closed ─────┘
//! ```
//!
//! A valid check-in at any point before the owner is confirmed deceased
//! cancels the escalation and invalidates every outstanding verifier
//! token. Prompt delivery failures are retried with backoff and never
//! count as a miss.

pub mod adapters;
pub mod domain;
pub mod error;
pub mod metrics;
pub mod ports;
pub mod service;

pub use adapters::KvCheckInRepository;
pub use domain::{CheckIn, CheckInFrequency, LivenessState, LivenessVerdict, MonitorConfig};
pub use error::{MonitorError, MonitorResult};
pub use ports::{CheckInRepository, CheckInSchedule, DeadMansSwitchApi, MonitorSweep, TickOutcome};
pub use service::DeadMansSwitchMonitor;
