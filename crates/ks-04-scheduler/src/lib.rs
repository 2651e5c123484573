//! # ks-04-scheduler
//!
//! The only component that drives message state transitions.
//!
//! ## Guarantees
//!
//! | Property | Mechanism |
//! |----------|-----------|
//! | Each due message evaluated at least once per tick | status scan over the `(status, created_at)` index |
//! | No two ticks advance the same message | per-message lease, acquire is check-and-set |
//! | Crashed worker does not strand a message | lease TTL plus reaper; `advance` resumes `Processing` |
//! | Cancel races a tick | message reloaded under the lease before evaluation |
//! | Deterministic tie-break | candidates ordered by `created_at`, then id |
//! | One slow message does not stall the scan | bounded worker pool, I/O under timeout |
//!
//! The [`ClockDriver`] runs the liveness sweep, the ledger expiry sweep and
//! then [`Scheduler`]'s tick at a fixed cadence.

pub mod domain;
pub mod driver;
pub mod error;
pub mod metrics;
pub mod ports;
pub mod service;

pub use domain::{DriverPass, LeaseManager, LeaseStats, LeaseToken, SchedulerConfig, TickReport};
pub use driver::{ClockDriver, PassObserver};
pub use error::{SchedulerError, SchedulerResult};
pub use ports::SchedulerApi;
pub use service::Scheduler;
