//! Scheduler domain: configuration, leases, tick reports.

pub mod config;
pub mod lease;
pub mod report;

pub use config::SchedulerConfig;
pub use lease::{LeaseManager, LeaseStats, LeaseToken};
pub use report::{DriverPass, TickReport};
pub(crate) use report::Evaluation;
