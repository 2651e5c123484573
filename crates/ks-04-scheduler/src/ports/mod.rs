//! Ports for the Scheduler.

pub mod inbound;

pub use inbound::SchedulerApi;
