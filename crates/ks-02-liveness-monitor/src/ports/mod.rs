//! Ports layer (hexagonal architecture)

pub mod inbound;
pub mod outbound;

pub use inbound::{CheckInSchedule, DeadMansSwitchApi, MonitorSweep, TickOutcome};
pub use outbound::CheckInRepository;
