//! Domain layer for the Liveness Monitor

pub mod checkin;
pub mod config;
pub mod verdict;

pub use checkin::{CheckIn, CheckInFrequency, LivenessState};
pub use config::MonitorConfig;
pub use verdict::LivenessVerdict;
