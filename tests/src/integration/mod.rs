//! Cross-subsystem scenarios.

pub mod harness;

mod delivery_guarantees;
mod liveness;
mod persistence;
mod verification;
