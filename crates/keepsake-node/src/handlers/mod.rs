//! # Event Handlers
//!
//! Long-running bus consumers spawned by the runtime.

pub mod audit;

pub use audit::AuditHandler;
