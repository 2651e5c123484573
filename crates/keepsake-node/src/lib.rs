//! # Keepsake Node Library
//!
//! Runtime pieces of the Keepsake engine, exposed for the binary and for
//! embedding hosts.
//!
//! - `container/` - configuration and dependency injection
//! - `adapters/` - storage backends and the data directory lock
//! - `handlers/` - bus consumers (audit trail)
//! - `control` - owner-facing operations
//! - `runtime` - startup, background tasks, shutdown
//!
//! ```text
//!            EngineControl (owners, contacts)
//!                  │ inbound ports
//!   ┌──────────────┼─────────────────────────┐
//!   ↓              ↓                         ↓
//! ks-03 Delivery  ks-01 Ledger  ←──────  ks-02 Monitor
//!   ↑              ↑                         ↑
//!   └───── ks-04 Scheduler ←── ClockDriver ──┘
//!                  │
//!             Event Bus ──→ AuditHandler
//! ```

pub mod adapters;
pub mod container;
pub mod control;
pub mod handlers;
pub mod runtime;

pub use container::{Capabilities, ConfigError, EngineConfig, EngineContainer, StorageBackend};
pub use control::{ControlError, ControlResult, EngineControl};
pub use runtime::EngineRuntime;
