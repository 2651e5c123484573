//! # Engine Container
//!
//! Configuration plus the container that builds every subsystem with its
//! adapters.

pub mod config;
pub mod subsystems;

pub use config::{ConfigError, EngineConfig, StorageBackend, StorageConfig};
pub use subsystems::{Capabilities, EngineContainer};
