//! # Adapters
//!
//! Runtime-side implementations of outbound ports. Subsystem crates ship
//! their own `KeyValueStore` repositories; this module decides which store
//! they share and guards the data directory.

pub mod storage;

pub use storage::{open_store, DataDirLock, OpenedStore, StorageSetupError};
