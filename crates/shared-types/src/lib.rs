//! # Shared Types Crate
//!
//! Types and ports shared by every Keepsake subsystem.
//!
//! ## Contents
//!
//! - **entities**: identifiers (`MessageId`, `ContactId`, `RequestId`,
//!   `OwnerId`), `Recipient`, `ContentRef`, `VerificationToken`.
//! - **capabilities**: the external collaborators the engine consumes
//!   (`ContentStore`, `Notifier`, `TimeSource`).
//! - **storage**: the `KeyValueStore` port every subsystem persists through,
//!   with in-memory and file-backed adapters.
//! - **retry**: bounded exponential backoff.
//! - **adapters**: in-process capability implementations and test doubles.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: cross-subsystem types are defined here.
//! - **Explicit ownership**: every owner-scoped operation threads an
//!   `OwnerId`; there is no ambient session state.

pub mod adapters;
pub mod capabilities;
pub mod entities;
pub mod errors;
pub mod retry;
pub mod storage;

pub use adapters::{InMemoryContentStore, NotifierCall, RecordingNotifier, TracingNotifier};
pub use capabilities::{
    ContentStore, DeliveryNotice, ManualTimeSource, Notifier, ResolvedContent, SystemTimeSource,
    TimeSource,
};
pub use entities::*;
pub use errors::*;
pub use retry::{retry_with_backoff, RetryPolicy};
pub use storage::{
    BatchOperation, FileBackedKVStore, InMemoryKVStore, KeyValueStore, SharedKvStore,
};
