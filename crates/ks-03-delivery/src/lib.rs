//! # ks-03-delivery
//!
//! Message lifecycle for future delivery.
//!
//! ## Overview
//!
//! - **Model**: `Message` with a `Trigger` (date, verified event,
//!   posthumous) and the status lifecycle `Draft` through `Delivered`.
//! - **State machine**: `DeliveryStateMachine::advance` is pure. It maps a
//!   message plus an `Evidence` snapshot to the next message and an
//!   optional `Effect` that the scheduler executes.
//! - **Executor**: one delivery attempt with bounded I/O and an
//!   idempotency receipt per `(message, attempt)`.
//! - **Owner operations**: create, attach content, schedule, cancel, and
//!   the status view with quorum progress.
//!
//! ## Invariants
//!
//! | Rule | Enforcement |
//! |------|-------------|
//! | Content required to leave `Draft` | `finalize` returns `MissingContentRef` |
//! | `Delivered`/`Cancelled` are terminal | `advance` returns `InvalidStateTransition` |
//! | `attempts` grows only on `Processing -> Failed` | outcome carries its attempt number |
//! | One notice per attempt | receipt checked before sending |
//! | No lost updates | revision compare-and-set in the repository |

pub mod adapters;
pub mod domain;
pub mod error;
pub mod executor;
pub mod metrics;
pub mod ports;
pub mod service;

pub use adapters::KvMessageRepository;
pub use domain::{
    delivery_key, DeliveryConfig, DeliveryOutcome, DeliveryReceipt, DeliveryStateMachine, Effect,
    Evidence, FailureReason, FailureRecord, Message, MessageStatus, Transition, Trigger,
};
pub use error::{DeliveryError, DeliveryResult};
pub use executor::DeliveryExecutor;
pub use ports::{MessageOperations, MessageRepository, MessageStatusView, NewMessage};
pub use service::MessageService;
