//! Domain layer for Delivery

pub mod config;
pub mod evidence;
pub mod message;
pub mod receipt;
pub mod state_machine;

pub use config::DeliveryConfig;
pub use evidence::{DeliveryOutcome, Evidence};
pub use message::{FailureReason, FailureRecord, Message, MessageStatus, Trigger};
pub use receipt::{delivery_key, DeliveryReceipt};
pub use state_machine::{DeliveryStateMachine, Effect, Transition};
