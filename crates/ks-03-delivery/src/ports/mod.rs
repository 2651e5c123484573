//! Ports layer (hexagonal architecture)

pub mod inbound;
pub mod outbound;

pub use inbound::{MessageOperations, MessageStatusView, NewMessage};
pub use outbound::MessageRepository;
