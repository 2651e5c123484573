//! # Shared Bus - Engine Event Bus
//!
//! In-process broadcast of engine lifecycle events.
//!
//! ```text
//! ┌──────────────┐                    ┌──────────────┐
//! │  Scheduler   │                    │ Audit logger │
//! │  Monitor     │    publish()       │ Metrics      │
//! │  Ledger      │ ──────┐            │ Host hooks   │
//! └──────────────┘       │            └──────────────┘
//!                        ▼                    ↑
//!                  ┌──────────────┐          │
//!                  │  Event Bus   │ ─────────┘
//!                  └──────────────┘  subscribe()
//! ```
//!
//! Events are notifications after the fact. State transitions are driven
//! only by the scheduler and by owner intents; nothing consumes the bus to
//! mutate engine state.

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod events;
pub mod publisher;
pub mod subscriber;

pub use events::{EngineEvent, EventFilter, EventTopic};
pub use publisher::{EventPublisher, InMemoryEventBus, NoopPublisher};
pub use subscriber::{EventStream, Subscription, SubscriptionError};

/// Maximum events to buffer per subscriber before the slowest one lags.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;
