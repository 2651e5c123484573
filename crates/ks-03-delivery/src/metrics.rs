//! # Delivery Metrics
//!
//! Enable with the `metrics` feature.
//!
//! - `delivery_messages_created_total` - Counter of drafts
//! - `delivery_messages_scheduled_total` - Counter of finalized messages (by trigger)
//! - `delivery_messages_cancelled_total` - Counter of owner cancellations
//! - `delivery_attempts_total` - Counter of delivery attempts (by outcome)
//! - `delivery_receipt_hits_total` - Counter of attempts completed from an existing receipt
//! - `delivery_receipt_write_failures_total` - Counter of acknowledged attempts whose receipt was lost

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;

#[cfg(feature = "metrics")]
use prometheus::{register_int_counter, register_int_counter_vec, IntCounter, IntCounterVec};

#[cfg(feature = "metrics")]
lazy_static! {
    pub static ref MESSAGES_CREATED: IntCounter = register_int_counter!(
        "delivery_messages_created_total",
        "Total number of message drafts created"
    )
    .expect("Failed to create MESSAGES_CREATED metric");

    pub static ref MESSAGES_SCHEDULED: IntCounterVec = register_int_counter_vec!(
        "delivery_messages_scheduled_total",
        "Total number of messages scheduled",
        &["trigger"]
    )
    .expect("Failed to create MESSAGES_SCHEDULED metric");

    pub static ref MESSAGES_CANCELLED: IntCounter = register_int_counter!(
        "delivery_messages_cancelled_total",
        "Total number of messages cancelled by their owner"
    )
    .expect("Failed to create MESSAGES_CANCELLED metric");

    pub static ref DELIVERY_ATTEMPTS: IntCounterVec = register_int_counter_vec!(
        "delivery_attempts_total",
        "Total number of delivery attempts",
        &["outcome"]
    )
    .expect("Failed to create DELIVERY_ATTEMPTS metric");

    pub static ref RECEIPT_HITS: IntCounter = register_int_counter!(
        "delivery_receipt_hits_total",
        "Total number of attempts completed from an existing receipt"
    )
    .expect("Failed to create RECEIPT_HITS metric");

    pub static ref RECEIPT_WRITE_FAILURES: IntCounter = register_int_counter!(
        "delivery_receipt_write_failures_total",
        "Total number of acknowledged attempts whose receipt could not be written"
    )
    .expect("Failed to create RECEIPT_WRITE_FAILURES metric");
}

#[cfg(feature = "metrics")]
pub fn record_message_created() {
    MESSAGES_CREATED.inc();
}

#[cfg(feature = "metrics")]
pub fn record_message_scheduled(trigger: &str) {
    MESSAGES_SCHEDULED.with_label_values(&[trigger]).inc();
}

#[cfg(feature = "metrics")]
pub fn record_message_cancelled() {
    MESSAGES_CANCELLED.inc();
}

#[cfg(feature = "metrics")]
pub fn record_delivery_attempt(outcome: &str) {
    DELIVERY_ATTEMPTS.with_label_values(&[outcome]).inc();
}

#[cfg(feature = "metrics")]
pub fn record_receipt_hit() {
    RECEIPT_HITS.inc();
}

#[cfg(feature = "metrics")]
pub fn record_receipt_write_failure() {
    RECEIPT_WRITE_FAILURES.inc();
}

// =============================================================================
// NO-OP IMPLEMENTATIONS (when metrics feature disabled)
// =============================================================================

#[cfg(not(feature = "metrics"))]
pub fn record_message_created() {}

#[cfg(not(feature = "metrics"))]
pub fn record_message_scheduled(_trigger: &str) {}

#[cfg(not(feature = "metrics"))]
pub fn record_message_cancelled() {}

#[cfg(not(feature = "metrics"))]
pub fn record_delivery_attempt(_outcome: &str) {}

#[cfg(not(feature = "metrics"))]
pub fn record_receipt_hit() {}

#[cfg(not(feature = "metrics"))]
pub fn record_receipt_write_failure() {}
