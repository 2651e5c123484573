//! # Scheduler Metrics
//!
//! Enable with the `metrics` feature.
//!
//! - `scheduler_ticks_total` - Counter of completed ticks
//! - `scheduler_messages_evaluated_total` - Counter of messages evaluated under a lease
//! - `scheduler_lease_contention_total` - Counter of candidates skipped because leased
//! - `scheduler_deliveries_total` - Counter of messages that reached `Delivered`
//! - `scheduler_delivery_failures_total` - Counter of transitions into `Failed` (by terminal)
//! - `scheduler_tick_duration_seconds` - Histogram of tick wall time
//! - `scheduler_leases_held` - Gauge of leases currently held

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;

#[cfg(feature = "metrics")]
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Histogram, IntCounter, IntCounterVec, IntGauge,
};

#[cfg(feature = "metrics")]
lazy_static! {
    pub static ref TICKS: IntCounter = register_int_counter!(
        "scheduler_ticks_total",
        "Total number of scheduler ticks"
    )
    .expect("Failed to create TICKS metric");

    pub static ref MESSAGES_EVALUATED: IntCounter = register_int_counter!(
        "scheduler_messages_evaluated_total",
        "Total number of messages evaluated under a lease"
    )
    .expect("Failed to create MESSAGES_EVALUATED metric");

    pub static ref LEASE_CONTENTION: IntCounter = register_int_counter!(
        "scheduler_lease_contention_total",
        "Total number of candidates skipped because another worker held the lease"
    )
    .expect("Failed to create LEASE_CONTENTION metric");

    pub static ref DELIVERIES: IntCounter = register_int_counter!(
        "scheduler_deliveries_total",
        "Total number of messages delivered"
    )
    .expect("Failed to create DELIVERIES metric");

    pub static ref DELIVERY_FAILURES: IntCounterVec = register_int_counter_vec!(
        "scheduler_delivery_failures_total",
        "Total number of transitions into Failed",
        &["terminal"]
    )
    .expect("Failed to create DELIVERY_FAILURES metric");

    pub static ref TICK_DURATION: Histogram = register_histogram!(
        "scheduler_tick_duration_seconds",
        "Wall time of one scheduler tick",
        vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0, 60.0]
    )
    .expect("Failed to create TICK_DURATION metric");

    pub static ref LEASES_HELD: IntGauge = register_int_gauge!(
        "scheduler_leases_held",
        "Leases currently held"
    )
    .expect("Failed to create LEASES_HELD metric");
}

#[cfg(feature = "metrics")]
pub fn record_tick(duration_secs: f64) {
    TICKS.inc();
    TICK_DURATION.observe(duration_secs);
}

#[cfg(feature = "metrics")]
pub fn record_evaluated() {
    MESSAGES_EVALUATED.inc();
}

#[cfg(feature = "metrics")]
pub fn record_lease_contention() {
    LEASE_CONTENTION.inc();
}

#[cfg(feature = "metrics")]
pub fn record_delivered() {
    DELIVERIES.inc();
}

#[cfg(feature = "metrics")]
pub fn record_failed(terminal: bool) {
    let label = if terminal { "true" } else { "false" };
    DELIVERY_FAILURES.with_label_values(&[label]).inc();
}

#[cfg(feature = "metrics")]
pub fn set_leases_held(count: usize) {
    LEASES_HELD.set(count as i64);
}

// =============================================================================
// NO-OP IMPLEMENTATIONS (when metrics feature disabled)
// =============================================================================

#[cfg(not(feature = "metrics"))]
pub fn record_tick(_duration_secs: f64) {}

#[cfg(not(feature = "metrics"))]
pub fn record_evaluated() {}

#[cfg(not(feature = "metrics"))]
pub fn record_lease_contention() {}

#[cfg(not(feature = "metrics"))]
pub fn record_delivered() {}

#[cfg(not(feature = "metrics"))]
pub fn record_failed(_terminal: bool) {}

#[cfg(not(feature = "metrics"))]
pub fn set_leases_held(_count: usize) {}
