//! # Liveness Monitor Metrics
//!
//! Enable with the `metrics` feature.
//!
//! - `monitor_check_ins_total` - Counter of confirmed check-ins
//! - `monitor_prompts_total` - Counter of check-in prompts (by outcome)
//! - `monitor_missed_check_ins_total` - Counter of missed periods
//! - `monitor_escalations_started_total` - Counter of escalations
//! - `monitor_escalations_stood_down_total` - Counter of false alarms and cancelled escalations
//! - `monitor_owners_confirmed_deceased_total` - Counter of posthumous quorums

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;

#[cfg(feature = "metrics")]
use prometheus::{register_int_counter, register_int_counter_vec, IntCounter, IntCounterVec};

#[cfg(feature = "metrics")]
lazy_static! {
    pub static ref CHECK_INS: IntCounter = register_int_counter!(
        "monitor_check_ins_total",
        "Total number of confirmed check-ins"
    )
    .expect("Failed to create CHECK_INS metric");

    pub static ref PROMPTS: IntCounterVec = register_int_counter_vec!(
        "monitor_prompts_total",
        "Total number of check-in prompts",
        &["outcome"]
    )
    .expect("Failed to create PROMPTS metric");

    pub static ref MISSED_CHECK_INS: IntCounter = register_int_counter!(
        "monitor_missed_check_ins_total",
        "Total number of missed check-in periods"
    )
    .expect("Failed to create MISSED_CHECK_INS metric");

    pub static ref ESCALATIONS_STARTED: IntCounter = register_int_counter!(
        "monitor_escalations_started_total",
        "Total number of liveness escalations started"
    )
    .expect("Failed to create ESCALATIONS_STARTED metric");

    pub static ref ESCALATIONS_STOOD_DOWN: IntCounter = register_int_counter!(
        "monitor_escalations_stood_down_total",
        "Total number of liveness escalations stood down"
    )
    .expect("Failed to create ESCALATIONS_STOOD_DOWN metric");

    pub static ref CONFIRMED_DECEASED: IntCounter = register_int_counter!(
        "monitor_owners_confirmed_deceased_total",
        "Total number of owners confirmed deceased"
    )
    .expect("Failed to create CONFIRMED_DECEASED metric");
}

#[cfg(feature = "metrics")]
pub fn record_check_in() {
    CHECK_INS.inc();
}

#[cfg(feature = "metrics")]
pub fn record_prompt(outcome: &str) {
    PROMPTS.with_label_values(&[outcome]).inc();
}

#[cfg(feature = "metrics")]
pub fn record_missed_check_ins(count: u64) {
    MISSED_CHECK_INS.inc_by(count);
}

#[cfg(feature = "metrics")]
pub fn record_escalation_started() {
    ESCALATIONS_STARTED.inc();
}

#[cfg(feature = "metrics")]
pub fn record_stood_down() {
    ESCALATIONS_STOOD_DOWN.inc();
}

#[cfg(feature = "metrics")]
pub fn record_confirmed_deceased() {
    CONFIRMED_DECEASED.inc();
}

// =============================================================================
// NO-OP IMPLEMENTATIONS (when metrics feature disabled)
// =============================================================================

#[cfg(not(feature = "metrics"))]
pub fn record_check_in() {}

#[cfg(not(feature = "metrics"))]
pub fn record_prompt(_outcome: &str) {}

#[cfg(not(feature = "metrics"))]
pub fn record_missed_check_ins(_count: u64) {}

#[cfg(not(feature = "metrics"))]
pub fn record_escalation_started() {}

#[cfg(not(feature = "metrics"))]
pub fn record_stood_down() {}

#[cfg(not(feature = "metrics"))]
pub fn record_confirmed_deceased() {}
