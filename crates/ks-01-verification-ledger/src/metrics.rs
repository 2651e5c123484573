//! # Verification Ledger Metrics
//!
//! Enable with the `metrics` feature.
//!
//! - `ledger_requests_issued_total` - Counter of newly issued requests
//! - `ledger_responses_total` - Counter of recorded responses (by decision)
//! - `ledger_requests_expired_total` - Counter of requests expired by sweep or archival
//! - `ledger_rejected_responses_total` - Counter of rejected responses (by reason)

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;

#[cfg(feature = "metrics")]
use prometheus::{register_int_counter, register_int_counter_vec, IntCounter, IntCounterVec};

#[cfg(feature = "metrics")]
lazy_static! {
    pub static ref REQUESTS_ISSUED: IntCounter = register_int_counter!(
        "ledger_requests_issued_total",
        "Total number of verification requests issued"
    )
    .expect("Failed to create REQUESTS_ISSUED metric");

    pub static ref RESPONSES: IntCounterVec = register_int_counter_vec!(
        "ledger_responses_total",
        "Total number of verification responses recorded",
        &["decision"]
    )
    .expect("Failed to create RESPONSES metric");

    pub static ref REQUESTS_EXPIRED: IntCounter = register_int_counter!(
        "ledger_requests_expired_total",
        "Total number of verification requests expired"
    )
    .expect("Failed to create REQUESTS_EXPIRED metric");

    pub static ref REJECTED_RESPONSES: IntCounterVec = register_int_counter_vec!(
        "ledger_rejected_responses_total",
        "Total number of rejected verification responses",
        &["reason"]
    )
    .expect("Failed to create REJECTED_RESPONSES metric");
}

#[cfg(feature = "metrics")]
pub fn record_request_issued() {
    REQUESTS_ISSUED.inc();
}

#[cfg(feature = "metrics")]
pub fn record_response(decision: &str) {
    RESPONSES.with_label_values(&[decision]).inc();
}

#[cfg(feature = "metrics")]
pub fn record_requests_expired(count: u64) {
    REQUESTS_EXPIRED.inc_by(count);
}

#[cfg(feature = "metrics")]
pub fn record_rejected_response(reason: &str) {
    REJECTED_RESPONSES.with_label_values(&[reason]).inc();
}

// =============================================================================
// NO-OP IMPLEMENTATIONS (when metrics feature disabled)
// =============================================================================

#[cfg(not(feature = "metrics"))]
pub fn record_request_issued() {}

#[cfg(not(feature = "metrics"))]
pub fn record_response(_decision: &str) {}

#[cfg(not(feature = "metrics"))]
pub fn record_requests_expired(_count: u64) {}

#[cfg(not(feature = "metrics"))]
pub fn record_rejected_response(_reason: &str) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_callable() {
        record_request_issued();
        record_response("confirm");
        record_requests_expired(3);
        record_rejected_response("already_responded");
    }
}
