//! Metrics module
//!
//! Prometheus metrics covering the three protocol phases.

pub mod server;

use lazy_static::lazy_static;
use prometheus::{
    register_counter, register_counter_vec, register_histogram_vec, Counter, CounterVec,
    HistogramVec,
};

lazy_static! {
    // Issue phase
    pub static ref CAPABILITIES_ISSUED: CounterVec = register_counter_vec!(
        "consignr_capabilities_issued_total",
        "Capability issue requests by outcome",
        &["purpose", "status"]
    ).unwrap();

    // Transfer phase
    pub static ref TRANSFERS_TOTAL: CounterVec = register_counter_vec!(
        "consignr_transfers_total",
        "Direct transfers by outcome",
        &["status"]
    ).unwrap();

    pub static ref TRANSFER_BYTES_TOTAL: Counter = register_counter!(
        "consignr_transfer_bytes_total",
        "Total bytes sent to the storage provider"
    ).unwrap();

    // Finalize phase
    pub static ref FINALIZE_TOTAL: CounterVec = register_counter_vec!(
        "consignr_finalize_total",
        "Finalize requests by outcome",
        &["status"]
    ).unwrap();

    // End-to-end outcomes
    pub static ref UPLOADS_TOTAL: CounterVec = register_counter_vec!(
        "consignr_uploads_total",
        "Completed upload flows by outcome",
        &["purpose", "status"]
    ).unwrap();

    pub static ref PHASE_DURATION: HistogramVec = register_histogram_vec!(
        "consignr_phase_duration_seconds",
        "Duration of each protocol phase in seconds",
        &["phase"],
        vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0]
    ).unwrap();

    // Error metrics
    pub static ref ERRORS_TOTAL: CounterVec = register_counter_vec!(
        "consignr_errors_total",
        "Total errors",
        &["type"]
    ).unwrap();
}

/// Record a capability issue outcome
pub fn record_issue(purpose: &str, status: &str) {
    CAPABILITIES_ISSUED
        .with_label_values(&[purpose, status])
        .inc();
}

/// Record a transfer outcome; bytes are only counted for successes
pub fn record_transfer(status: &str, bytes: u64) {
    TRANSFERS_TOTAL.with_label_values(&[status]).inc();
    if bytes > 0 {
        TRANSFER_BYTES_TOTAL.inc_by(bytes as f64);
    }
}

/// Record a finalize outcome
pub fn record_finalize(status: &str) {
    FINALIZE_TOTAL.with_label_values(&[status]).inc();
}

/// Record the outcome of a full upload flow
pub fn record_upload_outcome(purpose: &str, status: &str) {
    UPLOADS_TOTAL.with_label_values(&[purpose, status]).inc();
}

/// Record how long one phase took
pub fn record_phase_duration(phase: &str, duration_secs: f64) {
    PHASE_DURATION.with_label_values(&[phase]).observe(duration_secs);
}

/// Record an error
pub fn record_error(error_type: &str) {
    ERRORS_TOTAL.with_label_values(&[error_type]).inc();
}
