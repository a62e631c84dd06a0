//! Prometheus metrics for the QaHub API.
//!
//! Covers the ambient concerns of the service:
//! - Domain event bus activity and listener failures
//! - Change-data-capture (audit) writes
//! - Notification fan-out
//! - Integration sync outcomes
//! - Attachment storage

use lazy_static::lazy_static;
use prometheus::{
    register_int_counter, register_int_counter_vec, Encoder, IntCounter, IntCounterVec,
    TextEncoder,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "qahub";

lazy_static! {
    // ============================================================================
    // Domain event metrics
    // ============================================================================

    /// Total domain events emitted, by event kind
    pub static ref EVENTS_EMITTED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_events_emitted_total", METRIC_PREFIX),
        "Total domain events emitted",
        &["event"]
    ).unwrap();

    /// Events dropped because a listener lagged behind the channel capacity
    pub static ref EVENTS_LAGGED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_events_lagged_total", METRIC_PREFIX),
        "Domain events dropped due to listener lag"
    ).unwrap();

    /// Listener iterations that ended in an error, by listener name
    pub static ref LISTENER_FAILURES_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_listener_failures_total", METRIC_PREFIX),
        "Domain event listener failures",
        &["listener"]
    ).unwrap();

    // ============================================================================
    // Audit / CDC metrics
    // ============================================================================

    /// Audit rows written
    pub static ref AUDIT_RECORDS_TOTAL: IntCounter = register_int_counter!(
        format!("{}_audit_records_total", METRIC_PREFIX),
        "Audit log rows written"
    ).unwrap();

    /// Audit writes that failed (best effort, primary operation unaffected)
    pub static ref AUDIT_WRITE_FAILURES_TOTAL: IntCounter = register_int_counter!(
        format!("{}_audit_write_failures_total", METRIC_PREFIX),
        "Audit log writes that failed"
    ).unwrap();

    // ============================================================================
    // Notification metrics
    // ============================================================================

    /// Notification rows created, by kind
    pub static ref NOTIFICATIONS_CREATED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_notifications_created_total", METRIC_PREFIX),
        "Notification rows created",
        &["kind"]
    ).unwrap();

    // ============================================================================
    // Integration metrics
    // ============================================================================

    /// Integration sync attempts, by provider and outcome
    pub static ref INTEGRATION_SYNCS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_integration_syncs_total", METRIC_PREFIX),
        "Integration sync attempts",
        &["provider", "outcome"]
    ).unwrap();

    // ============================================================================
    // Upload metrics
    // ============================================================================

    /// Attachments stored, by backend
    pub static ref UPLOADS_STORED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_uploads_stored_total", METRIC_PREFIX),
        "Attachments stored",
        &["backend"]
    ).unwrap();

    // ============================================================================
    // Retention metrics
    // ============================================================================

    /// Rows purged by the retention sweep, by table
    pub static ref RETENTION_PURGED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_retention_purged_total", METRIC_PREFIX),
        "Rows purged by the retention sweep",
        &["table"]
    ).unwrap();
}

/// Force registration of every metric so the first scrape already sees the
/// zeroed series.
pub fn init() {
    lazy_static::initialize(&EVENTS_EMITTED_TOTAL);
    lazy_static::initialize(&EVENTS_LAGGED_TOTAL);
    lazy_static::initialize(&LISTENER_FAILURES_TOTAL);
    lazy_static::initialize(&AUDIT_RECORDS_TOTAL);
    lazy_static::initialize(&AUDIT_WRITE_FAILURES_TOTAL);
    lazy_static::initialize(&NOTIFICATIONS_CREATED_TOTAL);
    lazy_static::initialize(&INTEGRATION_SYNCS_TOTAL);
    lazy_static::initialize(&UPLOADS_STORED_TOTAL);
    lazy_static::initialize(&RETENTION_PURGED_TOTAL);
}

/// Encode all registered metrics in the Prometheus text format.
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}

/// Helper for integration sync outcome recording
pub struct IntegrationMetrics;

impl IntegrationMetrics {
    pub fn record_success(provider: &str) {
        INTEGRATION_SYNCS_TOTAL
            .with_label_values(&[provider, "success"])
            .inc();
    }

    pub fn record_failure(provider: &str) {
        INTEGRATION_SYNCS_TOTAL
            .with_label_values(&[provider, "failure"])
            .inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_metrics() {
        EVENTS_EMITTED_TOTAL.with_label_values(&["run.started"]).inc();
        let output = encode_metrics().unwrap();
        assert!(output.contains("qahub_events_emitted_total"));
    }
}
