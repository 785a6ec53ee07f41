//! Metrics helper structs for convenient metric recording

use prometheus::{Encoder, TextEncoder};

use super::{
    BUFFER_DROPPED_TOTAL, BUFFER_ENQUEUED_TOTAL, MESSAGES_DELIVERED_TOTAL, MESSAGES_FAILED_TOTAL,
    MESSAGES_PUBLISHED_TOTAL, POLL_BUFFERS_EVICTED_TOTAL, PROBES_FAILED_TOTAL, PROBES_SENT_TOTAL,
    SWEEP_DURATION_MS, SWEEP_FAILURES_TOTAL, WS_MESSAGES_RECEIVED,
};

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}

/// Helper struct for recording fan-out metrics
pub struct MessageMetrics;

impl MessageMetrics {
    /// Record a message published by a push connection
    pub fn record_push_published() {
        MESSAGES_PUBLISHED_TOTAL.with_label_values(&["push"]).inc();
    }

    /// Record a message published over HTTP
    pub fn record_http_published() {
        MESSAGES_PUBLISHED_TOTAL.with_label_values(&["http"]).inc();
    }

    pub fn record_delivered(count: u64) {
        MESSAGES_DELIVERED_TOTAL.inc_by(count);
    }

    pub fn record_failed(count: u64) {
        MESSAGES_FAILED_TOTAL.inc_by(count);
    }
}

/// Helper struct for poll buffer metrics
pub struct BufferMetrics;

impl BufferMetrics {
    pub fn record_enqueued(count: u64) {
        BUFFER_ENQUEUED_TOTAL.inc_by(count);
    }

    pub fn record_dropped(count: u64) {
        BUFFER_DROPPED_TOTAL.inc_by(count);
    }

    pub fn record_evicted(count: u64) {
        POLL_BUFFERS_EVICTED_TOTAL.inc_by(count);
    }
}

/// Helper struct for liveness sweeper metrics
pub struct SweepMetrics;

impl SweepMetrics {
    pub fn record_probes(sent: u64, failed: u64) {
        PROBES_SENT_TOTAL.inc_by(sent);
        PROBES_FAILED_TOTAL.inc_by(failed);
    }

    pub fn record_duration_ms(ms: u64) {
        SWEEP_DURATION_MS.observe(ms as f64);
    }

    /// Record a tick that was abandoned
    pub fn record_failure() {
        SWEEP_FAILURES_TOTAL.inc();
    }
}

/// Helper struct for push message metrics
pub struct WsMessageMetrics;

impl WsMessageMetrics {
    pub fn record_join() {
        WS_MESSAGES_RECEIVED.with_label_values(&["join"]).inc();
    }

    pub fn record_leave() {
        WS_MESSAGES_RECEIVED.with_label_values(&["leave"]).inc();
    }

    pub fn record_post() {
        WS_MESSAGES_RECEIVED.with_label_values(&["post"]).inc();
    }

    /// Record a message that failed to decode or named an unknown action
    pub fn record_rejected() {
        WS_MESSAGES_RECEIVED.with_label_values(&["rejected"]).inc();
    }
}
