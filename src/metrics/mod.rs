//! Prometheus metrics for the relay.
//!
//! - Connection metrics (active push connections, opened/closed)
//! - Fan-out metrics (published by origin, delivered, failed)
//! - Poll buffer metrics (enqueued, dropped, active, evicted)
//! - Sweeper metrics (probes, tick duration, tick failures)

mod helpers;

pub use helpers::{encode_metrics, BufferMetrics, MessageMetrics, SweepMetrics, WsMessageMetrics};

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Histogram, IntCounter, IntCounterVec, IntGauge,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "relay";

lazy_static! {
    // ============================================================================
    // Connection Metrics
    // ============================================================================

    /// Number of live push connections
    pub static ref CONNECTIONS_ACTIVE: IntGauge = register_int_gauge!(
        format!("{}_connections_active", METRIC_PREFIX),
        "Number of live push connections"
    ).unwrap();

    pub static ref WS_CONNECTIONS_OPENED: IntCounter = register_int_counter!(
        format!("{}_ws_connections_opened_total", METRIC_PREFIX),
        "Total push connections opened"
    ).unwrap();

    pub static ref WS_CONNECTIONS_CLOSED: IntCounter = register_int_counter!(
        format!("{}_ws_connections_closed_total", METRIC_PREFIX),
        "Total push connections closed"
    ).unwrap();

    /// Push messages received, by action
    pub static ref WS_MESSAGES_RECEIVED: IntCounterVec = register_int_counter_vec!(
        format!("{}_ws_messages_received_total", METRIC_PREFIX),
        "Push messages received from clients",
        &["action"]
    ).unwrap();

    // ============================================================================
    // Fan-out Metrics
    // ============================================================================

    /// Messages published, by origin (push or http)
    pub static ref MESSAGES_PUBLISHED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_messages_published_total", METRIC_PREFIX),
        "Total messages published",
        &["origin"]
    ).unwrap();

    pub static ref MESSAGES_DELIVERED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_messages_delivered_total", METRIC_PREFIX),
        "Total messages handed to push connections"
    ).unwrap();

    pub static ref MESSAGES_FAILED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_messages_failed_total", METRIC_PREFIX),
        "Total per-connection delivery failures"
    ).unwrap();

    // ============================================================================
    // Poll Buffer Metrics
    // ============================================================================

    pub static ref BUFFER_ENQUEUED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_buffer_enqueued_total", METRIC_PREFIX),
        "Total messages appended to poll buffers"
    ).unwrap();

    /// Messages dropped because a poll buffer was full
    pub static ref BUFFER_DROPPED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_buffer_dropped_total", METRIC_PREFIX),
        "Total messages dropped by full poll buffers"
    ).unwrap();

    pub static ref POLL_BUFFERS_ACTIVE: IntGauge = register_int_gauge!(
        format!("{}_poll_buffers_active", METRIC_PREFIX),
        "Number of live poll buffers"
    ).unwrap();

    pub static ref POLL_BUFFERS_EVICTED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_poll_buffers_evicted_total", METRIC_PREFIX),
        "Total poll buffers evicted for inactivity"
    ).unwrap();

    // ============================================================================
    // Sweeper Metrics
    // ============================================================================

    pub static ref PROBES_SENT_TOTAL: IntCounter = register_int_counter!(
        format!("{}_probes_sent_total", METRIC_PREFIX),
        "Total liveness probes enqueued"
    ).unwrap();

    pub static ref PROBES_FAILED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_probes_failed_total", METRIC_PREFIX),
        "Total liveness probes that could not be enqueued"
    ).unwrap();

    pub static ref SWEEP_DURATION_MS: Histogram = register_histogram!(
        format!("{}_sweep_duration_ms", METRIC_PREFIX),
        "Duration of one sweeper tick in milliseconds",
        vec![1.0, 5.0, 10.0, 50.0, 100.0, 500.0, 1000.0, 5000.0]
    ).unwrap();

    pub static ref SWEEP_FAILURES_TOTAL: IntCounter = register_int_counter!(
        format!("{}_sweep_failures_total", METRIC_PREFIX),
        "Total sweeper ticks abandoned after a failure"
    ).unwrap();
}
