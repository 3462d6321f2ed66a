//! Metric Recording
//!
//! Operational metrics for the monitor and the rate limiter, emitted through
//! the `metrics` facade. The core installs no recorder; the embedding
//! process decides how (and whether) to export.
//!
//! # Metrics
//!
//! - `tws_core_connection_state`: current lifecycle state (gauge, labeled)
//! - `tws_core_reconnects_total`: completed reconnection sequences
//! - `tws_core_heartbeat_latency_seconds`: heartbeat round-trip latency
//! - `tws_core_requests_total`: rate limiter decisions by class and outcome
//! - `tws_core_request_delay_seconds`: waits imposed by the rate limiter
//! - `tws_core_active_subscriptions`: market data lines in use
//! - `tws_core_gateway_rate_violations_total`: violations reported upstream

use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};

use crate::domain::connection::ConnectionState;
use crate::infrastructure::limiter::OperationClass;

/// Describe all metrics emitted by the core.
///
/// Optional; calling it once after installing a recorder attaches help text
/// to every series.
pub fn register_metrics() {
    describe_gauge!(
        "tws_core_connection_state",
        "Current connection lifecycle state (1 for the active state label)"
    );
    describe_counter!(
        "tws_core_reconnects_total",
        "Completed reconnection sequences"
    );
    describe_histogram!(
        "tws_core_heartbeat_latency_seconds",
        "Heartbeat round-trip latency"
    );
    describe_counter!(
        "tws_core_requests_total",
        "Rate limiter decisions by operation class and outcome"
    );
    describe_histogram!(
        "tws_core_request_delay_seconds",
        "Waits imposed on callers by the rate limiter"
    );
    describe_gauge!(
        "tws_core_active_subscriptions",
        "Market data subscription lines in use"
    );
    describe_counter!(
        "tws_core_gateway_rate_violations_total",
        "Rate violations reported by the gateway itself"
    );
}

/// Record the connection entering a lifecycle state.
pub fn record_connection_state(state: ConnectionState) {
    gauge!("tws_core_connection_state", "state" => state.as_str()).set(1.0);
}

/// Count a completed reconnection sequence.
pub fn record_reconnect() {
    counter!("tws_core_reconnects_total").increment(1);
}

/// Record a heartbeat round-trip latency observation.
pub fn record_heartbeat_latency(latency: Duration) {
    histogram!("tws_core_heartbeat_latency_seconds").record(latency.as_secs_f64());
}

/// Count a rate limiter decision for an operation class.
pub fn record_request_decision(class: OperationClass, outcome: &'static str) {
    counter!(
        "tws_core_requests_total",
        "class" => class.as_str(),
        "outcome" => outcome
    )
    .increment(1);
}

/// Record a wait imposed on a caller by the rate limiter.
pub fn record_request_delay(class: OperationClass, delay: Duration) {
    histogram!("tws_core_request_delay_seconds", "class" => class.as_str())
        .record(delay.as_secs_f64());
}

/// Record the number of market data lines in use.
#[allow(clippy::cast_precision_loss)]
pub fn record_active_subscriptions(count: usize) {
    gauge!("tws_core_active_subscriptions").set(count as f64);
}

/// Count a rate violation reported by the gateway.
pub fn record_gateway_violation() {
    counter!("tws_core_gateway_rate_violations_total").increment(1);
}
