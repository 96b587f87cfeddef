//! Prometheus metrics for the event router.

use metrics::{counter, describe_counter, describe_gauge, gauge};

/// Metric names for the router.
pub mod names {
    /// Events fanned out, by event name.
    pub const REALTIME_EVENTS_TOTAL: &str = "admit_realtime_events_total";
    /// Per-connection sends that failed.
    pub const REALTIME_DELIVERY_FAILURES_TOTAL: &str = "admit_realtime_delivery_failures_total";
    /// Currently registered connections.
    pub const REALTIME_CONNECTIONS: &str = "admit_realtime_connections";
}

/// Register metric descriptions.
pub fn register_metrics() {
    describe_counter!(names::REALTIME_EVENTS_TOTAL, "Events broadcast to rooms");
    describe_counter!(
        names::REALTIME_DELIVERY_FAILURES_TOTAL,
        "Event deliveries dropped because a connection was full or closed"
    );
    describe_gauge!(names::REALTIME_CONNECTIONS, "Open realtime connections");
}

pub(crate) fn event(name: &'static str) {
    counter!(names::REALTIME_EVENTS_TOTAL, "event" => name).increment(1);
}

pub(crate) fn delivery_failure(reason: &'static str) {
    counter!(names::REALTIME_DELIVERY_FAILURES_TOTAL, "reason" => reason).increment(1);
}

#[allow(clippy::cast_precision_loss)]
pub(crate) fn connections(count: usize) {
    gauge!(names::REALTIME_CONNECTIONS).set(count as f64);
}
