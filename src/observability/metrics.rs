//! Metrics collection and exposition.
//!
//! # Metrics
//! - `viewproxy_requests_total` (counter): inbound requests by method, status, kind
//! - `viewproxy_request_duration_seconds` (histogram): inbound latency by kind
//! - `viewproxy_fragment_requests_total` (counter): fragment fetches by label, status
//! - `viewproxy_fragment_duration_seconds` (histogram): fragment latency by label
//! - `viewproxy_fragment_failures_total` (counter): aborted fetches by error kind
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed
//! - Labels stay low-cardinality (timing labels, not URLs)

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// Install the Prometheus recorder with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

/// Record an inbound request. `kind` is "fragments", "passthrough" or "not_found".
pub fn record_request(method: &str, status: u16, kind: &'static str, start: Instant) {
    counter!(
        "viewproxy_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "kind" => kind
    )
    .increment(1);

    histogram!("viewproxy_request_duration_seconds", "kind" => kind)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_fragment(label: &str, status: u16, duration: Duration) {
    counter!(
        "viewproxy_fragment_requests_total",
        "label" => label.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!("viewproxy_fragment_duration_seconds", "label" => label.to_string())
        .record(duration.as_secs_f64());
}

pub fn record_fragment_failure(kind: &'static str) {
    counter!("viewproxy_fragment_failures_total", "kind" => kind).increment(1);
}
