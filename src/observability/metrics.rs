//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define proxy metrics (requests, latency, projections)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `proxy_requests_total` (counter): total requests by method, status
//! - `proxy_request_duration_seconds` (histogram): latency distribution
//! - `surrogate_key_projections_total` (counter): projections by mode
//! - `surrogate_key_header_bytes` (histogram): size of the header sent
//!
//! # Design Decisions
//! - Low-overhead metric updates through the `metrics` facade
//! - Without an installed recorder every call is a no-op

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its HTTP listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint started"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to start metrics endpoint"),
    }
}

/// Record a proxied request.
pub fn record_request(method: &str, status: u16, start: Instant) {
    ::metrics::counter!(
        "proxy_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    ::metrics::histogram!("proxy_request_duration_seconds")
        .record(start.elapsed().as_secs_f64());
}

/// Record one `Surrogate-Key` projection.
pub fn record_projection(mode: &'static str, header_bytes: usize) {
    ::metrics::counter!("surrogate_key_projections_total", "mode" => mode).increment(1);
    ::metrics::histogram!("surrogate_key_header_bytes").record(header_bytes as f64);
}
