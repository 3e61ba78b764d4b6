//! Metrics collection and exposition.
//!
//! # Metrics
//! - `service_requests_total` (counter): requests by method, status
//! - `service_request_duration_seconds` (histogram): latency distribution
//! - `service_active_connections` (gauge): current connection count
//! - `service_shutdowns_total` (counter): shutdowns by path (graceful, forced)
//! - `service_release_failures_total` (counter): failed release steps by resource
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed
//! - The exporter is optional and off by default

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::config::schema::ObservabilityConfig;

/// Start the exporter if enabled. It is not one of the released resources
/// and lives until the process exits.
pub fn start_exporter(config: &ObservabilityConfig) {
    if !config.metrics_enabled {
        return;
    }
    match config.metrics_address.parse() {
        Ok(addr) => init_metrics(addr),
        Err(_) => tracing::error!(
            metrics_address = %config.metrics_address,
            "Failed to parse metrics address"
        ),
    }
}

/// Install the Prometheus recorder and its scrape listener.
///
/// Must be called from within the tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    let labels = [
        ("method", method.to_string()),
        ("status", status.to_string()),
    ];
    metrics::counter!("service_requests_total", &labels).increment(1);
    metrics::histogram!("service_request_duration_seconds", &labels)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_active_connections(count: u64) {
    metrics::gauge!("service_active_connections").set(count as f64);
}

pub fn record_shutdown(path: &'static str) {
    metrics::counter!("service_shutdowns_total", "path" => path).increment(1);
}

pub fn record_release_failure(resource: &'static str) {
    metrics::counter!("service_release_failures_total", "resource" => resource).increment(1);
}
