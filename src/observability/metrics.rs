//! Metrics collection and exposition.
//!
//! # Metrics
//! - `balancer_selections_total` (counter): selections by backend, strategy
//! - `balancer_selection_failures_total` (counter): selections that found no backend
//! - `balancer_backend_connections` (gauge): active connections per backend
//! - `balancer_backend_health` (gauge): 1=eligible, 0=unhealthy
//! - `balancer_config_reloads_total` (counter): reload attempts by result
//!
//! Without an installed recorder every call here is a no-op.

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::health::state::HealthState;
use crate::load_balancer::StrategyKind;

/// Install the Prometheus recorder and its HTTP scrape listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => {
            describe();
            tracing::info!(address = %addr, "Metrics exporter listening");
        }
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

fn describe() {
    ::metrics::describe_counter!("balancer_selections_total", "Backend selections");
    ::metrics::describe_counter!(
        "balancer_selection_failures_total",
        "Selections that found no available backend"
    );
    ::metrics::describe_gauge!("balancer_backend_connections", "Active connections per backend");
    ::metrics::describe_gauge!("balancer_backend_health", "1 if the backend takes traffic");
    ::metrics::describe_counter!("balancer_config_reloads_total", "Config reload attempts");
}

pub fn record_selection(backend: &str, strategy: StrategyKind) {
    ::metrics::counter!(
        "balancer_selections_total",
        "backend" => backend.to_string(),
        "strategy" => strategy.as_str()
    )
    .increment(1);
}

pub fn record_selection_failure(strategy: StrategyKind) {
    ::metrics::counter!("balancer_selection_failures_total", "strategy" => strategy.as_str())
        .increment(1);
}

pub fn record_backend_connections(backend: &str, active: u64) {
    ::metrics::gauge!("balancer_backend_connections", "backend" => backend.to_string())
        .set(active as f64);
}

/// Zero the per-backend gauges of a deregistered backend.
pub fn record_backend_removed(backend: &str) {
    record_backend_connections(backend, 0);
    ::metrics::gauge!("balancer_backend_health", "backend" => backend.to_string()).set(0.0);
}

pub fn record_backend_health(backend: &str, state: HealthState) {
    let value = if state.is_eligible() { 1.0 } else { 0.0 };
    ::metrics::gauge!("balancer_backend_health", "backend" => backend.to_string()).set(value);
}

pub fn record_config_reload(success: bool) {
    let result = if success { "ok" } else { "error" };
    ::metrics::counter!("balancer_config_reloads_total", "result" => result).increment(1);
}
