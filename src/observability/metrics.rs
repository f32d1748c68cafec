//! Metrics collection and exposition.
//!
//! # Metrics
//! - `egress_decisions_total` (counter): policy decisions by mode, outcome
//! - `egress_upstream_responses_total` (counter): forwarded responses by status
//! - `egress_tunnels_total` (counter): opened tunnels by kind (mitm, raw)
//! - `egress_active_connections` (gauge): current client connection count
//! - `egress_active_tunnels` (gauge): current CONNECT tunnel count

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::net::ConnectionKind;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record one policy decision.
pub fn record_decision(mode: &'static str, outcome: &'static str) {
    metrics::counter!("egress_decisions_total", "mode" => mode, "outcome" => outcome).increment(1);
}

/// Record one forwarded upstream response (502/504 for upstream failures).
pub fn record_upstream(status: u16) {
    metrics::counter!("egress_upstream_responses_total", "status" => status.to_string()).increment(1);
}

/// Record one opened tunnel.
pub fn record_tunnel(kind: &'static str) {
    metrics::counter!("egress_tunnels_total", "kind" => kind).increment(1);
}

/// Adjust the active connection or tunnel gauge.
pub fn connection_opened(kind: ConnectionKind) {
    metrics::gauge!(active_gauge(kind)).increment(1.0);
}

pub fn connection_closed(kind: ConnectionKind) {
    metrics::gauge!(active_gauge(kind)).decrement(1.0);
}

fn active_gauge(kind: ConnectionKind) -> &'static str {
    match kind {
        ConnectionKind::Client => "egress_active_connections",
        ConnectionKind::Tunnel => "egress_active_tunnels",
    }
}
