//! Metrics collection and exposition.
//!
//! # Metrics
//! - `bridge_header_events_total` (counter): events delivered to sinks
//! - `bridge_header_bytes_total` (counter): payload bytes copied out of the node
//! - `bridge_event_faults_total` (counter): faults caught at the boundary, by kind
//! - `bridge_lifecycle_transitions_total` (counter): supervisor transitions, by state
//! - `node_connections_total` (counter): connections accepted by the embedded node
//! - `node_connections_active` (gauge): currently open connections
//!
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;

use ::metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its HTTP scrape endpoint.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    describe_metrics();
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

fn describe_metrics() {
    describe_counter!("bridge_header_events_total", "Header events delivered to sinks");
    describe_counter!("bridge_header_bytes_total", "Header bytes copied out of the node");
    describe_counter!("bridge_event_faults_total", "Faults caught at the callback boundary");
    describe_counter!("bridge_lifecycle_transitions_total", "Supervisor state transitions");
    describe_counter!("node_connections_total", "Connections accepted by the embedded node");
    describe_gauge!("node_connections_active", "Open connections on the embedded node");
}

pub fn record_header_event(bytes: usize) {
    counter!("bridge_header_events_total").increment(1);
    counter!("bridge_header_bytes_total").increment(bytes as u64);
}

pub fn record_event_fault(kind: &'static str) {
    counter!("bridge_event_faults_total", "kind" => kind).increment(1);
}

pub fn record_transition(state: &'static str) {
    counter!("bridge_lifecycle_transitions_total", "state" => state).increment(1);
}

pub fn record_connection_opened(active: usize) {
    counter!("node_connections_total").increment(1);
    gauge!("node_connections_active").set(active as f64);
}

pub fn record_connection_closed(active: usize) {
    gauge!("node_connections_active").set(active as f64);
}
