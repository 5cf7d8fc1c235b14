//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_connections_total` (counter): finished connections by outcome
//! - `proxy_request_duration_seconds` (histogram): connection lifetime by outcome
//! - `proxy_active_connections` (gauge): current connection count
//! - `proxy_cache_lookups_total` (counter): lookups by result (hit/miss)
//! - `proxy_cache_inserts_total` (counter): inserts by outcome
//! - `proxy_cache_evictions_total` (counter): LRU evictions
//! - `proxy_cache_bytes` / `proxy_cache_entries` (gauges): cache occupancy
//! - `proxy_upstream_errors_total` (counter): origin failures by kind
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op
//! - The Prometheus exporter is only installed when enabled in config

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

use crate::cache::{CacheRejected, InsertOutcome};
use crate::net::connection::ConnectionState;

/// Install the Prometheus recorder with an HTTP scrape endpoint.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record a finished connection and how long it lived.
pub fn record_connection(outcome: ConnectionState, started: Instant) {
    let label = outcome.as_str();
    counter!("proxy_connections_total", "outcome" => label).increment(1);
    histogram!("proxy_request_duration_seconds", "outcome" => label)
        .record(started.elapsed().as_secs_f64());
}

pub fn set_active_connections(count: u64) {
    gauge!("proxy_active_connections").set(count as f64);
}

pub fn record_cache_lookup(hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    counter!("proxy_cache_lookups_total", "result" => result).increment(1);
}

pub fn record_cache_insert(outcome: &InsertOutcome) {
    let label = match outcome {
        InsertOutcome::Stored { replaced: false, .. } => "stored",
        InsertOutcome::Stored { replaced: true, .. } => "replaced",
        InsertOutcome::Rejected(CacheRejected::TooLarge) => "too_large",
        InsertOutcome::Rejected(CacheRejected::DoesNotFit) => "does_not_fit",
    };
    counter!("proxy_cache_inserts_total", "outcome" => label).increment(1);

    if let InsertOutcome::Stored { evicted, .. } = outcome {
        if *evicted > 0 {
            counter!("proxy_cache_evictions_total").increment(*evicted as u64);
        }
    }
}

pub fn record_cache_size(entries: usize, bytes: usize) {
    gauge!("proxy_cache_entries").set(entries as f64);
    gauge!("proxy_cache_bytes").set(bytes as f64);
}

pub fn record_upstream_error(kind: &'static str) {
    counter!("proxy_upstream_errors_total", "kind" => kind).increment(1);
}
