//! Metrics collection and exposition.
//!
//! # Metrics
//! - `auth_attempts_total` (counter): attempts by outcome
//! - `auth_simulated_failures_total` (counter): injected failures
//! - `auth_journal_len` (gauge): records currently retained
//! - `auth_limiter_sources` (gauge): sources with a tracked window
//! - `auth_limiter_evictions_total` (counter): idle sources swept
//!
//! Without an installed recorder every call is a no-op.

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

use crate::journal::Outcome;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_attempt(outcome: Outcome) {
    counter!("auth_attempts_total", "outcome" => outcome.as_str()).increment(1);
}

pub fn record_simulated(count: usize) {
    counter!("auth_simulated_failures_total").increment(count as u64);
}

pub fn record_journal_len(len: usize) {
    gauge!("auth_journal_len").set(len as f64);
}

pub fn record_limiter_sweep(evicted: usize, remaining: usize) {
    counter!("auth_limiter_evictions_total").increment(evicted as u64);
    gauge!("auth_limiter_sources").set(remaining as f64);
}
