//! Metrics collection and exposition.
//!
//! # Metrics
//! - `store_breaker_transitions_total` (counter): state changes by breaker, target state
//! - `store_breaker_state` (gauge): 0=closed, 1=half-open, 2=open
//! - `store_breaker_rejections_total` (counter): calls refused by breaker
//! - `store_retry_attempts_total` (counter): retries scheduled after transient errors
//! - `store_idempotency_total` (counter): gate outcomes by request type, `hit`/`miss`
//!
//! # Design Decisions
//! - Thin wrappers over the `metrics` macros so call sites stay one line
//! - Exporter is opt-in from config

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::resilience::State;

/// Install the Prometheus exporter with an HTTP scrape listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), metrics_exporter_prometheus::BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Prometheus metrics endpoint listening");
    Ok(())
}

pub fn record_breaker_transition(breaker: &str, to: State) {
    metrics::counter!(
        "store_breaker_transitions_total",
        "breaker" => breaker.to_string(),
        "to" => to.to_string()
    )
    .increment(1);

    let value = match to {
        State::Closed => 0.0,
        State::HalfOpen => 1.0,
        State::Open => 2.0,
    };
    metrics::gauge!("store_breaker_state", "breaker" => breaker.to_string()).set(value);
}

pub fn record_breaker_rejection(breaker: &str) {
    metrics::counter!("store_breaker_rejections_total", "breaker" => breaker.to_string())
        .increment(1);
}

pub fn record_retry_attempt() {
    metrics::counter!("store_retry_attempts_total").increment(1);
}

pub fn record_idempotency_hit(request_type: &str) {
    metrics::counter!(
        "store_idempotency_total",
        "request_type" => request_type.to_string(),
        "outcome" => "hit"
    )
    .increment(1);
}

pub fn record_idempotency_miss(request_type: &str) {
    metrics::counter!(
        "store_idempotency_total",
        "request_type" => request_type.to_string(),
        "outcome" => "miss"
    )
    .increment(1);
}
