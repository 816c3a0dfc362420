//! Metrics collection and exposition.
//!
//! # Metrics
//! - `shield_requests_total` (counter): requests by outcome
//!   (`allowed`, `denied`, `failed_open`); `failed_open` requests are
//!   also counted as `allowed`
//! - `shield_evaluation_duration_seconds` (histogram): policy evaluation
//!   time, body buffering included
//!
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

pub const REQUESTS_TOTAL: &str = "shield_requests_total";
pub const EVALUATION_DURATION: &str = "shield_evaluation_duration_seconds";

/// Outcome label values.
pub const OUTCOME_ALLOWED: &str = "allowed";
pub const OUTCOME_DENIED: &str = "denied";
pub const OUTCOME_FAILED_OPEN: &str = "failed_open";

/// Install the Prometheus recorder and serve it on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;

    describe_counter!(REQUESTS_TOTAL, "Inbound requests by filtering outcome");
    describe_histogram!(
        EVALUATION_DURATION,
        Unit::Seconds,
        "Time spent evaluating the policy per request"
    );

    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_outcome(outcome: &'static str) {
    counter!(REQUESTS_TOTAL, "outcome" => outcome).increment(1);
}

pub fn record_evaluation(elapsed: Duration) {
    histogram!(EVALUATION_DURATION).record(elapsed.as_secs_f64());
}
