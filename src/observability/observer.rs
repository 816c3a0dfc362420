//! Default dispatch observer: structured logs plus outcome counters.

use crate::filter::{EvalError, RequestView, Verdict};
use crate::http::dispatch::{DispatchObserver, Forwarded};
use crate::http::request::RequestId;
use crate::observability::metrics;

/// Logs every dispatch event with its correlation id.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingObserver;

impl DispatchObserver for LoggingObserver {
    fn on_processing(&self, id: &RequestId, req: &RequestView) {
        tracing::debug!(
            request_id = %id,
            method = %req.method(),
            path = %req.path(),
            "Processing request"
        );
    }

    fn on_allowed(&self, id: &RequestId, forwarded: &Forwarded<'_>) {
        metrics::record_outcome(metrics::OUTCOME_ALLOWED);
        tracing::info!(
            request_id = %id,
            method = %forwarded.method,
            path = %forwarded.path,
            status = forwarded.status.as_u16(),
            "Request allowed"
        );
    }

    fn on_denied(&self, id: &RequestId, req: &RequestView, verdict: &Verdict) {
        metrics::record_outcome(metrics::OUTCOME_DENIED);
        tracing::info!(
            request_id = %id,
            method = %req.method(),
            path = %req.path(),
            user_agent = %req.user_agent(),
            forwarded_for = req.forwarded_for().unwrap_or_default(),
            ruleset = ?verdict.ruleset,
            "Request denied"
        );
    }

    fn on_error(&self, id: &RequestId, err: &EvalError) {
        metrics::record_outcome(metrics::OUTCOME_FAILED_OPEN);
        tracing::warn!(
            request_id = %id,
            error = %err,
            "Rule evaluation failed, forwarding request"
        );
    }
}
