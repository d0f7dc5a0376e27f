//! Request metrics.
//!
//! # Metrics
//! - `dashboard_client_requests_total` (counter): requests by method, outcome
//! - `dashboard_client_request_duration_seconds` (histogram): latency by method

use std::time::Duration;

use crate::http::error::ApiResult;
use crate::http::request::Method;
use crate::http::response::ResponseEnvelope;

/// Outcome label for a finished request: the status class or the error kind.
pub fn outcome_label(outcome: &ApiResult<ResponseEnvelope>) -> &'static str {
    match outcome {
        Ok(_) => "2xx",
        Err(err) => match err.status() {
            Some(status) if status >= 500 => "5xx",
            Some(status) if status >= 400 => "4xx",
            Some(_) => "other",
            None => err.kind(),
        },
    }
}

pub fn record_request(method: &Method, outcome: &ApiResult<ResponseEnvelope>, elapsed: Duration) {
    let method = method.as_str().to_string();
    metrics::counter!(
        "dashboard_client_requests_total",
        "method" => method.clone(),
        "outcome" => outcome_label(outcome)
    )
    .increment(1);
    metrics::histogram!("dashboard_client_request_duration_seconds", "method" => method)
        .record(elapsed.as_secs_f64());
}
