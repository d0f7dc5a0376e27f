//! Loading indication driven by interceptors.

use std::sync::Arc;

use crate::http::interceptor::{Interceptor, RequestInterceptor, ResponseInterceptor};
use crate::http::request::RequestConfig;
use crate::http::response::ResponseEnvelope;

/// A global "work in progress" indicator.
pub trait LoadingIndicator: Send + Sync {
    fn show_loading(&self);
    fn hide_loading(&self);
}

/// Indicator that logs transitions at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLoadingIndicator;

impl LoadingIndicator for TracingLoadingIndicator {
    fn show_loading(&self) {
        tracing::debug!("loading shown");
    }

    fn hide_loading(&self) {
        tracing::debug!("loading hidden");
    }
}

/// Interceptor pair wiring `indicator` into the pipeline.
///
/// The request side shows loading for every non-background request. The
/// response side hides it on success and on failure, rethrowing failures.
pub fn loading_interceptors(indicator: Arc<dyn LoadingIndicator>) -> (RequestInterceptor, ResponseInterceptor) {
    let show = indicator.clone();
    let request = Interceptor::new().map(move |config: RequestConfig| {
        if !config.background {
            show.show_loading();
        }
        Ok(config)
    });

    let hide_ok = indicator.clone();
    let hide_err = indicator;
    let response = Interceptor::new()
        .map(move |envelope: ResponseEnvelope| {
            hide_ok.hide_loading();
            Ok(envelope)
        })
        .observe_errors(move |_| hide_err.hide_loading());

    (request, response)
}
