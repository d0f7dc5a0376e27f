//! The request pipeline.
//!
//! # Responsibilities
//! - Merge defaults, run interceptors, dispatch, decode, classify
//! - Convenience verbs, uploads with progress, batches, named operations
//! - Opt-in retry and timeout on top of `request`
//! - Notify the user about failures through the failure hook
//!
//! # Design Decisions
//! - One `ApiClient` is built at startup and passed to whoever needs it
//! - `request` never retries on its own
//! - Errors always reach the caller; hooks and interceptors only observe
//!   or explicitly recover

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::future::join_all;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use serde_json::Value;

use crate::config::DashboardConfig;
use crate::endpoints::EndpointRegistry;
use crate::http::batch::{BatchItem, BatchResult};
use crate::http::cancel::AbortController;
use crate::http::error::{ApiError, ApiResult};
use crate::http::interceptor::{request_id_interceptor, InterceptorChain, RequestInterceptor, ResponseInterceptor};
use crate::http::multipart::{FileUpload, MultipartForm};
use crate::http::request::{default_headers, Method, Query, RequestBody, RequestConfig, RequestOptions};
use crate::http::response::{ResponseBody, ResponseEnvelope};
use crate::http::transport::{ProgressEvent, ProgressSink, ReqwestTransport, Transport, TransportRequest, TransportResponse};
use crate::notify::{loading_interceptors, FailureHook, LoadingIndicator, Notifier, TracingNotifier};
use crate::observability::metrics;
use crate::resilience::{retry_request, with_timeout, RetryPolicy};

/// Upload progress callback: `(percent, bytes_loaded, bytes_total)`.
pub type ProgressCallback = Arc<dyn Fn(f64, u64, u64) + Send + Sync>;

/// HTTP client for the dashboard backend.
pub struct ApiClient {
    base_url: String,
    default_headers: HeaderMap,
    transport: Arc<dyn Transport>,
    request_interceptors: InterceptorChain<RequestConfig>,
    response_interceptors: InterceptorChain<ResponseEnvelope>,
    failure_hook: FailureHook,
    endpoints: EndpointRegistry,
    default_timeout: Duration,
    retry_policy: RetryPolicy,
    metrics_enabled: bool,
}

/// Builder for `ApiClient`.
pub struct ApiClientBuilder {
    transport: Arc<dyn Transport>,
    base_url: String,
    default_headers: HeaderMap,
    notifier: Arc<dyn Notifier>,
    endpoints: EndpointRegistry,
    default_timeout: Duration,
    retry_policy: RetryPolicy,
    metrics_enabled: bool,
    request_interceptors: Vec<RequestInterceptor>,
    response_interceptors: Vec<ResponseInterceptor>,
}

impl ApiClientBuilder {
    /// Prefix for relative request URLs.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Add or replace a default header.
    pub fn default_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.default_headers.insert(name, value);
        self
    }

    /// Where failure toasts go.
    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn endpoints(mut self, endpoints: EndpointRegistry) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    pub fn metrics(mut self, enabled: bool) -> Self {
        self.metrics_enabled = enabled;
        self
    }

    pub fn request_interceptor(mut self, interceptor: RequestInterceptor) -> Self {
        self.request_interceptors.push(interceptor);
        self
    }

    pub fn response_interceptor(mut self, interceptor: ResponseInterceptor) -> Self {
        self.response_interceptors.push(interceptor);
        self
    }

    pub fn build(self) -> ApiClient {
        let request_interceptors = InterceptorChain::new();
        for interceptor in self.request_interceptors {
            request_interceptors.push(interceptor);
        }
        let response_interceptors = InterceptorChain::new();
        for interceptor in self.response_interceptors {
            response_interceptors.push(interceptor);
        }

        ApiClient {
            base_url: self.base_url,
            default_headers: self.default_headers,
            transport: self.transport,
            request_interceptors,
            response_interceptors,
            failure_hook: FailureHook::new(self.notifier),
            endpoints: self.endpoints,
            default_timeout: self.default_timeout,
            retry_policy: self.retry_policy,
            metrics_enabled: self.metrics_enabled,
        }
    }
}

impl ApiClient {
    /// Start building a client over `transport`.
    pub fn builder(transport: Arc<dyn Transport>) -> ApiClientBuilder {
        ApiClientBuilder {
            transport,
            base_url: String::new(),
            default_headers: default_headers(),
            notifier: Arc::new(TracingNotifier),
            endpoints: EndpointRegistry::with_defaults(),
            default_timeout: Duration::from_millis(30_000),
            retry_policy: RetryPolicy::default(),
            metrics_enabled: false,
            request_interceptors: Vec::new(),
            response_interceptors: Vec::new(),
        }
    }

    /// Build a client with a reqwest transport from configuration.
    pub fn from_config(config: &DashboardConfig, notifier: Arc<dyn Notifier>) -> ApiResult<Self> {
        let transport = ReqwestTransport::new(
            &config.client.base_url,
            &config.client.user_agent,
            Duration::from_millis(config.client.connect_timeout_ms),
        )?;

        let mut builder = ApiClient::builder(Arc::new(transport))
            .base_url(config.client.base_url.clone())
            .notifier(notifier)
            .endpoints(EndpointRegistry::from_config(&config.endpoints)?)
            .default_timeout(Duration::from_millis(config.client.default_timeout_ms))
            .retry_policy(RetryPolicy::from(&config.retry))
            .metrics(config.observability.metrics_enabled);

        for (name, value) in &config.client.headers {
            let name = HeaderName::try_from(name.as_str())
                .map_err(|e| ApiError::InvalidRequest(format!("invalid header name '{}': {}", name, e)))?;
            let value = HeaderValue::try_from(value.as_str())
                .map_err(|e| ApiError::InvalidRequest(format!("invalid header value: {}", e)))?;
            builder = builder.default_header(name, value);
        }
        if config.client.request_id {
            builder = builder.request_interceptor(request_id_interceptor());
        }

        tracing::info!(
            base_url = %config.client.base_url,
            default_timeout_ms = config.client.default_timeout_ms,
            endpoints = builder.endpoints.len(),
            "API client configured"
        );

        Ok(builder.build())
    }

    /// Append a request interceptor.
    pub fn add_request_interceptor(&self, interceptor: RequestInterceptor) {
        self.request_interceptors.push(interceptor);
    }

    /// Append a response interceptor.
    pub fn add_response_interceptor(&self, interceptor: ResponseInterceptor) {
        self.response_interceptors.push(interceptor);
    }

    /// Show `indicator` while non-background requests are in flight.
    pub fn install_loading_indicator(&self, indicator: Arc<dyn LoadingIndicator>) {
        let (request, response) = loading_interceptors(indicator);
        self.add_request_interceptor(request);
        self.add_response_interceptor(response);
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn endpoints(&self) -> &EndpointRegistry {
        &self.endpoints
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// A controller whose signal can be placed in `RequestOptions`.
    pub fn create_abort_controller(&self) -> AbortController {
        AbortController::new()
    }

    fn resolve_url(&self, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else {
            format!("{}{}", self.base_url, url)
        }
    }

    /// Run a request through the full pipeline.
    pub async fn request(&self, url: &str, options: RequestOptions) -> ApiResult<ResponseEnvelope> {
        self.execute(url, options, None).await
    }

    async fn execute(
        &self,
        url: &str,
        options: RequestOptions,
        progress: Option<ProgressSink>,
    ) -> ApiResult<ResponseEnvelope> {
        let started = Instant::now();
        let config = RequestConfig::merge(self.resolve_url(url), &self.default_headers, options);
        let method = config.method.clone();
        let timeout = config.timeout;

        // The deadline covers the forward half only, so a timeout still
        // travels through the response chain like any other failure.
        let forward = async {
            match self.request_interceptors.apply(Ok(config)).await {
                Ok(config) => self.dispatch(config, progress).await,
                Err(err) => Err(err),
            }
        };
        let outcome = match timeout {
            Some(timeout) => with_timeout(timeout, forward).await,
            None => forward.await,
        };
        let outcome = self.response_interceptors.apply(outcome).await;

        if self.metrics_enabled {
            metrics::record_request(&method, &outcome, started.elapsed());
        }
        if let Err(err) = &outcome {
            self.failure_hook.observe(err, self.transport.is_online());
        }
        outcome
    }

    async fn dispatch(&self, config: RequestConfig, progress: Option<ProgressSink>) -> ApiResult<ResponseEnvelope> {
        let signal = config.signal.clone();
        if signal.as_ref().is_some_and(|s| s.is_aborted()) {
            return Err(ApiError::Cancelled);
        }

        let request_id = config.request_id().map(str::to_owned);
        let request = TransportRequest::from_config(config)?;
        tracing::debug!(
            method = %request.method,
            url = %request.url,
            request_id = request_id.as_deref().unwrap_or("-"),
            "Dispatching request"
        );

        let send = async {
            match progress {
                Some(sink) => self.transport.send_with_progress(request, sink).await,
                None => self.transport.send(request).await,
            }
        };

        let response = match signal {
            Some(signal) => tokio::select! {
                response = send => response,
                _ = signal.aborted() => {
                    tracing::debug!(request_id = request_id.as_deref().unwrap_or("-"), "Request aborted");
                    Err(ApiError::Cancelled)
                }
            },
            None => send.await,
        }?;

        tracing::debug!(
            status = response.status,
            request_id = request_id.as_deref().unwrap_or("-"),
            "Response received"
        );
        process_response(response)
    }

    /// GET with `params` appended as a query string.
    pub async fn get(&self, url: &str, params: &Query, options: RequestOptions) -> ApiResult<ResponseEnvelope> {
        let url = params.append_to(url);
        self.request(&url, with_method(Method::GET, options)).await
    }

    /// POST `data` (an empty JSON object when `None`).
    pub async fn post(&self, url: &str, data: Option<RequestBody>, options: RequestOptions) -> ApiResult<ResponseEnvelope> {
        self.request(url, with_body(Method::POST, data, options)).await
    }

    pub async fn put(&self, url: &str, data: Option<RequestBody>, options: RequestOptions) -> ApiResult<ResponseEnvelope> {
        self.request(url, with_body(Method::PUT, data, options)).await
    }

    pub async fn patch(&self, url: &str, data: Option<RequestBody>, options: RequestOptions) -> ApiResult<ResponseEnvelope> {
        self.request(url, with_body(Method::PATCH, data, options)).await
    }

    pub async fn delete(&self, url: &str, options: RequestOptions) -> ApiResult<ResponseEnvelope> {
        self.request(url, with_method(Method::DELETE, options)).await
    }

    /// Upload `file` under the `file` field, followed by `extra_fields`.
    ///
    /// With `on_progress` the request goes through the transport's progress
    /// path; the callback only fires for events with a known total.
    pub async fn upload<I, K, V>(
        &self,
        url: &str,
        file: FileUpload,
        extra_fields: I,
        on_progress: Option<ProgressCallback>,
    ) -> ApiResult<ResponseEnvelope>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut form = MultipartForm::new().file("file", file);
        for (name, value) in extra_fields {
            form = form.text(name, value);
        }
        let options = RequestOptions::new().method(Method::POST).body(form);

        match on_progress {
            None => self.request(url, options).await,
            Some(callback) => {
                if !self.transport.supports_progress() {
                    return Err(ApiError::InvalidRequest(
                        "transport cannot report upload progress".to_string(),
                    ));
                }
                self.execute(url, options, Some(progress_sink(callback))).await
            }
        }
    }

    /// Retry `f` with this client's retry policy.
    pub async fn retry_request<F, Fut, T>(&self, f: F) -> ApiResult<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = ApiResult<T>>,
    {
        retry_request(&self.retry_policy, f).await
    }

    /// `request` with a deadline (the configured default when `None`).
    ///
    /// On expiry the in-flight transport call is dropped and
    /// `ApiError::Timeout` goes through the response chain and failure hook.
    pub async fn request_with_timeout(
        &self,
        url: &str,
        options: RequestOptions,
        timeout: Option<Duration>,
    ) -> ApiResult<ResponseEnvelope> {
        let options = options.timeout(timeout.unwrap_or(self.default_timeout));
        self.request(url, options).await
    }

    /// Run every item concurrently; results come back in input order.
    pub async fn batch(&self, items: Vec<BatchItem>) -> Vec<BatchResult> {
        let outcomes = join_all(
            items
                .iter()
                .map(|item| self.request(&item.url, item.to_options())),
        )
        .await;

        let results: Vec<BatchResult> = items
            .into_iter()
            .zip(outcomes)
            .map(|(item, outcome)| BatchResult::new(item, outcome))
            .collect();
        tracing::debug!(
            total = results.len(),
            failed = results.iter().filter(|r| !r.success).count(),
            "Batch finished"
        );
        results
    }

    /// Call a named operation from the endpoint registry.
    ///
    /// `params` fill the path template; the rest become the query string.
    /// Returns the decoded response body.
    pub async fn call(&self, operation: &str, params: &Query, data: Option<Value>) -> ApiResult<ResponseBody> {
        let resolved = self.endpoints.resolve(operation, params)?;
        let url = resolved.query.append_to(&resolved.path);
        tracing::debug!(operation, method = %resolved.method, url = %url, "Calling operation");

        let options = if resolved.method == Method::GET || resolved.method == Method::DELETE {
            with_method(resolved.method, RequestOptions::new())
        } else {
            with_body(resolved.method, data.map(RequestBody::Json), RequestOptions::new())
        };
        Ok(self.request(&url, options).await?.data)
    }
}

fn with_method(method: Method, mut options: RequestOptions) -> RequestOptions {
    if options.method.is_none() {
        options.method = Some(method);
    }
    options
}

fn with_body(method: Method, data: Option<RequestBody>, options: RequestOptions) -> RequestOptions {
    let mut options = with_method(method, options);
    if options.body.is_none() {
        options.body = Some(data.unwrap_or_else(|| RequestBody::Json(Value::Object(Default::default()))));
    }
    options
}

/// Decode a transport response and classify its status.
fn process_response(response: TransportResponse) -> ApiResult<ResponseEnvelope> {
    let content_type = response
        .headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());
    let success = (200..300).contains(&response.status);
    let data = match ResponseBody::decode(content_type, &response.body) {
        Ok(data) => data,
        // Error pages often lie about their content type.
        Err(_) if !success => ResponseBody::Text(String::from_utf8_lossy(&response.body).into_owned()),
        Err(err) => return Err(err),
    };

    if !success {
        return Err(ApiError::from_status(response.status, &response.status_text, data));
    }

    Ok(ResponseEnvelope {
        data,
        status: response.status,
        status_text: response.status_text,
        headers: response.headers,
    })
}

/// Adapt a user callback to transport progress events.
///
/// Events without a known, non-zero total are dropped. Percentages never
/// decrease and never exceed 100.
fn progress_sink(callback: ProgressCallback) -> ProgressSink {
    // Non-negative f64 bit patterns order the same way as the values.
    let last_percent = AtomicU64::new(0f64.to_bits());
    Arc::new(move |event: ProgressEvent| {
        let Some(total) = event.total.filter(|t| *t > 0) else {
            return;
        };
        let loaded = event.loaded.min(total);
        let percent = loaded as f64 / total as f64 * 100.0;
        let previous = last_percent.fetch_max(percent.to_bits(), Ordering::SeqCst);
        callback(percent.max(f64::from_bits(previous)), loaded, total);
    })
}
