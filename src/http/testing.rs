//! Scripted in-memory transport for unit tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde_json::Value;

use crate::http::error::ApiResult;
use crate::http::transport::{ProgressEvent, ProgressSink, Transport, TransportRequest, TransportResponse};

type Handler = Arc<dyn Fn(TransportRequest) -> BoxFuture<'static, ApiResult<TransportResponse>> + Send + Sync>;

/// A transport answering every request through a closure.
pub struct MockTransport {
    handler: Handler,
    pub requests: Mutex<Vec<TransportRequest>>,
    pub calls: AtomicUsize,
    pub online: AtomicBool,
    progress_events: Option<Vec<ProgressEvent>>,
}

impl MockTransport {
    pub fn new<F, Fut>(handler: F) -> Self
    where
        F: Fn(TransportRequest) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = ApiResult<TransportResponse>> + Send + 'static,
    {
        Self {
            handler: Arc::new(move |request| handler(request).boxed()),
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            online: AtomicBool::new(true),
            progress_events: None,
        }
    }

    /// Answer every request with the same JSON response.
    pub fn json(status: u16, body: Value) -> Self {
        Self::new(move |_| {
            let response = json_response(status, &body);
            async move { Ok(response) }
        })
    }

    /// Support progress, emitting `events` before answering.
    pub fn with_progress(mut self, events: Vec<ProgressEvent>) -> Self {
        self.progress_events = Some(events);
        self
    }

    pub fn last_request(&self) -> TransportRequest {
        self.requests
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no request recorded")
    }

    fn record(&self, request: &TransportRequest) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
    }
}

impl Transport for MockTransport {
    fn send(&self, request: TransportRequest) -> BoxFuture<'_, ApiResult<TransportResponse>> {
        self.record(&request);
        (self.handler)(request)
    }

    fn supports_progress(&self) -> bool {
        self.progress_events.is_some()
    }

    fn send_with_progress(
        &self,
        request: TransportRequest,
        progress: ProgressSink,
    ) -> BoxFuture<'_, ApiResult<TransportResponse>> {
        self.record(&request);
        for event in self.progress_events.iter().flatten() {
            progress(*event);
        }
        (self.handler)(request)
    }

    fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}

/// A response with a JSON body.
pub fn json_response(status: u16, body: &Value) -> TransportResponse {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    TransportResponse {
        status,
        status_text: reqwest::StatusCode::from_u16(status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or_default()
            .to_string(),
        headers,
        body: serde_json::to_vec(body).unwrap(),
    }
}

/// A response with a plain-text body.
pub fn text_response(status: u16, body: &str) -> TransportResponse {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
    TransportResponse {
        status,
        status_text: String::new(),
        headers,
        body: body.as_bytes().to_vec(),
    }
}
