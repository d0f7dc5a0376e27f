//! Request description and per-call options.
//!
//! # Responsibilities
//! - Describe an outgoing request as plain data (`RequestConfig`)
//! - Merge caller options over the client's default headers
//! - Serialize query parameters in insertion order
//! - Generate request IDs
//!
//! # Design Decisions
//! - Header keys are case-insensitive (`HeaderMap`)
//! - Bodies stay structured until dispatch so interceptors can inspect them
//! - Multipart bodies never carry an explicit content type here; the
//!   transport sets it together with the boundary

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

pub use reqwest::Method;

use crate::http::cancel::AbortSignal;
use crate::http::error::{ApiError, ApiResult};
use crate::http::multipart::MultipartForm;

/// Header carrying the request ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Marker header sent on every request.
pub const X_REQUESTED_WITH: &str = "x-requested-with";

/// Unique identifier attached to a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(pub String);

impl RequestId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Credential policy applied by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Credentials {
    /// Send cookies only to the client's own origin.
    #[default]
    SameOrigin,
    /// Always send cookies.
    Include,
    /// Never send cookies.
    Omit,
}

/// Request payload.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Raw(Vec<u8>),
    Json(Value),
    Multipart(MultipartForm),
}

impl RequestBody {
    /// Serialize any value into a JSON body.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> ApiResult<Self> {
        serde_json::to_value(value)
            .map(RequestBody::Json)
            .map_err(|e| ApiError::InvalidRequest(format!("body serialization failed: {}", e)))
    }

    pub fn is_multipart(&self) -> bool {
        matches!(self, RequestBody::Multipart(_))
    }
}

impl From<Value> for RequestBody {
    fn from(value: Value) -> Self {
        RequestBody::Json(value)
    }
}

impl From<MultipartForm> for RequestBody {
    fn from(form: MultipartForm) -> Self {
        RequestBody::Multipart(form)
    }
}

/// Caller-side overrides for a single request.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub method: Option<Method>,
    pub headers: HeaderMap,
    pub body: Option<RequestBody>,
    pub signal: Option<AbortSignal>,
    pub background: bool,
    pub credentials: Option<Credentials>,
    /// Deadline for the whole pipeline run, interceptors included.
    pub timeout: Option<Duration>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    /// Add a header. Invalid names or values are logged and skipped.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        match (HeaderName::try_from(name), HeaderValue::try_from(value)) {
            (Ok(name), Ok(value)) => {
                self.headers.insert(name, value);
            }
            _ => tracing::warn!(header = %name, "Ignoring invalid header"),
        }
        self
    }

    pub fn body(mut self, body: impl Into<RequestBody>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn signal(mut self, signal: AbortSignal) -> Self {
        self.signal = Some(signal);
        self
    }

    /// Suppress the global loading indicator for this request.
    pub fn background(mut self) -> Self {
        self.background = true;
        self
    }

    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// A fully merged request, as seen by interceptors and the transport.
#[derive(Debug, Clone)]
pub struct RequestConfig {
    pub url: String,
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Option<RequestBody>,
    pub signal: Option<AbortSignal>,
    pub background: bool,
    pub credentials: Credentials,
    pub timeout: Option<Duration>,
}

impl RequestConfig {
    /// Merge `options` over `defaults`.
    ///
    /// Option headers win over defaults. A multipart body drops any
    /// `Content-Type` so the transport can set the boundary.
    pub fn merge(url: String, defaults: &HeaderMap, options: RequestOptions) -> Self {
        let mut headers = defaults.clone();
        for (name, value) in options.headers.iter() {
            headers.insert(name.clone(), value.clone());
        }
        if options.body.as_ref().is_some_and(RequestBody::is_multipart) {
            headers.remove(CONTENT_TYPE);
        }

        Self {
            url,
            method: options.method.unwrap_or(Method::GET),
            headers,
            body: options.body,
            signal: options.signal,
            background: options.background,
            credentials: options.credentials.unwrap_or_default(),
            timeout: options.timeout,
        }
    }

    pub fn request_id(&self) -> Option<&str> {
        self.headers.get(X_REQUEST_ID).and_then(|v| v.to_str().ok())
    }
}

/// Query parameters, kept in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    pairs: Vec<(String, String)>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.pairs.push((key.into(), value.to_string()));
        self
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl ToString) {
        self.pairs.push((key.into(), value.to_string()));
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    /// Form-urlencoded query string, without the leading `?`.
    pub fn encode(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.pairs.iter())
            .finish()
    }

    /// Append this query to `url`. An empty query leaves `url` untouched.
    pub fn append_to(&self, url: &str) -> String {
        if self.is_empty() {
            return url.to_string();
        }
        let separator = if url.contains('?') { '&' } else { '?' };
        format!("{}{}{}", url, separator, self.encode())
    }
}

impl<K: Into<String>, V: ToString> FromIterator<(K, V)> for Query {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut query = Query::new();
        for (k, v) in iter {
            query.push(k, v);
        }
        query
    }
}

/// Headers sent on every request unless overridden.
pub fn default_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(X_REQUESTED_WITH, HeaderValue::from_static("XMLHttpRequest"));
    headers
}
