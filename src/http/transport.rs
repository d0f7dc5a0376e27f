//! Transport abstraction and the reqwest-backed implementation.
//!
//! # Responsibilities
//! - Execute a fully built request and hand back status, headers and bytes
//! - Apply the credential policy (cookie jar only where allowed)
//! - Lower multipart forms to reqwest forms and report upload progress
//! - Track whether the last attempt found the network reachable
//!
//! # Design Decisions
//! - The pipeline never sees reqwest types beyond `HeaderMap` and `Method`
//! - Progress reporting is an explicit, separate entry point; transports
//!   that cannot report progress refuse it instead of silently ignoring it
//! - Non-2xx statuses are data here, not errors

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::{FutureExt, Stream};
use reqwest::header::{HeaderMap, CONTENT_LENGTH};
use reqwest::multipart::{Form, Part as FormPart};
use reqwest::{Client, Method};
use url::{Origin, Url};

use crate::http::error::{ApiError, ApiResult};
use crate::http::multipart::{MultipartForm, Part};
use crate::http::request::{Credentials, RequestBody, RequestConfig};

/// Body as handed to the transport.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportBody {
    Empty,
    Bytes(Vec<u8>),
    Multipart(MultipartForm),
}

/// A request ready for the wire.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: TransportBody,
    pub credentials: Credentials,
}

impl TransportRequest {
    /// Lower a request config, serializing JSON bodies.
    pub fn from_config(config: RequestConfig) -> ApiResult<Self> {
        let body = match config.body {
            None => TransportBody::Empty,
            Some(RequestBody::Raw(bytes)) => TransportBody::Bytes(bytes),
            Some(RequestBody::Json(value)) => TransportBody::Bytes(
                serde_json::to_vec(&value)
                    .map_err(|e| ApiError::InvalidRequest(format!("body serialization failed: {}", e)))?,
            ),
            Some(RequestBody::Multipart(form)) => TransportBody::Multipart(form),
        };

        Ok(Self {
            method: config.method,
            url: config.url,
            headers: config.headers,
            body,
            credentials: config.credentials,
        })
    }
}

/// What came back from the server, whatever the status.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub status_text: String,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

/// A byte-level upload progress notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressEvent {
    pub loaded: u64,
    /// `None` when the transport cannot tell the full size.
    pub total: Option<u64>,
}

/// Receiver of progress events.
pub type ProgressSink = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// Executes requests on behalf of the pipeline.
pub trait Transport: Send + Sync {
    /// Send a request and collect the full response.
    fn send(&self, request: TransportRequest) -> BoxFuture<'_, ApiResult<TransportResponse>>;

    /// Whether `send_with_progress` is implemented.
    fn supports_progress(&self) -> bool {
        false
    }

    /// Send a request, reporting upload progress to `progress`.
    fn send_with_progress(
        &self,
        request: TransportRequest,
        progress: ProgressSink,
    ) -> BoxFuture<'_, ApiResult<TransportResponse>> {
        let _ = (request, progress);
        async {
            Err(ApiError::InvalidRequest(
                "transport cannot report upload progress".to_string(),
            ))
        }
        .boxed()
    }

    /// False once the transport has seen that the network is unreachable.
    fn is_online(&self) -> bool {
        true
    }
}

/// Upload chunk size used when streaming with progress.
const PROGRESS_CHUNK_SIZE: usize = 16 * 1024;

/// `Transport` over reqwest.
pub struct ReqwestTransport {
    cookie_client: Client,
    plain_client: Client,
    origin: Option<Origin>,
    online: AtomicBool,
    chunk_size: usize,
}

impl ReqwestTransport {
    /// Create a transport whose "own origin" is that of `base_url`.
    ///
    /// A relative or empty base URL has no origin; same-origin requests then
    /// never carry cookies.
    pub fn new(base_url: &str, user_agent: &str, connect_timeout: Duration) -> ApiResult<Self> {
        let build = |cookies: bool| {
            Client::builder()
                .user_agent(user_agent)
                .connect_timeout(connect_timeout)
                .cookie_store(cookies)
                .build()
                .map_err(|e| ApiError::InvalidRequest(format!("failed to build HTTP client: {}", e)))
        };

        let origin = Url::parse(base_url).ok().map(|url| url.origin());

        Ok(Self {
            cookie_client: build(true)?,
            plain_client: build(false)?,
            origin,
            online: AtomicBool::new(true),
            chunk_size: PROGRESS_CHUNK_SIZE,
        })
    }

    /// Override the progress chunk size.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    fn sends_cookies(&self, url: &Url, credentials: Credentials) -> bool {
        match credentials {
            Credentials::Include => true,
            Credentials::Omit => false,
            Credentials::SameOrigin => self
                .origin
                .as_ref()
                .is_some_and(|origin| *origin == url.origin()),
        }
    }

    fn builder(&self, request: &TransportRequest) -> ApiResult<(reqwest::RequestBuilder, Url)> {
        let url = Url::parse(&request.url)
            .map_err(|e| ApiError::InvalidRequest(format!("invalid URL '{}': {}", request.url, e)))?;
        let client = if self.sends_cookies(&url, request.credentials) {
            &self.cookie_client
        } else {
            &self.plain_client
        };
        let builder = client
            .request(request.method.clone(), url.clone())
            .headers(request.headers.clone());
        Ok((builder, url))
    }

    async fn execute(&self, builder: reqwest::RequestBuilder, url: &Url) -> ApiResult<TransportResponse> {
        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => return Err(self.network_error(url, e)),
        };
        self.online.store(true, Ordering::Relaxed);

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| self.network_error(url, e))?
            .to_vec();

        Ok(TransportResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body,
        })
    }

    fn network_error(&self, url: &Url, e: reqwest::Error) -> ApiError {
        let offline = e.is_connect();
        if offline {
            self.online.store(false, Ordering::Relaxed);
        }
        tracing::warn!(url = %url, error = %e, offline, "Transport failure");
        ApiError::Network {
            message: e.to_string(),
            offline,
        }
    }
}

/// Lower a form to reqwest. With `progress`, file parts are streamed in
/// `chunk_size` pieces and report bytes as reqwest pulls them.
fn reqwest_form(form: &MultipartForm, progress: Option<(&ProgressSink, usize)>) -> ApiResult<Form> {
    let total: u64 = form
        .parts()
        .iter()
        .map(|part| match part {
            Part::File { file, .. } => file.bytes.len() as u64,
            Part::Text { .. } => 0,
        })
        .sum();
    let loaded = Arc::new(AtomicU64::new(0));

    let mut lowered = Form::new();
    for part in form.parts() {
        lowered = match part {
            Part::Text { name, value } => lowered.text(name.clone(), value.clone()),
            Part::File { name, file } => {
                let body = match progress {
                    Some((sink, chunk_size)) => {
                        let stream =
                            progress_stream(file.bytes.clone(), chunk_size, loaded.clone(), total, sink.clone());
                        FormPart::stream_with_length(reqwest::Body::wrap_stream(stream), file.bytes.len() as u64)
                    }
                    None => FormPart::bytes(file.bytes.clone()),
                };
                let body = body
                    .file_name(file.file_name.clone())
                    .mime_str(&file.content_type)
                    .map_err(|e| ApiError::InvalidRequest(format!("invalid content type '{}': {}", file.content_type, e)))?;
                lowered.part(name.clone(), body)
            }
        };
    }
    Ok(lowered)
}

/// Chunked byte stream that adds each chunk to `loaded` and reports it.
fn progress_stream(
    bytes: Vec<u8>,
    chunk_size: usize,
    loaded: Arc<AtomicU64>,
    total: u64,
    sink: ProgressSink,
) -> impl Stream<Item = Result<Vec<u8>, std::io::Error>> + Send + 'static {
    let chunks: Vec<Vec<u8>> = bytes.chunks(chunk_size).map(<[u8]>::to_vec).collect();
    futures_util::stream::iter(chunks.into_iter().map(move |chunk| {
        let size = chunk.len() as u64;
        let loaded = loaded.fetch_add(size, Ordering::Relaxed) + size;
        sink(ProgressEvent {
            loaded,
            total: Some(total),
        });
        Ok(chunk)
    }))
}

impl Transport for ReqwestTransport {
    fn send(&self, request: TransportRequest) -> BoxFuture<'_, ApiResult<TransportResponse>> {
        async move {
            let (builder, url) = self.builder(&request)?;
            let builder = match &request.body {
                TransportBody::Empty => builder,
                TransportBody::Bytes(bytes) => builder.body(bytes.clone()),
                TransportBody::Multipart(form) => builder.multipart(reqwest_form(form, None)?),
            };
            self.execute(builder, &url).await
        }
        .boxed()
    }

    fn supports_progress(&self) -> bool {
        true
    }

    fn send_with_progress(
        &self,
        request: TransportRequest,
        progress: ProgressSink,
    ) -> BoxFuture<'_, ApiResult<TransportResponse>> {
        async move {
            let (builder, url) = self.builder(&request)?;
            let builder = match &request.body {
                TransportBody::Multipart(form) => builder.multipart(reqwest_form(form, Some((&progress, self.chunk_size)))?),
                TransportBody::Empty => builder,
                TransportBody::Bytes(bytes) => {
                    let total = bytes.len() as u64;
                    let stream = progress_stream(
                        bytes.clone(),
                        self.chunk_size,
                        Arc::new(AtomicU64::new(0)),
                        total,
                        progress.clone(),
                    );
                    builder
                        .header(CONTENT_LENGTH, total)
                        .body(reqwest::Body::wrap_stream(stream))
                }
            };
            self.execute(builder, &url).await
        }
        .boxed()
    }

    fn is_online(&self) -> bool {
        self.online.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::multipart::FileUpload;
    use crate::http::request::{default_headers, RequestOptions};
    use futures_util::StreamExt;
    use serde_json::json;
    use std::sync::Mutex;

    fn transport() -> ReqwestTransport {
        ReqwestTransport::new("http://dashboard.local:8080", "test", Duration::from_secs(1)).unwrap()
    }

    #[test]
    fn test_same_origin_cookie_policy() {
        let t = transport();
        let own = Url::parse("http://dashboard.local:8080/api/posts").unwrap();
        let other = Url::parse("http://cdn.example.com/x").unwrap();

        assert!(t.sends_cookies(&own, Credentials::SameOrigin));
        assert!(!t.sends_cookies(&other, Credentials::SameOrigin));
        assert!(t.sends_cookies(&other, Credentials::Include));
        assert!(!t.sends_cookies(&own, Credentials::Omit));
    }

    #[test]
    fn test_relative_base_has_no_origin() {
        let t = ReqwestTransport::new("", "test", Duration::from_secs(1)).unwrap();
        let url = Url::parse("http://localhost/api").unwrap();
        assert!(!t.sends_cookies(&url, Credentials::SameOrigin));
    }

    #[test]
    fn test_json_body_lowered_to_bytes() {
        let config = RequestConfig::merge(
            "http://x/api".into(),
            &default_headers(),
            RequestOptions::new().method(Method::POST).body(json!({"a": 1})),
        );
        let request = TransportRequest::from_config(config).unwrap();
        assert_eq!(request.body, TransportBody::Bytes(br#"{"a":1}"#.to_vec()));
        assert_eq!(request.method, Method::POST);
    }

    #[tokio::test]
    async fn test_invalid_url_rejected() {
        let t = transport();
        let request = TransportRequest {
            method: Method::GET,
            url: "/relative/only".into(),
            headers: HeaderMap::new(),
            body: TransportBody::Empty,
            credentials: Credentials::SameOrigin,
        };
        let err = t.send(request).await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidRequest(_)));
    }

    #[test]
    fn test_multipart_form_lowered_with_boundary() {
        let form = MultipartForm::new()
            .text("caption", "hi")
            .file("file", FileUpload::new("a.png", "image/png", vec![0; 8]));
        let lowered = reqwest_form(&form, None).unwrap();
        assert!(!lowered.boundary().is_empty());
    }

    #[test]
    fn test_bad_file_content_type_rejected() {
        let form = MultipartForm::new().file("file", FileUpload::new("a.bin", "not a mime", vec![1]));
        let err = reqwest_form(&form, None).unwrap_err();
        assert!(matches!(err, ApiError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_progress_shared_across_files() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let recorder = events.clone();
        let sink: ProgressSink = Arc::new(move |event| recorder.lock().unwrap().push(event));
        let loaded = Arc::new(AtomicU64::new(0));

        let first: Vec<_> = progress_stream(vec![0; 10], 4, loaded.clone(), 15, sink.clone()).collect().await;
        let second: Vec<_> = progress_stream(vec![0; 5], 4, loaded, 15, sink).collect().await;
        assert_eq!(first.len(), 3);
        assert_eq!(second.len(), 2);

        let loaded: Vec<u64> = events.lock().unwrap().iter().map(|e| e.loaded).collect();
        assert_eq!(loaded, vec![4, 8, 10, 14, 15]);
        assert!(events.lock().unwrap().iter().all(|e| e.total == Some(15)));
    }
}
