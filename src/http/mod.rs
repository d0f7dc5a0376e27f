//! HTTP request pipeline.
//!
//! # Data Flow
//! ```text
//! caller (get / post / upload / batch / call)
//!     → request.rs (merge defaults, headers, body)
//!     → interceptor.rs (request chain)
//!     → transport.rs (reqwest, abort signal race)
//!     → response.rs (decode JSON or text, classify status)
//!     → interceptor.rs (response chain)
//!     → notify::FailureHook on error
//!     → caller
//! ```

pub mod batch;
pub mod cancel;
pub mod client;
pub mod error;
pub mod interceptor;
pub mod multipart;
pub mod request;
pub mod response;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use batch::{BatchItem, BatchResult};
pub use cancel::{AbortController, AbortSignal};
pub use client::{ApiClient, ApiClientBuilder, ProgressCallback};
pub use error::{ApiError, ApiResult};
pub use interceptor::{Interceptor, InterceptorChain, Recovery, RequestInterceptor, ResponseInterceptor};
pub use multipart::{FileUpload, MultipartForm};
pub use request::{Credentials, Method, Query, RequestBody, RequestConfig, RequestId, RequestOptions, X_REQUEST_ID};
pub use response::{ResponseBody, ResponseEnvelope};
pub use transport::{ReqwestTransport, Transport};
