//! Error taxonomy for the request pipeline.

use std::time::Duration;
use thiserror::Error;

use crate::http::response::ResponseBody;

/// Errors that can leave the request pipeline.
///
/// Every variant is `Clone` so batch results, failure hooks and interceptors
/// can hold on to an error without taking it away from the caller.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// The server answered with a non-2xx status.
    #[error("{message}")]
    Http {
        status: u16,
        status_text: String,
        message: String,
        body: ResponseBody,
    },

    /// No response was received (DNS, refused connection, reset).
    #[error("Network error: {message}")]
    Network { message: String, offline: bool },

    /// The client-side deadline expired before a response arrived.
    #[error("Request timeout after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// The request was aborted through its cancellation signal.
    #[error("Request cancelled")]
    Cancelled,

    /// The response declared JSON but the body did not parse.
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// The request could not be built (bad URL, header, template, body).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// An interceptor handler failed.
    #[error("Interceptor failed: {0}")]
    Interceptor(String),
}

/// Result type for pipeline operations.
pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    /// Build an HTTP error from a decoded error body.
    ///
    /// The message comes from the body's `message` field when present,
    /// otherwise `HTTP {status}: {status_text}`.
    pub fn from_status(status: u16, status_text: &str, body: ResponseBody) -> Self {
        let message = body
            .message()
            .map(str::to_owned)
            .unwrap_or_else(|| format!("HTTP {}: {}", status, status_text));
        ApiError::Http {
            status,
            status_text: status_text.to_string(),
            message,
            body,
        }
    }

    /// Status code for HTTP failures.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ApiError::Timeout(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ApiError::Cancelled)
    }

    /// True when the transport reported that there is no connectivity.
    pub fn is_offline(&self) -> bool {
        matches!(self, ApiError::Network { offline: true, .. })
    }

    /// Label used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Http { .. } => "http",
            ApiError::Network { .. } => "network",
            ApiError::Timeout(_) => "timeout",
            ApiError::Cancelled => "cancelled",
            ApiError::Decode(_) => "decode",
            ApiError::InvalidRequest(_) => "invalid_request",
            ApiError::Interceptor(_) => "interceptor",
        }
    }
}
