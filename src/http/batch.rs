//! Batched request types.

use serde_json::Value;

use crate::http::error::{ApiError, ApiResult};
use crate::http::request::{Method, RequestBody, RequestOptions};
use crate::http::response::{ResponseBody, ResponseEnvelope};

/// One request of a batch.
#[derive(Debug, Clone)]
pub struct BatchItem {
    pub url: String,
    pub method: Method,
    pub data: Option<RequestBody>,
    pub options: Option<RequestOptions>,
}

impl BatchItem {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method,
            data: None,
            options: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>, data: Value) -> Self {
        Self::new(Method::POST, url).data(data)
    }

    pub fn data(mut self, data: impl Into<RequestBody>) -> Self {
        self.data = Some(data.into());
        self
    }

    pub fn options(mut self, options: RequestOptions) -> Self {
        self.options = Some(options);
        self
    }

    /// Options for dispatch. Item options win over the item's method and data.
    pub(crate) fn to_options(&self) -> RequestOptions {
        let mut options = self.options.clone().unwrap_or_default();
        if options.method.is_none() {
            options.method = Some(self.method.clone());
        }
        if options.body.is_none() {
            options.body = self.data.clone();
        }
        options
    }
}

/// Outcome of one batch item.
#[derive(Debug, Clone)]
pub struct BatchResult {
    pub request: BatchItem,
    pub success: bool,
    pub data: Option<ResponseBody>,
    pub error: Option<ApiError>,
}

impl BatchResult {
    pub(crate) fn new(request: BatchItem, outcome: ApiResult<ResponseEnvelope>) -> Self {
        match outcome {
            Ok(envelope) => Self {
                request,
                success: true,
                data: Some(envelope.data),
                error: None,
            },
            Err(error) => Self {
                request,
                success: false,
                data: None,
                error: Some(error),
            },
        }
    }
}
