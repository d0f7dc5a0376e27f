//! Response decoding and the success envelope.
//!
//! # Responsibilities
//! - Decode the body according to the declared content type
//! - Carry status, status text and headers alongside the body
//!
//! # Design Decisions
//! - JSON only when the content type says so; everything else stays text
//! - An empty JSON body decodes to `null` rather than failing

use reqwest::header::{HeaderMap, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::http::error::{ApiError, ApiResult};

/// A decoded response body.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResponseBody {
    Json(Value),
    Text(String),
}

impl ResponseBody {
    /// Decode raw bytes, parsing JSON when `content_type` declares it.
    pub fn decode(content_type: Option<&str>, bytes: &[u8]) -> ApiResult<Self> {
        let is_json = content_type
            .map(|ct| ct.to_ascii_lowercase().contains("application/json"))
            .unwrap_or(false);

        if is_json {
            if bytes.iter().all(u8::is_ascii_whitespace) {
                return Ok(ResponseBody::Json(Value::Null));
            }
            serde_json::from_slice(bytes)
                .map(ResponseBody::Json)
                .map_err(|e| ApiError::Decode(e.to_string()))
        } else {
            Ok(ResponseBody::Text(String::from_utf8_lossy(bytes).into_owned()))
        }
    }

    /// The `message` field of a JSON object body.
    pub fn message(&self) -> Option<&str> {
        match self {
            ResponseBody::Json(value) => value.get("message").and_then(Value::as_str),
            ResponseBody::Text(_) => None,
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            ResponseBody::Json(value) => Some(value),
            ResponseBody::Text(_) => None,
        }
    }

    /// Convert into a JSON value; text bodies become JSON strings.
    pub fn into_json(self) -> Value {
        match self {
            ResponseBody::Json(value) => value,
            ResponseBody::Text(text) => Value::String(text),
        }
    }
}

/// The normalized result of a successful (2xx) request.
#[derive(Debug, Clone)]
pub struct ResponseEnvelope {
    pub data: ResponseBody,
    pub status: u16,
    pub status_text: String,
    pub headers: HeaderMap,
}

impl ResponseEnvelope {
    /// Content type declared by the response, if any.
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok())
    }

    /// Deserialize the body into a typed value.
    pub fn json<T: DeserializeOwned>(&self) -> ApiResult<T> {
        let value = self.data.clone().into_json();
        serde_json::from_value(value).map_err(|e| ApiError::Decode(e.to_string()))
    }

    /// `success` flag of the backend's `{success, data|message}` shape.
    pub fn success_flag(&self) -> Option<bool> {
        self.data.as_json()?.get("success")?.as_bool()
    }
}
