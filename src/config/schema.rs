//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;
use serde::{Deserialize, Serialize};

/// Root configuration for the dashboard client.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct DashboardConfig {
    /// Pipeline settings (base URL, headers, timeouts).
    pub client: ClientConfig,

    /// Retry settings used by `ApiClient::retry_request`.
    pub retry: RetryConfig,

    /// Notification polling settings.
    pub notifications: NotificationConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Extra or overriding endpoint definitions, keyed by operation name.
    pub endpoints: BTreeMap<String, EndpointConfig>,
}

/// Request pipeline configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Prefix applied to every relative request URL.
    pub base_url: String,

    /// Deadline used by `request_with_timeout` when none is given.
    pub default_timeout_ms: u64,

    /// TCP connect timeout for the transport.
    pub connect_timeout_ms: u64,

    /// User-Agent sent by the transport.
    pub user_agent: String,

    /// Headers added to the built-in defaults.
    pub headers: BTreeMap<String, String>,

    /// Stamp an `X-Request-ID` on every request.
    pub request_id: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            default_timeout_ms: 30_000,
            connect_timeout_ms: 10_000,
            user_agent: concat!("dashboard-client/", env!("CARGO_PKG_VERSION")).to_string(),
            headers: BTreeMap::new(),
            request_id: true,
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of attempts.
    pub max_retries: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,

    /// Add up to 10% random delay on top of each wait.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1000,
            max_delay_ms: 60_000,
            jitter: false,
        }
    }
}

/// Notification polling configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Enable background polling.
    pub enabled: bool,

    /// Polling interval in seconds.
    pub poll_interval_secs: u64,

    /// JSON file persisting small client flags; in-memory when unset.
    pub store_path: Option<String>,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_secs: 30,
            store_path: None,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error) or a full filter directive.
    pub log_level: String,

    /// Record request metrics through the `metrics` facade.
    pub metrics_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
        }
    }
}

/// A single endpoint definition.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct EndpointConfig {
    /// HTTP method name (GET, POST, PUT, PATCH, DELETE).
    pub method: String,

    /// Path template with `{param}` placeholders.
    pub path: String,
}
