//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, retries > 0)
//! - Check endpoint definitions (known methods, absolute paths)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: DashboardConfig → Result<(), Vec<ValidationError>>

use std::fmt;
use reqwest::header::{HeaderName, HeaderValue};
use crate::config::schema::DashboardConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

const METHODS: [&str; 5] = ["GET", "POST", "PUT", "PATCH", "DELETE"];

/// Validate a parsed configuration.
pub fn validate_config(config: &DashboardConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let base_url = &config.client.base_url;
    if !base_url.is_empty() && url::Url::parse(base_url).is_err() {
        errors.push(ValidationError::new("client.base_url", format!("'{}' is not an absolute URL", base_url)));
    }
    if config.client.default_timeout_ms == 0 {
        errors.push(ValidationError::new("client.default_timeout_ms", "must be greater than 0"));
    }
    if config.client.connect_timeout_ms == 0 {
        errors.push(ValidationError::new("client.connect_timeout_ms", "must be greater than 0"));
    }
    for (name, value) in &config.client.headers {
        if HeaderName::try_from(name.as_str()).is_err() || HeaderValue::try_from(value.as_str()).is_err() {
            errors.push(ValidationError::new(format!("client.headers.{}", name), "invalid header"));
        }
    }

    if config.retry.max_retries == 0 {
        errors.push(ValidationError::new("retry.max_retries", "must be at least 1"));
    }
    if config.retry.max_delay_ms < config.retry.base_delay_ms {
        errors.push(ValidationError::new("retry.max_delay_ms", "must not be below base_delay_ms"));
    }

    if config.notifications.enabled && config.notifications.poll_interval_secs == 0 {
        errors.push(ValidationError::new("notifications.poll_interval_secs", "must be greater than 0"));
    }

    for (name, endpoint) in &config.endpoints {
        if !METHODS.contains(&endpoint.method.to_ascii_uppercase().as_str()) {
            errors.push(ValidationError::new(
                format!("endpoints.{}.method", name),
                format!("unsupported method '{}'", endpoint.method),
            ));
        }
        if !endpoint.path.starts_with('/') {
            errors.push(ValidationError::new(format!("endpoints.{}.path", name), "must start with '/'"));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
