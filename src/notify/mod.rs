//! User-facing collaborators of the pipeline.
//!
//! # Data Flow
//! ```text
//! ApiClient::request fails
//!     → FailureHook::observe (classify by status / connectivity)
//!     → Notifier::show_toast(title, message, kind)
//!     → error returned to the caller unchanged
//!
//! Request/response interceptors (loading.rs)
//!     → LoadingIndicator::show / hide
//! ```
//!
//! # Design Decisions
//! - UI surfaces are traits; the defaults log through `tracing`
//! - The failure hook observes only, it never swallows an error

pub mod loading;

use std::sync::Arc;

use crate::http::error::ApiError;

pub use loading::{loading_interceptors, LoadingIndicator, TracingLoadingIndicator};

/// Toast severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToastKind {
    Success,
    Error,
    Warning,
    Info,
}

impl ToastKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToastKind::Success => "success",
            ToastKind::Error => "error",
            ToastKind::Warning => "warning",
            ToastKind::Info => "info",
        }
    }
}

/// Displays short notifications to the user.
pub trait Notifier: Send + Sync {
    fn show_toast(&self, title: &str, message: &str, kind: ToastKind);
}

/// Notifier that writes toasts to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn show_toast(&self, title: &str, message: &str, kind: ToastKind) {
        match kind {
            ToastKind::Error => tracing::error!(title, message, "toast"),
            ToastKind::Warning => tracing::warn!(title, message, "toast"),
            ToastKind::Success | ToastKind::Info => tracing::info!(title, message, kind = kind.as_str(), "toast"),
        }
    }
}

/// User-facing category of a failed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureCategory {
    AuthError,
    PermissionError,
    NotFound,
    RateLimited,
    ServerError,
    NetworkError,
}

impl FailureCategory {
    /// Toast title, message and kind for this category.
    pub fn toast(&self) -> (&'static str, &'static str, ToastKind) {
        match self {
            FailureCategory::AuthError => ("Authentication Error", "Please log in again", ToastKind::Error),
            FailureCategory::PermissionError => (
                "Permission Error",
                "You don't have permission to perform this action",
                ToastKind::Error,
            ),
            FailureCategory::NotFound => ("Not Found", "The requested resource was not found", ToastKind::Error),
            FailureCategory::RateLimited => (
                "Rate Limited",
                "Too many requests. Please try again later",
                ToastKind::Warning,
            ),
            FailureCategory::ServerError => (
                "Server Error",
                "Something went wrong on our end. Please try again",
                ToastKind::Error,
            ),
            FailureCategory::NetworkError => (
                "Network Error",
                "Please check your internet connection",
                ToastKind::Error,
            ),
        }
    }
}

/// Classify a failure. Status wins over connectivity; other failures
/// (e.g. 400, timeouts while online) have no category.
pub fn classify(error: &ApiError, online: bool) -> Option<FailureCategory> {
    match error.status() {
        Some(401) => Some(FailureCategory::AuthError),
        Some(403) => Some(FailureCategory::PermissionError),
        Some(404) => Some(FailureCategory::NotFound),
        Some(429) => Some(FailureCategory::RateLimited),
        Some(status) if status >= 500 => Some(FailureCategory::ServerError),
        _ if !online || error.is_offline() => Some(FailureCategory::NetworkError),
        _ => None,
    }
}

/// Classifies every failure leaving the pipeline and notifies the user.
#[derive(Clone)]
pub struct FailureHook {
    notifier: Arc<dyn Notifier>,
}

impl FailureHook {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }

    /// Observe a failure. Returns the category that was notified, if any.
    pub fn observe(&self, error: &ApiError, online: bool) -> Option<FailureCategory> {
        tracing::error!(error = %error, kind = error.kind(), "API request failed");
        let category = classify(error, online)?;
        let (title, message, kind) = category.toast();
        self.notifier.show_toast(title, message, kind);
        Some(category)
    }
}

impl std::fmt::Debug for FailureHook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FailureHook").finish_non_exhaustive()
    }
}
