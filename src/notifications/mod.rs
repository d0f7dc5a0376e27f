//! Backend notifications.
//!
//! # Data Flow
//! ```text
//! ticker (poll_interval_secs)
//!     → GET /api/notifications/new?since=<lastNotificationCheck>
//!     → toast each one (map_notification_kind)
//!     → store lastNotificationCheck = now
//! ```

pub mod poller;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::notify::ToastKind;

pub use poller::{NotificationPoller, LAST_CHECK_KEY};

/// A notification as returned by the backend.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Notification {
    #[serde(default)]
    pub id: Value,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl Notification {
    /// The id as it appears in URLs (numbers and strings alike).
    pub fn id_string(&self) -> String {
        match &self.id {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// `{"notifications": [...]}` payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotificationList {
    #[serde(default)]
    pub notifications: Vec<Notification>,
}

/// Toast kind for a backend notification type. Unknown types are `Info`.
pub fn map_notification_kind(kind: &str) -> ToastKind {
    match kind {
        "success" | "post_published" | "account_added" | "content_generated" | "site_connected" => {
            ToastKind::Success
        }
        "error" => ToastKind::Error,
        "warning" | "automation_stopped" | "login_required" => ToastKind::Warning,
        _ => ToastKind::Info,
    }
}
