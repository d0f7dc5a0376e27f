//! Background polling for new notifications.
//!
//! # Responsibilities
//! - Periodically fetch notifications created since the last check
//! - Toast each one and keep a local list for unread counts
//! - Persist the last-check timestamp across restarts

use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::broadcast;
use tokio::time;

use crate::http::{ApiClient, ApiResult, Query, RequestOptions};
use crate::notifications::{map_notification_kind, Notification, NotificationList};
use crate::notify::{Notifier, ToastKind};
use crate::storage::KeyValueStore;

/// Store key holding the epoch milliseconds of the last successful check.
pub const LAST_CHECK_KEY: &str = "lastNotificationCheck";

pub struct NotificationPoller {
    client: Arc<ApiClient>,
    store: Arc<dyn KeyValueStore>,
    notifier: Arc<dyn Notifier>,
    interval: Duration,
    notifications: Mutex<Vec<Notification>>,
}

impl NotificationPoller {
    pub fn new(
        client: Arc<ApiClient>,
        store: Arc<dyn KeyValueStore>,
        notifier: Arc<dyn Notifier>,
        interval: Duration,
    ) -> Self {
        Self {
            client,
            store,
            notifier,
            interval,
            notifications: Mutex::new(Vec::new()),
        }
    }

    /// Replace the local list with everything the backend has.
    pub async fn load(&self) -> ApiResult<usize> {
        let path = self.client.endpoints().resolve("notifications.list", &Query::new())?;
        let envelope = self
            .client
            .get(&path.path, &path.query, RequestOptions::new().background())
            .await?;
        let list: NotificationList = envelope.json()?;

        let count = list.notifications.len();
        *self.lock() = list.notifications;
        tracing::debug!(count, "Loaded notifications");
        Ok(count)
    }

    /// Fetch notifications newer than the stored timestamp.
    ///
    /// Each new notification is toasted and prepended to the local list.
    /// The timestamp is only advanced when the fetch succeeds.
    pub async fn check_once(&self) -> ApiResult<usize> {
        let since = self.store.get(LAST_CHECK_KEY).unwrap_or_else(|| "0".to_string());
        let resolved = self
            .client
            .endpoints()
            .resolve("notifications.new", &Query::new().param("since", &since))?;
        let envelope = self
            .client
            .get(&resolved.path, &resolved.query, RequestOptions::new().background())
            .await?;
        let list: NotificationList = envelope.json()?;

        for notification in &list.notifications {
            self.notifier.show_toast(
                "New Notification",
                &notification.message,
                map_notification_kind(&notification.kind),
            );
        }

        let count = list.notifications.len();
        if count > 0 {
            let mut local = self.lock();
            let older = std::mem::take(&mut *local);
            *local = list.notifications.into_iter().chain(older).collect();
        }

        self.store.set(LAST_CHECK_KEY, &now_millis().to_string());
        tracing::debug!(since = %since, count, "Checked for new notifications");
        Ok(count)
    }

    /// Mark one notification read on the backend, then locally.
    pub async fn mark_read(&self, id: &str) -> ApiResult<()> {
        self.client
            .call("notifications.mark_read", &Query::new().param("id", id), None)
            .await?;
        for notification in self.lock().iter_mut().filter(|n| n.id_string() == id) {
            notification.read = true;
        }
        Ok(())
    }

    pub async fn mark_all_read(&self) -> ApiResult<()> {
        self.client
            .call("notifications.mark_all_read", &Query::new(), None)
            .await?;
        for notification in self.lock().iter_mut() {
            notification.read = true;
        }
        self.notifier
            .show_toast("Success", "All notifications marked as read", ToastKind::Success);
        Ok(())
    }

    pub fn unread_count(&self) -> usize {
        self.lock().iter().filter(|n| !n.read).count()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.lock().clone()
    }

    /// Check on every tick until shutdown. Failures are logged and the
    /// loop keeps going.
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(interval_secs = self.interval.as_secs(), "Notification poller starting");

        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.check_once().await {
                        tracing::warn!(error = %e, "Notification check failed");
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Notification poller received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Notification>> {
        self.notifications.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
}
