use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

use crate::error::Result;
use crate::storage::KeyValueStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Success,
    Error,
    Warning,
    Info,
}

impl NotificationKind {
    pub fn icon(&self) -> &'static str {
        match self {
            NotificationKind::Success => "check-circle",
            NotificationKind::Error => "exclamation-circle",
            NotificationKind::Warning => "exclamation-triangle",
            NotificationKind::Info => "info-circle",
        }
    }
}

/// A user-facing message. Serialized as `{message, type}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
}

impl Notification {
    pub fn new(message: impl Into<String>, kind: NotificationKind) -> Self {
        Self {
            message: message.into(),
            kind,
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(message, NotificationKind::Success)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(message, NotificationKind::Error)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(message, NotificationKind::Warning)
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(message, NotificationKind::Info)
    }
}

/// Hands a notification from one page to the next through transient storage.
#[derive(Clone)]
pub struct PendingNotifications {
    store: Arc<dyn KeyValueStore>,
    key: String,
}

impl PendingNotifications {
    pub fn new(store: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    pub async fn save(&self, notification: &Notification) -> Result<()> {
        let text = serde_json::to_string(notification)?;
        self.store.set(&self.key, text).await
    }

    /// Returns the pending notification, if any, and clears it.
    pub async fn take(&self) -> Option<Notification> {
        let text = match self.store.get(&self.key).await {
            Ok(text) => text?,
            Err(e) => {
                warn!("Failed to read pending notification: {}", e);
                return None;
            }
        };

        if let Err(e) = self.store.remove(&self.key).await {
            warn!("Failed to clear pending notification: {}", e);
        }

        serde_json::from_str(&text)
            .map_err(|e| warn!("Discarding malformed pending notification: {}", e))
            .ok()
    }
}
