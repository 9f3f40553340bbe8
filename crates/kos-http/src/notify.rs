//! User-facing notifications
//!
//! The pipeline never renders anything itself. It hands [`Notification`]s to
//! a [`NotificationSink`], fire and forget.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Success or error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Success,
    Error,
}

/// Screen edge a toast is anchored to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    Top,
    #[default]
    Bottom,
}

/// A toast to show
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    #[serde(with = "millis")]
    pub duration: Duration,
    pub position: Position,
}

impl Notification {
    pub fn success(title: impl Into<String>, message: impl Into<String>, duration: Duration) -> Self {
        Self {
            kind: NotificationKind::Success,
            title: title.into(),
            message: message.into(),
            duration,
            position: Position::Bottom,
        }
    }

    pub fn error(title: impl Into<String>, message: impl Into<String>, duration: Duration) -> Self {
        Self {
            kind: NotificationKind::Error,
            title: title.into(),
            message: message.into(),
            duration,
            position: Position::Bottom,
        }
    }
}

/// Receiver of notifications
pub trait NotificationSink: Send + Sync {
    fn show(&self, notification: Notification);
}

/// Logs notifications instead of displaying them
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl NotificationSink for TracingNotifier {
    fn show(&self, notification: Notification) {
        match notification.kind {
            NotificationKind::Success => tracing::info!(
                title = %notification.title,
                duration_ms = notification.duration.as_millis() as u64,
                "{}",
                notification.message
            ),
            NotificationKind::Error => tracing::warn!(
                title = %notification.title,
                duration_ms = notification.duration.as_millis() as u64,
                "{}",
                notification.message
            ),
        }
    }
}

/// Collects notifications in memory
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    shown: Arc<Mutex<Vec<Notification>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything shown so far, oldest first
    pub fn notifications(&self) -> Vec<Notification> {
        self.shown
            .lock()
            .map(|shown| shown.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    /// Remove and return everything shown so far
    pub fn drain(&self) -> Vec<Notification> {
        match self.shown.lock() {
            Ok(mut shown) => std::mem::take(&mut *shown),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }
}

impl NotificationSink for RecordingNotifier {
    fn show(&self, notification: Notification) {
        match self.shown.lock() {
            Ok(mut shown) => shown.push(notification),
            Err(poisoned) => poisoned.into_inner().push(notification),
        }
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}
