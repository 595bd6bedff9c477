//! Transient user-visible notifications.
//! Lightweight: no queues. Just a bounded in-memory history the UI polls.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Max notifications kept in history.
const HISTORY_LIMIT: usize = 100;

/// A notification to show the user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub level: NotifyLevel,
    /// Title/summary.
    pub title: String,
    /// Body content.
    pub body: String,
    /// What produced it (record id, "dispatcher", "compose").
    pub source: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NotifyLevel {
    Info,
    Success,
    Error,
}

/// Notification history (ring buffer, newest last).
#[derive(Debug, Default)]
pub struct NotifyRouter {
    history: Vec<Notification>,
}

impl NotifyRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a notification, dropping the oldest past the limit.
    pub fn record(&mut self, notification: Notification) {
        match notification.level {
            NotifyLevel::Error => tracing::warn!("🔔 {}: {}", notification.title, notification.body),
            _ => tracing::info!("🔔 {}: {}", notification.title, notification.body),
        }
        self.history.push(notification);
        if self.history.len() > HISTORY_LIMIT {
            let excess = self.history.len() - HISTORY_LIMIT;
            self.history.drain(..excess);
        }
    }

    /// Create and record a notification in one go.
    pub fn push(&mut self, level: NotifyLevel, title: &str, body: &str, source: &str) {
        self.record(Self::create(level, title, body, source));
    }

    pub fn history(&self) -> &[Notification] {
        &self.history
    }

    /// Notifications newer than `since`.
    pub fn since(&self, since: DateTime<Utc>) -> Vec<&Notification> {
        self.history.iter().filter(|n| n.timestamp > since).collect()
    }

    pub fn create(level: NotifyLevel, title: &str, body: &str, source: &str) -> Notification {
        Notification {
            level,
            title: title.to_string(),
            body: body.to_string(),
            source: source.to_string(),
            timestamp: Utc::now(),
        }
    }
}
