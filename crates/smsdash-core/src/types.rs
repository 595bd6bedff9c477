//! Scheduled message data model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ValidationError;
use crate::phone::CanonicalNumber;

/// SMS payload limit, in characters.
pub const MAX_MESSAGE_LEN: usize = 160;

/// A message scheduled for delivery to one or more recipients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledMessage {
    /// Unique ID, assigned at creation.
    pub id: String,
    /// SMS text.
    pub message: String,
    /// Canonical phone numbers, in the order the user entered them.
    pub recipients: Vec<CanonicalNumber>,
    /// The message is eligible for sending at or after this instant.
    pub scheduled_time: DateTime<Utc>,
    pub status: MessageStatus,
    /// Whether the text was drafted by the generation endpoint.
    #[serde(default)]
    pub ai_generated: bool,
    pub created_at: DateTime<Utc>,
    /// When the record reached a terminal status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dispatched_at: Option<DateTime<Utc>>,
    /// Why the last delivery attempt failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl ScheduledMessage {
    /// Create a pending message. Inputs must already be validated.
    pub fn new(
        message: String,
        recipients: Vec<CanonicalNumber>,
        scheduled_time: DateTime<Utc>,
        ai_generated: bool,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            message,
            recipients,
            scheduled_time,
            status: MessageStatus::Pending,
            ai_generated,
            created_at: Utc::now(),
            dispatched_at: None,
            last_error: None,
        }
    }

    /// Pending and scheduled at or before `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == MessageStatus::Pending && self.scheduled_time <= now
    }

    pub fn recipient_strings(&self) -> Vec<String> {
        self.recipients.iter().map(|r| r.to_string()).collect()
    }
}

/// Delivery status. `Sent` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Pending,
    Sent,
    Failed,
}

impl MessageStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Sent => "sent",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the schedule list is presented.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    #[default]
    List,
    Grid,
}

impl ViewMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::List => "list",
            Self::Grid => "grid",
        }
    }
}

impl std::str::FromStr for ViewMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "list" => Ok(Self::List),
            "grid" => Ok(Self::Grid),
            other => Err(format!("unknown view mode '{other}' (expected list or grid)")),
        }
    }
}

/// Check an SMS body: non-empty after trimming and within [`MAX_MESSAGE_LEN`].
/// Returns the trimmed text.
pub fn validate_message(message: &str) -> Result<String, ValidationError> {
    let trimmed = message.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyMessage);
    }
    let len = trimmed.chars().count();
    if len > MAX_MESSAGE_LEN {
        return Err(ValidationError::MessageTooLong {
            len,
            max: MAX_MESSAGE_LEN,
        });
    }
    Ok(trimmed.to_string())
}
