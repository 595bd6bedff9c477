//! Error taxonomy for SmsDash.
//!
//! Validation errors never reach the network. Delivery and generation
//! errors are caught at the boundary where they can be shown to the user.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, SmsDashError>;

/// Fallback text for a delivery failure the provider did not explain.
pub const DELIVERY_FALLBACK_MESSAGE: &str = "Failed to send message";

/// Umbrella error for SmsDash operations.
#[derive(Debug, Error)]
pub enum SmsDashError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Scheduled message not found: {0}")]
    NotFound(String),

    #[error("Scheduled message {0} is being sent right now")]
    InFlight(String),

    #[error("Data directory {0} is in use by another smsdash process")]
    Locked(String),

    #[error(transparent)]
    Delivery(#[from] DeliveryError),

    #[error(transparent)]
    Generation(#[from] GenerationError),
}

/// User input rejected before anything is persisted or sent.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid phone number '{input}': {reason}")]
    InvalidPhone { input: String, reason: String },

    #[error("Message cannot be empty")]
    EmptyMessage,

    #[error("Message is {len} characters long, the limit is {max}")]
    MessageTooLong { len: usize, max: usize },

    #[error("At least one recipient is required")]
    NoRecipients,

    #[error("A scheduled time is required")]
    MissingTime,

    #[error("Only pending messages can be changed (status is {0})")]
    NotPending(String),
}

/// Failure reported by the outbound message-send endpoint.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeliveryError {
    /// Non-success HTTP status.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// 2xx response whose `status` field was not `"success"`.
    #[error("Provider rejected message: {0}")]
    Rejected(String),

    /// Connection, DNS, TLS or timeout failure.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Bearer token could not be obtained from the auth collaborator.
    #[error("Auth token unavailable: {0}")]
    Auth(String),

    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),
}

impl DeliveryError {
    /// Message suitable for a user-visible notification.
    pub fn user_message(&self) -> &str {
        match self {
            Self::Http { message, .. } | Self::Rejected(message) => message,
            _ => DELIVERY_FALLBACK_MESSAGE,
        }
    }
}

/// Failure of the generative-text endpoint.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GenerationError {
    #[error("Generation API key not configured")]
    ApiKeyMissing,

    #[error("Generation HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Generation transport error: {0}")]
    Transport(String),

    #[error("Malformed generation response: {0}")]
    MalformedResponse(String),

    #[error("Generation returned empty text")]
    EmptyText,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_prefers_provider_text() {
        let err = DeliveryError::Rejected("Insufficient credit".into());
        assert_eq!(err.user_message(), "Insufficient credit");

        let err = DeliveryError::Transport("connection refused".into());
        assert_eq!(err.user_message(), DELIVERY_FALLBACK_MESSAGE);
    }

    #[test]
    fn test_validation_wraps_into_umbrella() {
        let err: SmsDashError = ValidationError::NoRecipients.into();
        assert_eq!(err.to_string(), "At least one recipient is required");
    }
}
