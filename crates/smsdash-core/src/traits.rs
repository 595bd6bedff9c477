//! Seams for the external collaborators.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{DeliveryError, GenerationError};

/// Parsed body of a successful message-send call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderResponse {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
    /// Any other fields the provider returns.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Sends an SMS to a list of canonical recipients.
#[async_trait]
pub trait DeliveryClient: Send + Sync {
    async fn send(
        &self,
        recipients: &[String],
        message: &str,
    ) -> Result<ProviderResponse, DeliveryError>;
}

/// Supplies the bearer credential for outbound calls.
/// Asked on every call; implementations must not assume caching.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn bearer_token(&self) -> Result<String, DeliveryError>;
}

/// Turns a prompt into generated text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}
