//! # SmsDash Providers
//!
//! HTTP clients for the external collaborators: the outbound SMS send
//! endpoint (with its bearer-token sources) and the Gemini endpoint used
//! to draft message text.

pub mod delivery;
pub mod gemini;
pub mod token;

use smsdash_core::config::SmsDashConfig;
use smsdash_core::traits::{DeliveryClient, TextGenerator};
use std::sync::Arc;

pub use delivery::HttpDeliveryClient;
pub use gemini::GeminiClient;
pub use token::{EnvToken, FileToken, StaticToken};

/// Create the delivery client from configuration.
pub fn create_delivery_client(config: &SmsDashConfig) -> Arc<dyn DeliveryClient> {
    let client = HttpDeliveryClient::from_config(&config.api);
    tracing::debug!("SMS delivery endpoint: {}", client.endpoint());
    Arc::new(client)
}

/// Create the text generator, or `None` when no API key is configured.
pub fn create_generator(config: &SmsDashConfig) -> Option<Arc<dyn TextGenerator>> {
    if config.generation.api_key.trim().is_empty() {
        tracing::info!("Gemini API key not set; AI drafting disabled");
        return None;
    }
    let generator = GeminiClient::from_config(&config.generation);
    tracing::info!("🤖 AI drafting via {}", generator.name());
    Some(Arc::new(generator))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generator_needs_api_key() {
        let mut config = SmsDashConfig::default();
        assert!(create_generator(&config).is_none());

        config.generation.api_key = "key".into();
        let generator = create_generator(&config).unwrap();
        assert_eq!(generator.name(), "gemini");
    }
}
