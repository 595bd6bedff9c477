//! HTTP delivery client for the outbound message-send endpoint.
//!
//! Request: `POST <base_url><send_path>` with
//! `{"recipient": [...], "message": "..."}` and a bearer token.
//! Success means a 2xx status *and* `"status": "success"` in the body.

use async_trait::async_trait;
use serde_json::{Value, json};
use smsdash_core::config::ApiConfig;
use smsdash_core::error::{DELIVERY_FALLBACK_MESSAGE, DeliveryError};
use smsdash_core::traits::{DeliveryClient, ProviderResponse, TokenSource};
use std::sync::Arc;
use std::time::Duration;

use crate::token::token_source_from_config;

pub struct HttpDeliveryClient {
    endpoint: String,
    tokens: Arc<dyn TokenSource>,
    timeout: Duration,
    client: reqwest::Client,
}

impl HttpDeliveryClient {
    pub fn new(base_url: &str, send_path: &str, tokens: Arc<dyn TokenSource>) -> Self {
        let endpoint = format!(
            "{}/{}",
            base_url.trim_end_matches('/'),
            send_path.trim_start_matches('/')
        );
        Self {
            endpoint,
            tokens,
            timeout: Duration::from_secs(15),
            client: reqwest::Client::new(),
        }
    }

    pub fn from_config(api: &ApiConfig) -> Self {
        Self::new(&api.base_url, &api.send_path, token_source_from_config(api))
            .with_timeout(Duration::from_secs(api.timeout_secs.max(1)))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// `message` field of a provider body, if it is a non-empty string.
fn provider_message(body: Option<&Value>) -> Option<String> {
    body.and_then(|v| v.get("message"))
        .and_then(|m| m.as_str())
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(String::from)
}

#[async_trait]
impl DeliveryClient for HttpDeliveryClient {
    async fn send(
        &self,
        recipients: &[String],
        message: &str,
    ) -> Result<ProviderResponse, DeliveryError> {
        let token = self.tokens.bearer_token().await?;

        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(token)
            .json(&json!({
                "recipient": recipients,
                "message": message,
            }))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| DeliveryError::Transport(format!("reading response: {e}")))?;
        let body: Option<Value> = serde_json::from_str(&text).ok();

        if !status.is_success() {
            tracing::debug!("SMS endpoint returned {status}: {text}");
            return Err(DeliveryError::Http {
                status: status.as_u16(),
                message: provider_message(body.as_ref())
                    .unwrap_or_else(|| DELIVERY_FALLBACK_MESSAGE.to_string()),
            });
        }

        let Some(body) = body else {
            return Err(DeliveryError::InvalidResponse(format!(
                "expected JSON, got: {}",
                text.chars().take(200).collect::<String>()
            )));
        };

        if body.get("status").and_then(|s| s.as_str()) != Some("success") {
            return Err(DeliveryError::Rejected(
                provider_message(Some(&body))
                    .unwrap_or_else(|| DELIVERY_FALLBACK_MESSAGE.to_string()),
            ));
        }

        let parsed: ProviderResponse = serde_json::from_value(body)
            .map_err(|e| DeliveryError::InvalidResponse(e.to_string()))?;
        tracing::debug!("SMS accepted for {} recipient(s)", recipients.len());
        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::StaticToken;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(base: &str) -> HttpDeliveryClient {
        HttpDeliveryClient::new(base, "/api/v1/sms/send", Arc::new(StaticToken::new("tok-1")))
    }

    fn recipients() -> Vec<String> {
        vec!["+256701234567".to_string()]
    }

    #[test]
    fn test_endpoint_join() {
        let c = HttpDeliveryClient::new("http://x/", "/send", Arc::new(StaticToken::new("t")));
        assert_eq!(c.endpoint(), "http://x/send");
        let c = HttpDeliveryClient::new("http://x", "send", Arc::new(StaticToken::new("t")));
        assert_eq!(c.endpoint(), "http://x/send");
    }

    #[tokio::test]
    async fn test_send_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/sms/send"))
            .and(header("Authorization", "Bearer tok-1"))
            .and(body_json(json!({
                "recipient": ["+256701234567"],
                "message": "Hi",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "success",
                "message": "queued",
                "cost": 35,
            })))
            .expect(1)
            .mount(&server)
            .await;

        let resp = client(&server.uri()).send(&recipients(), "Hi").await.unwrap();
        assert_eq!(resp.status, "success");
        assert_eq!(resp.message.as_deref(), Some("queued"));
        assert_eq!(resp.extra["cost"], 35);
    }

    #[tokio::test]
    async fn test_http_error_carries_provider_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(402).set_body_json(json!({"message": "Insufficient credit"})),
            )
            .mount(&server)
            .await;

        let err = client(&server.uri()).send(&recipients(), "Hi").await.unwrap_err();
        assert_eq!(
            err,
            DeliveryError::Http {
                status: 402,
                message: "Insufficient credit".into()
            }
        );
    }

    #[tokio::test]
    async fn test_http_500_without_body_uses_fallback() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let err = client(&server.uri()).send(&recipients(), "Hi").await.unwrap_err();
        assert_eq!(err.user_message(), DELIVERY_FALLBACK_MESSAGE);
        assert!(matches!(err, DeliveryError::Http { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_provider_reported_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "error",
                "message": "Invalid sender ID",
            })))
            .mount(&server)
            .await;

        let err = client(&server.uri()).send(&recipients(), "Hi").await.unwrap_err();
        assert_eq!(err, DeliveryError::Rejected("Invalid sender ID".into()));
    }

    #[tokio::test]
    async fn test_non_json_success_is_invalid() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("OK"))
            .mount(&server)
            .await;

        let err = client(&server.uri()).send(&recipients(), "Hi").await.unwrap_err();
        assert!(matches!(err, DeliveryError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_missing_token_never_hits_network() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let c = HttpDeliveryClient::new(&server.uri(), "/send", Arc::new(StaticToken::new("")));
        let err = c.send(&recipients(), "Hi").await.unwrap_err();
        assert!(matches!(err, DeliveryError::Auth(_)));
    }

    struct CountingToken(AtomicUsize);

    #[async_trait]
    impl TokenSource for CountingToken {
        async fn bearer_token(&self) -> Result<String, DeliveryError> {
            let n = self.0.fetch_add(1, Ordering::SeqCst);
            Ok(format!("tok-{n}"))
        }
    }

    #[tokio::test]
    async fn test_token_fetched_per_call() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("Authorization", "Bearer tok-0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "success"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(header("Authorization", "Bearer tok-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "success"})))
            .expect(1)
            .mount(&server)
            .await;

        let tokens = Arc::new(CountingToken(AtomicUsize::new(0)));
        let c = HttpDeliveryClient::new(&server.uri(), "/send", tokens.clone());
        c.send(&recipients(), "one").await.unwrap();
        c.send(&recipients(), "two").await.unwrap();
        assert_eq!(tokens.0.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transport_error() {
        let c = client("http://127.0.0.1:9").with_timeout(Duration::from_secs(2));
        let err = c.send(&recipients(), "Hi").await.unwrap_err();
        assert!(matches!(err, DeliveryError::Transport(_)));
    }
}
