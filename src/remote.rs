//! Client for a running `smsdash serve`.
//!
//! The server holds the data directory lock, so one-shot commands that
//! change the schedule go through its HTTP API instead of the files.

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use smsdash_core::config::GatewayConfig;
use smsdash_core::types::{MessageStatus, ScheduledMessage};
use std::time::Duration;

pub struct RemoteBook {
    base: String,
    client: reqwest::Client,
}

impl RemoteBook {
    pub fn new(gateway: &GatewayConfig) -> Result<Self> {
        let host = match gateway.host.as_str() {
            "0.0.0.0" | "::" => "127.0.0.1",
            h => h,
        };
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            base: format!("http://{host}:{}/api/v1", gateway.port),
            client,
        })
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    async fn call(&self, request: reqwest::RequestBuilder) -> Result<Value> {
        let resp = request.send().await.with_context(|| {
            format!("data directory is locked but the server at {} is unreachable", self.base)
        })?;
        let body: Value = resp.json().await.context("unreadable server response")?;
        if body["ok"] == false {
            bail!("{}", body["error"].as_str().unwrap_or("request failed"));
        }
        Ok(body)
    }

    pub async fn create(
        &self,
        message: &str,
        recipients: &[String],
        scheduled_time: Option<DateTime<Utc>>,
    ) -> Result<ScheduledMessage> {
        let body = self
            .call(self.client.post(format!("{}/schedules", self.base)).json(&json!({
                "message": message,
                "recipients": recipients,
                "scheduled_time": scheduled_time,
            })))
            .await?;
        Ok(serde_json::from_value(body["schedule"].clone())?)
    }

    pub async fn list(&self) -> Result<Vec<ScheduledMessage>> {
        let body = self
            .call(self.client.get(format!("{}/schedules", self.base)))
            .await?;
        Ok(serde_json::from_value(body["schedules"].clone())?)
    }

    /// Cancel a pending message.
    pub async fn cancel(&self, id: &str) -> Result<()> {
        let url = format!("{}/schedules/{id}", self.base);
        let body = self.call(self.client.get(&url)).await?;
        let record: ScheduledMessage = serde_json::from_value(body["schedule"].clone())?;
        if record.status != MessageStatus::Pending {
            bail!("Only pending messages can be changed (status is {})", record.status);
        }
        self.call(self.client.delete(&url)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smsdash_core::phone::normalize;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn remote_for(server: &MockServer) -> RemoteBook {
        let addr = server.address();
        let gateway = GatewayConfig {
            host: addr.ip().to_string(),
            port: addr.port(),
        };
        RemoteBook::new(&gateway).unwrap()
    }

    fn record(status: MessageStatus) -> ScheduledMessage {
        let mut m = ScheduledMessage::new(
            "Hi".into(),
            vec![normalize("0701234567").unwrap()],
            Utc::now(),
            false,
        );
        m.status = status;
        m
    }

    #[tokio::test]
    async fn test_create_goes_through_api() {
        let server = MockServer::start().await;
        let created = record(MessageStatus::Pending);
        Mock::given(method("POST"))
            .and(path("/api/v1/schedules"))
            .respond_with(
                ResponseTemplate::new(201)
                    .set_body_json(json!({"ok": true, "id": created.id, "schedule": created})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let remote = remote_for(&server);
        let got = remote
            .create("Hi", &["0701234567".to_string()], Some(Utc::now()))
            .await
            .unwrap();
        assert_eq!(got, created);
    }

    #[tokio::test]
    async fn test_cancel_refuses_finished_record() {
        let server = MockServer::start().await;
        let sent = record(MessageStatus::Sent);
        Mock::given(method("GET"))
            .and(path(format!("/api/v1/schedules/{}", sent.id)))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"ok": true, "schedule": sent})),
            )
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(0)
            .mount(&server)
            .await;

        let err = remote_for(&server).cancel(&sent.id).await.unwrap_err();
        assert!(err.to_string().contains("sent"));
    }

    #[tokio::test]
    async fn test_api_error_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/schedules"))
            .respond_with(
                ResponseTemplate::new(500)
                    .set_body_json(json!({"ok": false, "error": "disk full"})),
            )
            .mount(&server)
            .await;

        let err = remote_for(&server).list().await.unwrap_err();
        assert_eq!(err.to_string(), "disk full");
    }
}
