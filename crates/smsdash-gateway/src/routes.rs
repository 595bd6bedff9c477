//! API route handlers for the gateway.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Value, json};
use smsdash_core::error::SmsDashError;
use smsdash_core::types::ViewMode;
use smsdash_scheduler::compose::draft_message;
use smsdash_scheduler::notify::NotifyLevel;
use smsdash_scheduler::{NewSchedule, ScheduleEdit};
use std::sync::Arc;

use crate::server::AppState;

type ApiResponse = (StatusCode, Json<Value>);

fn ok(body: Value) -> ApiResponse {
    (StatusCode::OK, Json(body))
}

/// Map an error to a status code and `{"ok": false, "error": ...}`.
fn error_response(err: &SmsDashError) -> ApiResponse {
    let status = match err {
        SmsDashError::Validation(_) => StatusCode::BAD_REQUEST,
        SmsDashError::NotFound(_) => StatusCode::NOT_FOUND,
        SmsDashError::InFlight(_) => StatusCode::CONFLICT,
        SmsDashError::Delivery(_) | SmsDashError::Generation(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(json!({"ok": false, "error": err.to_string()})))
}

/// Health check endpoint.
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": state.start_time.elapsed().as_secs(),
        "dispatching": state.dispatcher.is_scanning(),
    }))
}

// ---- Schedules ----

#[derive(Debug, Default, Deserialize)]
pub struct CreateScheduleRequest {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub recipients: Vec<String>,
    #[serde(default, alias = "scheduledTime")]
    pub scheduled_time: Option<DateTime<Utc>>,
    #[serde(default, alias = "aiGenerated")]
    pub ai_generated: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct EditScheduleRequest {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub recipients: Option<Vec<String>>,
    #[serde(default, alias = "scheduledTime")]
    pub scheduled_time: Option<DateTime<Utc>>,
}

/// List all scheduled messages with status counts and the view preference.
pub async fn list_schedules(State(state): State<Arc<AppState>>) -> Json<Value> {
    let book = state.book().lock().await;
    let view_mode = book.store().load_view_mode();
    Json(json!({
        "ok": true,
        "schedules": book.list(),
        "count": book.len(),
        "counts": book.counts(),
        "view_mode": view_mode.as_str(),
    }))
}

/// Get one scheduled message.
pub async fn get_schedule(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResponse {
    let book = state.book().lock().await;
    match book.get(&id) {
        Some(record) => ok(json!({"ok": true, "schedule": record})),
        None => error_response(&SmsDashError::NotFound(id)),
    }
}

/// Create a scheduled message.
pub async fn create_schedule(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateScheduleRequest>,
) -> ApiResponse {
    let input = NewSchedule {
        message: body.message,
        recipients: body.recipients,
        scheduled_time: body.scheduled_time,
        ai_generated: body.ai_generated,
    };
    let result = state.book().lock().await.create(input);
    match result {
        Ok(record) => (
            StatusCode::CREATED,
            Json(json!({"ok": true, "id": record.id, "schedule": record})),
        ),
        Err(e) => error_response(&e),
    }
}

/// Edit a pending scheduled message.
pub async fn update_schedule(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<EditScheduleRequest>,
) -> ApiResponse {
    let edit = ScheduleEdit {
        message: body.message,
        recipients: body.recipients,
        scheduled_time: body.scheduled_time,
    };
    let result = state.book().lock().await.edit(&id, edit);
    match result {
        Ok(record) => ok(json!({"ok": true, "schedule": record})),
        Err(e) => error_response(&e),
    }
}

/// Cancel a pending message or delete a finished one.
pub async fn delete_schedule(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResponse {
    let result = state.book().lock().await.delete(&id);
    match result {
        Ok(record) => ok(json!({"ok": true, "id": record.id, "status": record.status})),
        Err(e) => error_response(&e),
    }
}

/// Run one dispatch tick now instead of waiting for the interval.
/// The tick runs on its own task, so a client hanging up does not cut it short.
pub async fn dispatch_now(State(state): State<Arc<AppState>>) -> Json<Value> {
    let dispatcher = state.dispatcher.clone();
    let report = match tokio::spawn(async move { dispatcher.tick(Utc::now()).await }).await {
        Ok(report) => report,
        Err(e) => {
            tracing::error!("❌ Manual dispatch task failed: {e}");
            return Json(json!({"ok": false, "error": format!("dispatch task failed: {e}")}));
        }
    };
    Json(json!({
        "ok": !report.skipped,
        "skipped": report.skipped,
        "sent": report.sent(),
        "failed": report.failed(),
        "processed": report.processed,
    }))
}

// ---- AI drafting ----

#[derive(Debug, Default, Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub prompt: String,
}

/// Draft message text from a prompt.
pub async fn generate_draft(
    State(state): State<Arc<AppState>>,
    Json(body): Json<GenerateRequest>,
) -> ApiResponse {
    let fallback = state.config.generation.fallback();
    let result = draft_message(state.generator.as_deref(), &body.prompt, fallback).await;
    match result {
        Ok(draft) => ok(json!({"ok": true, "draft": draft})),
        Err(e) => {
            if let SmsDashError::Generation(_) = e {
                state.notifier().lock().await.push(
                    NotifyLevel::Error,
                    "Message generation failed",
                    &e.to_string(),
                    "compose",
                );
            }
            error_response(&e)
        }
    }
}

// ---- Preferences ----

#[derive(Debug, Deserialize)]
pub struct ViewModeRequest {
    pub mode: String,
}

pub async fn get_view_mode(State(state): State<Arc<AppState>>) -> Json<Value> {
    let mode = state.book().lock().await.store().load_view_mode();
    Json(json!({"ok": true, "mode": mode.as_str()}))
}

pub async fn set_view_mode(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ViewModeRequest>,
) -> ApiResponse {
    let mode: ViewMode = match body.mode.parse() {
        Ok(m) => m,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"ok": false, "error": e})),
            );
        }
    };
    let result = state.book().lock().await.store().save_view_mode(mode);
    match result {
        Ok(()) => ok(json!({"ok": true, "mode": mode.as_str()})),
        Err(e) => error_response(&e),
    }
}

// ---- Notifications ----

#[derive(Debug, Default, Deserialize)]
pub struct NotificationsQuery {
    /// Only notifications newer than this instant.
    #[serde(default)]
    pub since: Option<DateTime<Utc>>,
}

/// Get notification history, newest last.
pub async fn list_notifications(
    State(state): State<Arc<AppState>>,
    Query(query): Query<NotificationsQuery>,
) -> Json<Value> {
    let router = state.notifier().lock().await;
    let notifications = match query.since {
        Some(since) => json!(router.since(since)),
        None => json!(router.history()),
    };
    Json(json!({"ok": true, "notifications": notifications}))
}

// ---- Phone numbers ----

#[derive(Debug, Deserialize)]
pub struct NormalizeRequest {
    pub number: String,
}

/// Check and normalize a phone number without storing anything.
pub async fn normalize_phone(
    State(state): State<Arc<AppState>>,
    Json(body): Json<NormalizeRequest>,
) -> ApiResponse {
    let result = state.book().lock().await.normalizer().normalize(&body.number);
    match result {
        Ok(n) => ok(json!({"ok": true, "canonical": n.as_str()})),
        Err(e) => error_response(&SmsDashError::Validation(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use smsdash_core::config::SmsDashConfig;
    use smsdash_core::error::DeliveryError;
    use smsdash_core::phone::PhoneNormalizer;
    use smsdash_core::traits::{DeliveryClient, ProviderResponse};
    use smsdash_scheduler::{Dispatcher, NotifyRouter, ScheduleBook, ScheduleStore};
    use tokio::sync::Mutex;

    struct AlwaysOk;

    #[async_trait]
    impl DeliveryClient for AlwaysOk {
        async fn send(&self, _: &[String], _: &str) -> Result<ProviderResponse, DeliveryError> {
            Ok(ProviderResponse {
                status: "success".into(),
                message: None,
                extra: Default::default(),
            })
        }
    }

    /// Holds every send until the gate is opened.
    struct GatedClient(Arc<tokio::sync::Notify>);

    #[async_trait]
    impl DeliveryClient for GatedClient {
        async fn send(&self, _: &[String], _: &str) -> Result<ProviderResponse, DeliveryError> {
            self.0.notified().await;
            AlwaysOk.send(&[], "").await
        }
    }

    fn test_state(config: SmsDashConfig) -> (tempfile::TempDir, State<Arc<AppState>>) {
        test_state_with(config, Arc::new(AlwaysOk))
    }

    fn test_state_with(
        config: SmsDashConfig,
        delivery: Arc<dyn DeliveryClient>,
    ) -> (tempfile::TempDir, State<Arc<AppState>>) {
        let dir = tempfile::tempdir().unwrap();
        let store = ScheduleStore::open(dir.path()).unwrap();
        let book = ScheduleBook::open(store, PhoneNormalizer::default()).unwrap();
        let dispatcher = Dispatcher::new(
            Arc::new(Mutex::new(book)),
            delivery,
            Arc::new(Mutex::new(NotifyRouter::new())),
        );
        let state = AppState::new(config, Arc::new(dispatcher), None);
        (dir, State(Arc::new(state)))
    }

    fn create_body(at: DateTime<Utc>) -> Json<CreateScheduleRequest> {
        Json(CreateScheduleRequest {
            message: "Hi".into(),
            recipients: vec!["0701234567".into()],
            scheduled_time: Some(at),
            ai_generated: false,
        })
    }

    #[tokio::test]
    async fn test_health_check() {
        let (_dir, state) = test_state(SmsDashConfig::default());
        let json = health_check(state).await.0;
        assert_eq!(json["status"], "ok");
        assert!(json["version"].is_string());
    }

    #[tokio::test]
    async fn test_create_and_list() {
        let (_dir, state) = test_state(SmsDashConfig::default());
        let (status, json) = create_schedule(state.clone(), create_body(Utc::now())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(json["schedule"]["recipients"][0], "+256701234567");
        assert_eq!(json["schedule"]["status"], "pending");

        let list = list_schedules(state).await.0;
        assert_eq!(list["count"], 1);
        assert_eq!(list["counts"]["pending"], 1);
        assert_eq!(list["view_mode"], "list");
    }

    #[tokio::test]
    async fn test_create_rejects_bad_input() {
        let (_dir, state) = test_state(SmsDashConfig::default());
        let (status, json) = create_schedule(
            state.clone(),
            Json(CreateScheduleRequest {
                message: "Hi".into(),
                recipients: vec!["123".into()],
                scheduled_time: Some(Utc::now()),
                ai_generated: false,
            }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["ok"], false);

        let (status, _) = create_schedule(
            state.clone(),
            Json(CreateScheduleRequest {
                message: "Hi".into(),
                recipients: vec!["0701234567".into()],
                ..Default::default()
            }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(list_schedules(state).await.0["count"], 0);
    }

    #[tokio::test]
    async fn test_edit_and_delete() {
        let (_dir, state) = test_state(SmsDashConfig::default());
        let at = Utc::now() + chrono::Duration::hours(1);
        let (_, created) = create_schedule(state.clone(), create_body(at)).await;
        let id = created["id"].as_str().unwrap().to_string();

        let (status, json) = update_schedule(
            state.clone(),
            Path(id.clone()),
            Json(EditScheduleRequest {
                message: Some("Updated".into()),
                ..Default::default()
            }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["schedule"]["message"], "Updated");

        let (status, _) = delete_schedule(state.clone(), Path(id.clone())).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = get_schedule(state, Path(id)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_dispatch_now_sends_due() {
        let (_dir, state) = test_state(SmsDashConfig::default());
        create_schedule(state.clone(), create_body(Utc::now() - chrono::Duration::minutes(1)))
            .await;

        let json = dispatch_now(state.clone()).await.0;
        assert_eq!(json["sent"], 1);

        let list = list_schedules(state.clone()).await.0;
        assert_eq!(list["schedules"][0]["status"], "sent");

        let notes = list_notifications(state, Query(NotificationsQuery::default())).await.0;
        assert_eq!(notes["notifications"][0]["level"], "success");
    }

    #[tokio::test]
    async fn test_dispatch_now_outlives_the_request() {
        let gate = Arc::new(tokio::sync::Notify::new());
        let (_dir, state) =
            test_state_with(SmsDashConfig::default(), Arc::new(GatedClient(gate.clone())));
        let (_, created) =
            create_schedule(state.clone(), create_body(Utc::now() - chrono::Duration::minutes(1)))
                .await;
        let id = created["id"].as_str().unwrap().to_string();

        let request = tokio::spawn(dispatch_now(state.clone()));
        while !state.book().lock().await.is_in_flight(&id) {
            tokio::task::yield_now().await;
        }
        request.abort();
        assert!(request.await.unwrap_err().is_cancelled());

        gate.notify_one();
        for _ in 0..100 {
            if !state.book().lock().await.is_in_flight(&id) {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        let (_, json) = get_schedule(state, Path(id)).await;
        assert_eq!(json["schedule"]["status"], "sent");
    }

    #[tokio::test]
    async fn test_notifications_since() {
        let (_dir, state) = test_state(SmsDashConfig::default());
        let before = Utc::now() - chrono::Duration::seconds(1);
        create_schedule(state.clone(), create_body(Utc::now() - chrono::Duration::minutes(1)))
            .await;
        dispatch_now(state.clone()).await;

        let recent = list_notifications(
            state.clone(),
            Query(NotificationsQuery {
                since: Some(before),
            }),
        )
        .await
        .0;
        assert_eq!(recent["notifications"].as_array().unwrap().len(), 1);

        let later = list_notifications(
            state,
            Query(NotificationsQuery {
                since: Some(Utc::now() + chrono::Duration::minutes(1)),
            }),
        )
        .await
        .0;
        assert!(later["notifications"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_generate_without_key_uses_fallback() {
        let (_dir, state) = test_state(SmsDashConfig::default());
        let (status, json) = generate_draft(
            state,
            Json(GenerateRequest {
                prompt: "birthday promo".into(),
            }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["draft"]["used_fallback"], true);
        assert_eq!(json["draft"]["ai_generated"], false);
    }

    #[tokio::test]
    async fn test_generate_without_fallback_notifies() {
        let mut config = SmsDashConfig::default();
        config.generation.fallback_message = String::new();
        let (_dir, state) = test_state(config);
        let (status, _) = generate_draft(
            state.clone(),
            Json(GenerateRequest {
                prompt: "promo".into(),
            }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);

        let notes = list_notifications(state, Query(NotificationsQuery::default())).await.0;
        assert_eq!(notes["notifications"][0]["level"], "error");
    }

    #[tokio::test]
    async fn test_view_mode() {
        let (_dir, state) = test_state(SmsDashConfig::default());
        assert_eq!(get_view_mode(state.clone()).await.0["mode"], "list");

        let (status, _) = set_view_mode(
            state.clone(),
            Json(ViewModeRequest {
                mode: "grid".into(),
            }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(get_view_mode(state.clone()).await.0["mode"], "grid");

        let (status, _) = set_view_mode(
            state,
            Json(ViewModeRequest {
                mode: "tiles".into(),
            }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_normalize_phone() {
        let (_dir, state) = test_state(SmsDashConfig::default());
        let (status, json) = normalize_phone(
            state.clone(),
            Json(NormalizeRequest {
                number: "0701 234 567".into(),
            }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["canonical"], "+256701234567");

        let (status, json) = normalize_phone(
            state,
            Json(NormalizeRequest {
                number: "abc".into(),
            }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].as_str().unwrap().contains("abc"));
    }
}
