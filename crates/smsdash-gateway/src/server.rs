//! HTTP server implementation using Axum.

use axum::{
    Router,
    routing::{get, post},
};
use smsdash_core::config::{GatewayConfig, SmsDashConfig};
use smsdash_core::traits::TextGenerator;
use smsdash_scheduler::{Dispatcher, NotifyRouter, ScheduleBook};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::routes;

/// Shared state for the gateway server.
pub struct AppState {
    pub config: SmsDashConfig,
    pub start_time: std::time::Instant,
    /// Dispatcher, also owner of the schedule book and notifications.
    pub dispatcher: Arc<Dispatcher>,
    /// None when no generation API key is configured.
    pub generator: Option<Arc<dyn TextGenerator>>,
}

impl AppState {
    pub fn new(
        config: SmsDashConfig,
        dispatcher: Arc<Dispatcher>,
        generator: Option<Arc<dyn TextGenerator>>,
    ) -> Self {
        Self {
            config,
            start_time: std::time::Instant::now(),
            dispatcher,
            generator,
        }
    }

    pub fn book(&self) -> &Arc<Mutex<ScheduleBook>> {
        self.dispatcher.book()
    }

    pub fn notifier(&self) -> &Arc<Mutex<NotifyRouter>> {
        self.dispatcher.notifier()
    }
}

/// Build the Axum router with all routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = {
        let cors = CorsLayer::new()
            .allow_methods([
                axum::http::Method::GET,
                axum::http::Method::POST,
                axum::http::Method::PUT,
                axum::http::Method::DELETE,
                axum::http::Method::OPTIONS,
            ])
            .allow_headers(Any)
            .max_age(std::time::Duration::from_secs(3600));

        // Example: SMSDASH_CORS_ORIGINS=https://dash.example.com,https://ops.example.com
        if let Ok(origins_str) = std::env::var("SMSDASH_CORS_ORIGINS") {
            let origins: Vec<_> = origins_str
                .split(',')
                .filter_map(|s| s.trim().parse::<axum::http::HeaderValue>().ok())
                .collect();
            cors.allow_origin(origins)
        } else {
            cors.allow_origin(Any)
        }
    };

    Router::new()
        .route("/health", get(routes::health_check))
        .route(
            "/api/v1/schedules",
            get(routes::list_schedules).post(routes::create_schedule),
        )
        .route("/api/v1/schedules/generate", post(routes::generate_draft))
        .route("/api/v1/schedules/dispatch", post(routes::dispatch_now))
        .route(
            "/api/v1/schedules/{id}",
            get(routes::get_schedule)
                .put(routes::update_schedule)
                .delete(routes::delete_schedule),
        )
        .route(
            "/api/v1/preferences/view-mode",
            get(routes::get_view_mode).put(routes::set_view_mode),
        )
        .route("/api/v1/notifications", get(routes::list_notifications))
        .route("/api/v1/phone/normalize", post(routes::normalize_phone))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

/// Serve the API until `shutdown` resolves.
pub async fn start(
    state: Arc<AppState>,
    config: &GatewayConfig,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let app = build_router(state);
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("🌐 Gateway server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    tracing::info!("🛑 Gateway server stopped");
    Ok(())
}
