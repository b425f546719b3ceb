//! HTTP server implementation using Axum.

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use linkmind_core::{Clock, config::LinkMindConfig};
use linkmind_scheduler::{DispatchWorker, SchedulingGateway};
use linkmind_store::{SqliteBookmarkRepo, TaskStore};

/// Shared state for the API server.
pub struct AppState {
    pub config: LinkMindConfig,
    pub store: Arc<TaskStore>,
    pub bookmarks: Arc<SqliteBookmarkRepo>,
    pub gateway: Arc<SchedulingGateway>,
    pub worker: Arc<DispatchWorker>,
    pub clock: Arc<dyn Clock>,
    pub start_time: std::time::Instant,
}

/// Build the Axum router with all routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(super::routes::health_check))
        .route("/api/v1/info", get(super::routes::system_info))
        .route(
            "/api/v1/events/bookmark-created",
            post(super::routes::bookmark_created),
        )
        .route(
            "/api/v1/events/bookmark-read",
            post(super::routes::bookmark_read),
        )
        .route(
            "/api/v1/events/bookmark-unread",
            post(super::routes::bookmark_unread),
        )
        .route(
            "/api/v1/events/interval-changed",
            post(super::routes::interval_changed),
        )
        .route(
            "/api/v1/events/bookmark-deleted",
            post(super::routes::bookmark_deleted),
        )
        .route("/api/v1/dispatch-now", post(super::routes::dispatch_now))
        .route(
            "/api/v1/bookmarks/{bookmark_id}/reminder",
            get(super::routes::reminder_status),
        )
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until shutdown.
pub async fn start(state: Arc<AppState>) -> anyhow::Result<()> {
    let addr = format!("{}:{}", state.config.api.host, state.config.api.port);
    let router = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("🌐 LinkMind API listening on http://{addr}");
    axum::serve(listener, router).await?;
    Ok(())
}
