//! HTTP server implementation using Axum.

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use secreport_core::Result;
use secreport_core::config::ServerConfig;
use secreport_db::{ConnectionRouter, PgConnector};
use secreport_mail::DeliveryService;
use secreport_render::DocumentRenderer;
use secreport_reports::ScheduleService;

/// Shared state for the gateway server.
pub struct AppState {
    /// Tenant database pools, shared with the Postgres config store.
    pub pools: Arc<ConnectionRouter<PgConnector>>,
    pub schedules: Arc<ScheduleService>,
    pub delivery: Arc<DeliveryService>,
    pub renderer: Arc<DocumentRenderer>,
    pub start_time: std::time::Instant,
}

/// Build the Axum router with all routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(super::routes::health_check))
        .route(
            "/api/schedule",
            get(super::routes::list_schedules).post(super::routes::replace_schedules),
        )
        .route("/api/schedule/trigger", post(super::routes::trigger_schedule))
        .route("/api/schedule/runs", get(super::routes::list_runs))
        .route("/api/email/test", post(super::routes::test_email))
        .route("/api/export-pdf", post(super::routes::export_pdf))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until the process stops.
pub async fn start_server(config: &ServerConfig, state: Arc<AppState>) -> Result<()> {
    let app = build_router(state);
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("🌐 SecReport API listening on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
