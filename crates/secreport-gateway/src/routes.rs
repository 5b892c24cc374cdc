//! API route handlers for the gateway.

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;

use secreport_core::{ScheduleRecord, SecReportError};
use secreport_reports::ArtifactGuard;

use crate::server::AppState;

type ApiResponse = (StatusCode, Json<Value>);

fn status_for(err: &SecReportError) -> StatusCode {
    match err {
        SecReportError::InvalidSchedule(_) => StatusCode::BAD_REQUEST,
        SecReportError::ScheduleNotFound(_) => StatusCode::NOT_FOUND,
        SecReportError::RunAlreadyInProgress(_) => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Health check endpoint.
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "secreport",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": state.start_time.elapsed().as_secs(),
        "jobs": state.schedules.scheduler().list(),
        "pools": state.pools.cached_keys().iter().map(ToString::to_string).collect::<Vec<_>>(),
    }))
}

pub async fn list_schedules(State(state): State<Arc<AppState>>) -> Json<Vec<ScheduleRecord>> {
    Json(state.schedules.list().await)
}

/// Replace the full schedule set.
pub async fn replace_schedules(
    State(state): State<Arc<AppState>>,
    Json(records): Json<Vec<ScheduleRecord>>,
) -> ApiResponse {
    match state.schedules.replace_all(records).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({"message": "Schedules updated and saved successfully."})),
        ),
        Err(SecReportError::Store(detail)) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "message": "Schedules updated in memory but failed to save to DB.",
                "details": detail,
            })),
        ),
        Err(e) => (status_for(&e), Json(json!({"message": e.to_string()}))),
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct TriggerRequest {
    #[serde(default)]
    pub id: Option<String>,
}

/// Start a manual run. The body (`{"id": ...}`) is optional.
pub async fn trigger_schedule(State(state): State<Arc<AppState>>, body: Bytes) -> ApiResponse {
    let req: TriggerRequest = if body.iter().all(u8::is_ascii_whitespace) {
        TriggerRequest::default()
    } else {
        match serde_json::from_slice(&body) {
            Ok(req) => req,
            Err(e) => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({"message": format!("Invalid request body: {e}")})),
                );
            }
        }
    };

    match state.schedules.trigger(req.id.as_deref()).await {
        Ok(record) => (
            StatusCode::ACCEPTED,
            Json(json!({
                "message": "Report generation started.",
                "id": record.id,
                "client": record.client,
            })),
        ),
        Err(SecReportError::ScheduleNotFound(_)) => (
            StatusCode::NOT_FOUND,
            Json(json!({"message": "Schedule not found or no enabled schedule available."})),
        ),
        Err(e) => (status_for(&e), Json(json!({"message": e.to_string()}))),
    }
}

/// Recent runs, newest first.
pub async fn list_runs(State(state): State<Arc<AppState>>) -> Json<Value> {
    let runs = state.schedules.runs();
    Json(json!({"count": runs.len(), "runs": runs}))
}

/// Send an ad-hoc message through the configured transport.
pub async fn test_email(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> ApiResponse {
    let to = body["to"].as_str().unwrap_or("").trim();
    if to.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"message": "Recipient (to) is required."})),
        );
    }
    let subject = body["subject"].as_str().unwrap_or("");
    let html = body["body"].as_str().unwrap_or("");

    match state.delivery.send(to, subject, html, Vec::new()).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({"message": "Test email sent successfully."})),
        ),
        Err(e) => {
            tracing::error!(error = %e, "Test email failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"message": e.to_string()})),
            )
        }
    }
}

/// Render the client's page set and return the PDF. The file is deleted
/// once its bytes are in memory.
pub async fn export_pdf(State(state): State<Arc<AppState>>, Json(body): Json<Value>) -> Response {
    let client = body["client"].as_str().map(str::trim).unwrap_or("");
    let page_ids = body["pages"].as_array().and_then(|pages| {
        pages
            .iter()
            .map(|p| match &p["id"] {
                Value::String(s) if !s.is_empty() => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect::<Option<Vec<String>>>()
    });
    let Some(page_ids) = page_ids.filter(|_| !client.is_empty()) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "Client and valid pages with valid id are required."})),
        )
            .into_response();
    };

    let artifact = match state.renderer.render_page_set(client, &page_ids).await {
        Ok(path) => ArtifactGuard::new(path),
        Err(e) => {
            tracing::error!(tenant = %client, error = %e, "PDF export failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Erro ao gerar PDF", "details": e.to_string()})),
            )
                .into_response();
        }
    };

    let filename = artifact
        .path()
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "relatorio.pdf".into());
    match tokio::fs::read(artifact.path()).await {
        Ok(bytes) => {
            artifact.release();
            (
                [
                    (header::CONTENT_TYPE, "application/pdf".to_string()),
                    (
                        header::CONTENT_DISPOSITION,
                        format!("attachment; filename=\"{filename}\""),
                    ),
                ],
                bytes,
            )
                .into_response()
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": "Erro ao gerar PDF", "details": e.to_string()})),
        )
            .into_response(),
    }
}
