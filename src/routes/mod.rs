use axum::{
    extract::{Path, State},
    http::{header, HeaderValue, StatusCode},
    middleware::{self as axum_middleware},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::auth::SessionManager;
use crate::error::ApiError;
use crate::middleware;
use crate::student::{ReportGenerator, ReportService};

/// Application version from Cargo.toml
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub reports: Arc<ReportService>,
    pub sessions: Arc<SessionManager>,
}

/// Full application router with middleware
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(health_routes(state.clone()))
        .merge(report_routes(state))
        .fallback(not_found_handler)
        .layer(middleware::timeout_layer())
        .layer(middleware::trace_layer())
        .layer(axum_middleware::from_fn(middleware::request_id_middleware))
}

/// Health check routes
pub fn health_routes(state: AppState) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

/// Report routes
pub fn report_routes(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/students/:id/report", get(student_report_handler))
        .with_state(state)
}

/// GET / - Simple health check
async fn root_handler() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "message": "Report Gateway is running",
        "version": VERSION
    }))
}

/// GET /health - Detailed health check
///
/// `session` reports whether an upstream session is currently held. A
/// missing session is not unhealthy; the next report request logs in.
async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "session": state.sessions.has_session().await,
        "timestamp": Utc::now().to_rfc3339(),
        "version": VERSION
    }))
}

/// GET /api/v1/students/:id/report - Download a student report
async fn student_report_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id: i64 = id
        .parse()
        .map_err(|_| ApiError::BadRequest("Invalid student ID format".to_string()))?;

    tracing::info!(student_id = id, "Request for student report");

    let report = match state.reports.generate_report(id).await {
        Ok(report) => report,
        Err(e) if e.is_not_found() => {
            return Err(ApiError::NotFound("Student not found".to_string()));
        }
        Err(e) => {
            tracing::error!(student_id = id, error = %e, "Failed to generate report");
            return Err(ApiError::Internal(e.into()));
        }
    };

    let disposition = format!(
        "attachment; filename=\"student_{}_report.{}\"",
        id, report.file_extension
    );

    let mut response = (StatusCode::OK, report.content).into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(report.content_type),
    );
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }

    Ok(response)
}

async fn not_found_handler() -> ApiError {
    ApiError::NotFound("route not found".to_string())
}
