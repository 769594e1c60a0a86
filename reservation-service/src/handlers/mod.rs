//! HTTP handlers for reservation-service.

pub mod auth;
pub mod availability;
pub mod reservations;

use axum::{extract::State, http::header, response::IntoResponse, Json};
use serde_json::json;
use service_core::error::AppError;

use crate::AppState;

pub async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.users.health_check().await.map_err(|e| {
        tracing::error!(error = %e, "Storage health check failed");
        AppError::from(e)
    })?;

    Ok(Json(json!({
        "status": "ok",
        "service": state.config.service_name,
        "version": state.config.service_version,
    })))
}

pub async fn metrics() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        crate::services::metrics::get_metrics(),
    )
}
