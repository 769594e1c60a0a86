use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;

use crate::dtos::{parse_date, AvailabilityRequest};
use crate::middleware::LoggedInSession;
use crate::models::ApproverAvailability;
use crate::AppState;

pub async fn add_availability(
    State(state): State<AppState>,
    session: LoggedInSession,
    Json(req): Json<AvailabilityRequest>,
) -> Result<(StatusCode, Json<ApproverAvailability>), AppError> {
    let entry = state
        .reservations
        .add_availability(session.profile.user_id, req.date, req.window())
        .await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

pub async fn remove_availability(
    State(state): State<AppState>,
    session: LoggedInSession,
    Json(req): Json<AvailabilityRequest>,
) -> Result<StatusCode, AppError> {
    state
        .reservations
        .remove_availability(session.profile.user_id, req.date, req.window())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_availability(
    State(state): State<AppState>,
    _session: LoggedInSession,
    Path(date): Path<String>,
) -> Result<Json<Vec<ApproverAvailability>>, AppError> {
    let date = parse_date(&date)?;
    Ok(Json(state.reservations.list_availability(date).await?))
}
