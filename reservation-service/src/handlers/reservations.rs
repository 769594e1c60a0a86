use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use validator::Validate;

use crate::dtos::{parse_date, CreateReservationRequest};
use crate::middleware::LoggedInSession;
use crate::models::{Reservation, ReservationResult};
use crate::AppState;

pub async fn create_reservation(
    State(state): State<AppState>,
    session: LoggedInSession,
    Json(req): Json<CreateReservationRequest>,
) -> Result<(StatusCode, Json<ReservationResult>), AppError> {
    req.validate()?;

    let result = state
        .reservations
        .create(req.into_command(session.profile.user_id))
        .await?;

    Ok((StatusCode::CREATED, Json(result)))
}

pub async fn list_by_date(
    State(state): State<AppState>,
    _session: LoggedInSession,
    Path(date): Path<String>,
) -> Result<Json<Vec<Reservation>>, AppError> {
    let date = parse_date(&date)?;
    Ok(Json(state.reservations.list_by_date(date).await?))
}

pub async fn list_pending(
    State(state): State<AppState>,
    session: LoggedInSession,
) -> Result<Json<Vec<Reservation>>, AppError> {
    Ok(Json(
        state.reservations.pending(session.profile.user_id).await?,
    ))
}

pub async fn confirm_reservation(
    State(state): State<AppState>,
    session: LoggedInSession,
    Path(id): Path<i64>,
) -> Result<Json<Reservation>, AppError> {
    Ok(Json(
        state
            .reservations
            .confirm(id, session.profile.user_id)
            .await?,
    ))
}

pub async fn cancel_reservation(
    State(state): State<AppState>,
    session: LoggedInSession,
    Path(id): Path<i64>,
) -> Result<Json<Reservation>, AppError> {
    Ok(Json(
        state.reservations.cancel(id, session.profile.user_id).await?,
    ))
}
