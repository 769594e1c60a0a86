use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use service_core::error::AppError;

use crate::dtos::ProfileResponse;
use crate::middleware::session::{
    expired_session_cookie, session_cookie, session_id_from, AuthRedirect,
};
use crate::middleware::LoggedInSession;
use crate::models::Stage;
use crate::services::authenticator::ENTRY_POINT;
use crate::services::{CallbackQuery, Completion, Gate};
use crate::AppState;

/// Provider callback: `GET /token?oauth_token=..&oauth_verifier=..&next=..`.
///
/// Only a `LoggingIn` session may complete here; any other caller is sent
/// into a fresh handshake that resumes at `next`.
pub async fn callback(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(query): Query<CallbackQuery>,
) -> Result<Response, AppError> {
    let resume = state
        .authenticator
        .resume_target(query.next.as_deref().unwrap_or(ENTRY_POINT));
    let gate = state
        .authenticator
        .require_stage(session_id_from(&jar).as_deref(), Stage::LoggingIn, &resume)
        .await?;

    let session_id = match gate {
        Gate::Granted { session_id, .. } => session_id,
        Gate::Challenge(challenge) => {
            return Ok(AuthRedirect::Handshake {
                challenge,
                secure: state.config.session.cookie_secure,
            }
            .into_response());
        }
    };

    let outcome = state
        .authenticator
        .complete_handshake(Some(session_id.as_str()), query)
        .await?;

    Ok(match outcome {
        Completion::Resume { session_id, target } => {
            let jar = jar.add(session_cookie(
                &session_id,
                state.config.session.cookie_secure,
            ));
            (jar, Redirect::to(&target)).into_response()
        }
        Completion::Restart => Redirect::to(ENTRY_POINT).into_response(),
    })
}

/// Also served at the entry point, where anonymous callers are sent into
/// the handshake.
pub async fn me(session: LoggedInSession) -> Json<ProfileResponse> {
    Json(session.profile.into())
}

pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> impl IntoResponse {
    if let Some(id) = session_id_from(&jar) {
        if state.authenticator.logout(&id) {
            tracing::info!("Session ended");
        }
    }
    (jar.remove(expired_session_cookie()), StatusCode::NO_CONTENT)
}

pub async fn accept_terms(
    State(state): State<AppState>,
    session: LoggedInSession,
) -> Result<Response, AppError> {
    let refreshed = state
        .authenticator
        .accept_terms(&session.session_id, session.profile.user_id)
        .await?;

    Ok(match refreshed {
        Some(profile) => {
            tracing::info!(user_id = profile.user_id, "Terms accepted");
            Json(ProfileResponse::from(profile)).into_response()
        }
        // session ended meanwhile; nothing to report back
        None => StatusCode::NO_CONTENT.into_response(),
    })
}
