//! Session cookie handling and the stage-gated extractor.

use axum::{
    async_trait,
    extract::{FromRequestParts, OriginalUri},
    http::request::Parts,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use service_core::error::AppError;

use crate::models::{LoggedIn, SessionId, Stage};
use crate::services::{Challenge, Gate};
use crate::AppState;

pub const SESSION_COOKIE: &str = "session_id";

pub fn session_cookie(id: &SessionId, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, id.as_str().to_string()))
        .path("/")
        .secure(secure)
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

/// Removal cookie matching the attributes of [`session_cookie`].
pub fn expired_session_cookie() -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE).path("/").build()
}

pub fn session_id_from(jar: &CookieJar) -> Option<String> {
    jar.get(SESSION_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}

/// A caller whose session completed the handshake.
#[derive(Debug, Clone)]
pub struct LoggedInSession {
    pub session_id: SessionId,
    pub profile: LoggedIn,
}

/// Rejection of [`LoggedInSession`]: either a redirect into the handshake or
/// a failure to start one.
#[derive(Debug)]
pub enum AuthRedirect {
    Handshake { challenge: Challenge, secure: bool },
    Failed(AppError),
}

impl IntoResponse for AuthRedirect {
    fn into_response(self) -> Response {
        match self {
            AuthRedirect::Handshake { challenge, secure } => {
                let jar = CookieJar::new().add(session_cookie(&challenge.session_id, secure));
                (jar, Redirect::to(&challenge.authorize_url)).into_response()
            }
            AuthRedirect::Failed(err) => err.into_response(),
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for LoggedInSession {
    type Rejection = AuthRedirect;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let session_id = session_id_from(&jar);

        let requested = parts
            .extensions
            .get::<OriginalUri>()
            .map(|uri| &uri.0)
            .unwrap_or(&parts.uri)
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| "/".to_string());

        let gate = state
            .authenticator
            .require_stage(session_id.as_deref(), Stage::LoggedIn, &requested)
            .await
            .map_err(AuthRedirect::Failed)?;

        match gate {
            Gate::Granted {
                session_id,
                session,
            } => match session.as_logged_in() {
                Some(profile) => Ok(LoggedInSession {
                    session_id,
                    profile: profile.clone(),
                }),
                None => Err(AuthRedirect::Failed(AppError::InternalError(
                    anyhow::anyhow!("Granted session is not logged in"),
                ))),
            },
            Gate::Challenge(challenge) => Err(AuthRedirect::Handshake {
                challenge,
                secure: state.config.session.cookie_secure,
            }),
        }
    }
}
