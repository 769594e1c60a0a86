//! Login state machine: `Anonymous -> LoggingIn -> LoggedIn`.
//!
//! [`Authenticator::require_stage`] is a generative gate. A caller without a
//! session in the wanted stage is not rejected; a handshake is started for it
//! and the caller is told where to send the browser.

use serde::Deserialize;
use service_core::error::AppError;
use service_core::utils::percent_encode;
use std::sync::Arc;
use url::Url;

use super::metrics;
use super::oauth::OAuthClient;
use super::session_store::SessionStore;
use super::store::UserDirectory;
use crate::models::{LoggedIn, Session, SessionId, Stage};

/// Path the provider redirects back to.
pub const CALLBACK_PATH: &str = "/token";

/// Landing page for failed or abandoned handshakes.
pub const ENTRY_POINT: &str = "/";

#[derive(Debug)]
pub enum Gate {
    Granted {
        session_id: SessionId,
        session: Session,
    },
    Challenge(Challenge),
}

/// A freshly opened `LoggingIn` session and the provider URL to send the
/// browser to.
#[derive(Debug, Clone)]
pub struct Challenge {
    pub session_id: SessionId,
    pub authorize_url: String,
}

/// Query string of the provider's callback.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct CallbackQuery {
    pub oauth_token: Option<String>,
    pub oauth_verifier: Option<String>,
    pub next: Option<String>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Completion {
    /// Logged in; continue at `target`.
    Resume {
        session_id: SessionId,
        target: String,
    },
    /// Handshake failed; start over at the entry point.
    Restart,
}

pub struct Authenticator {
    oauth: OAuthClient,
    sessions: Arc<SessionStore>,
    users: Arc<dyn UserDirectory>,
    public_url: String,
}

impl Authenticator {
    pub fn new(
        oauth: OAuthClient,
        sessions: Arc<SessionStore>,
        users: Arc<dyn UserDirectory>,
        public_url: impl Into<String>,
    ) -> Self {
        Self {
            oauth,
            sessions,
            users,
            public_url: public_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// Grant access when `session_id` names a live session in `stage`,
    /// otherwise open a handshake that resumes at `requested_url`.
    pub async fn require_stage(
        &self,
        session_id: Option<&str>,
        stage: Stage,
        requested_url: &str,
    ) -> Result<Gate, AppError> {
        if let Some(raw) = session_id {
            let id = SessionId::from(raw);
            match self.sessions.get(&id) {
                Some(session) if session.stage() == stage => {
                    return Ok(Gate::Granted {
                        session_id: id,
                        session,
                    });
                }
                Some(session) => {
                    tracing::debug!(
                        session = %id,
                        have = session.stage().as_str(),
                        want = stage.as_str(),
                        "Session in wrong stage, restarting handshake"
                    );
                    self.sessions.remove(&id);
                }
                None => {}
            }
        }

        self.challenge(requested_url).await.map(Gate::Challenge)
    }

    async fn challenge(&self, requested_url: &str) -> Result<Challenge, AppError> {
        let callback = format!(
            "{}{}?next={}",
            self.public_url,
            CALLBACK_PATH,
            percent_encode(requested_url)
        );

        let pair = match self.oauth.request_token(&callback).await {
            Ok(pair) => pair,
            Err(e) => {
                metrics::record_handshake("request_token", "error");
                tracing::warn!(error = %e, "Failed to obtain request token");
                return Err(e.into());
            }
        };
        metrics::record_handshake("request_token", "ok");

        let authorize_url = self.oauth.authorize_url(&pair.token);
        let session_id = self.sessions.begin_login(pair.secret);
        tracing::info!(session = %session_id, "Handshake started");

        Ok(Challenge {
            session_id,
            authorize_url,
        })
    }

    /// Finish the handshake for the callback carrying `query`.
    ///
    /// Provider failures and incomplete callbacks yield [`Completion::Restart`]
    /// and leave the session untouched. Only storage failures are errors.
    pub async fn complete_handshake(
        &self,
        session_id: Option<&str>,
        query: CallbackQuery,
    ) -> Result<Completion, AppError> {
        let (Some(raw_id), Some(token), Some(verifier), Some(next)) = (
            session_id,
            query.oauth_token.filter(|v| !v.is_empty()),
            query.oauth_verifier.filter(|v| !v.is_empty()),
            query.next,
        ) else {
            tracing::info!("Incomplete OAuth callback");
            return Ok(Completion::Restart);
        };

        let id = SessionId::from(raw_id);
        let Some(token_secret) = self
            .sessions
            .get(&id)
            .and_then(|s| s.as_logging_in().map(|p| p.token_secret.clone()))
        else {
            tracing::info!(session = %id, "Callback without a pending handshake");
            return Ok(Completion::Restart);
        };

        let access = match self
            .oauth
            .exchange_verifier(&token, &token_secret, &verifier)
            .await
        {
            Ok(pair) => pair,
            Err(e) => {
                metrics::record_handshake("access_token", "error");
                tracing::warn!(session = %id, error = %e, "Verifier exchange failed");
                return Ok(Completion::Restart);
            }
        };
        metrics::record_handshake("access_token", "ok");

        let identity = match self.oauth.fetch_identity(&access).await {
            Ok(user) => user,
            Err(e) => {
                metrics::record_handshake("identity", "error");
                tracing::warn!(session = %id, error = %e, "Identity lookup failed");
                return Ok(Completion::Restart);
            }
        };
        metrics::record_handshake("identity", "ok");

        let user = self
            .users
            .find_or_create_user(identity.id, &identity.first_name, &identity.last_name)
            .await?;

        let profile = LoggedIn {
            user_id: user.id,
            name: user.display_name(),
            is_approver: user.is_approver(),
            has_accepted_terms: user.accepted_terms,
        };

        if !self.sessions.complete_login(&id, &token_secret, profile) {
            tracing::info!(session = %id, "Session changed during handshake");
            return Ok(Completion::Restart);
        }

        tracing::info!(session = %id, user_id = user.id, "Handshake completed");
        Ok(Completion::Resume {
            session_id: id,
            target: self.resume_target(&next),
        })
    }

    /// Record terms acceptance for `user_id` and mirror it into the session.
    ///
    /// Returns the refreshed profile, or `None` when the session ended in
    /// the meantime; the acceptance itself is kept either way.
    pub async fn accept_terms(
        &self,
        session_id: &SessionId,
        user_id: i64,
    ) -> Result<Option<LoggedIn>, AppError> {
        self.users.accept_terms(user_id).await?;

        let mut refreshed = None;
        self.sessions
            .update_logged_in_profile(session_id, |profile| {
                profile.has_accepted_terms = true;
                refreshed = Some(profile.clone());
            });
        if refreshed.is_none() {
            tracing::info!(user_id, "Terms accepted after session ended");
        }
        Ok(refreshed)
    }

    pub fn logout(&self, session_id: &str) -> bool {
        self.sessions.remove(&SessionId::from(session_id))
    }

    /// `next` if it stays on this service, else the entry point.
    pub fn resume_target(&self, next: &str) -> String {
        if next.starts_with('/') && !next.starts_with("//") && !next.starts_with("/\\") {
            return next.to_string();
        }

        let same_origin = match (Url::parse(next), Url::parse(&self.public_url)) {
            (Ok(target), Ok(public)) => target.origin() == public.origin(),
            _ => false,
        };
        if same_origin {
            next.to_string()
        } else {
            tracing::warn!("Discarding off-site resume target");
            ENTRY_POINT.to_string()
        }
    }
}
