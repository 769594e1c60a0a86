//! Three-legged OAuth 1.0a client for the identity provider.

use reqwest::Client;
use serde::{Deserialize, Deserializer};
use service_core::error::AppError;
use service_core::utils::{percent_encode, OAuthSigner, SignatureError};
use std::collections::HashMap;
use thiserror::Error;

use crate::config::OAuthConfig;

#[derive(Error, Debug)]
pub enum HandshakeError {
    #[error("Failed to reach identity provider: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Identity provider returned {status} from {endpoint}")]
    Status {
        endpoint: &'static str,
        status: reqwest::StatusCode,
    },

    #[error("Identity provider response is missing {0}")]
    MissingField(&'static str),

    #[error("Identity provider returned an unreadable user record: {0}")]
    InvalidIdentity(String),

    #[error(transparent)]
    Signature(#[from] SignatureError),
}

impl From<HandshakeError> for AppError {
    fn from(err: HandshakeError) -> Self {
        match err {
            HandshakeError::Signature(e) => AppError::SignatureError(e),
            other => AppError::BadGateway(other.to_string()),
        }
    }
}

/// Token and secret issued by the provider, temporary or long-lived.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub token: String,
    pub secret: String,
}

impl std::fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenPair")
            .field("token", &self.token)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// Parse a `key=value&key=value` token response.
///
/// Values are taken verbatim; the provider never escapes them.
pub fn parse_token_response(body: &str) -> Result<TokenPair, HandshakeError> {
    let fields: HashMap<&str, &str> = body
        .trim()
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .collect();

    let token = fields
        .get("oauth_token")
        .filter(|v| !v.is_empty())
        .ok_or(HandshakeError::MissingField("oauth_token"))?;
    let secret = fields
        .get("oauth_token_secret")
        .ok_or(HandshakeError::MissingField("oauth_token_secret"))?;

    Ok(TokenPair {
        token: token.to_string(),
        secret: secret.to_string(),
    })
}

/// The provider's own user record.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProviderUser {
    #[serde(deserialize_with = "string_or_number")]
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(i64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

#[derive(Debug, Clone)]
struct Endpoints {
    request_token: String,
    access_token: String,
    authorize: String,
    user: String,
}

impl Endpoints {
    fn new(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            request_token: format!("{}/oauth/request_token", base),
            access_token: format!("{}/oauth/access_token", base),
            authorize: format!("{}/oauth/authorize", base),
            user: format!("{}/users/user", base),
        }
    }
}

#[derive(Clone)]
pub struct OAuthClient {
    signer: OAuthSigner,
    client: Client,
    endpoints: Endpoints,
}

impl OAuthClient {
    pub fn new(config: &OAuthConfig) -> Self {
        Self::with_client(config, Client::new())
    }

    pub fn with_client(config: &OAuthConfig, client: Client) -> Self {
        Self {
            signer: OAuthSigner::new(config.credentials()),
            client,
            endpoints: Endpoints::new(&config.provider_url),
        }
    }

    /// Browser redirect target for an issued request token.
    pub fn authorize_url(&self, token: &str) -> String {
        format!(
            "{}?oauth_token={}",
            self.endpoints.authorize,
            percent_encode(token)
        )
    }

    /// Obtain a temporary token bound to `callback_url`.
    pub async fn request_token(&self, callback_url: &str) -> Result<TokenPair, HandshakeError> {
        let params = self
            .signer
            .protocol_params([("oauth_callback".to_string(), callback_url.to_string())]);
        let header =
            self.signer
                .authorization_header("POST", &self.endpoints.request_token, "", &params)?;

        let body = self
            .post("request_token", &self.endpoints.request_token, header)
            .await?;
        let pair = parse_token_response(&body)?;

        tracing::debug!("Request token issued");
        Ok(pair)
    }

    /// Trade an authorised request token and its verifier for an access token.
    pub async fn exchange_verifier(
        &self,
        token: &str,
        token_secret: &str,
        verifier: &str,
    ) -> Result<TokenPair, HandshakeError> {
        let params = self.signer.protocol_params([
            ("oauth_token".to_string(), token.to_string()),
            ("oauth_verifier".to_string(), verifier.to_string()),
        ]);
        let header = self.signer.authorization_header(
            "POST",
            &self.endpoints.access_token,
            token_secret,
            &params,
        )?;

        let body = self
            .post("access_token", &self.endpoints.access_token, header)
            .await?;
        let pair = parse_token_response(&body)?;

        tracing::debug!("Access token issued");
        Ok(pair)
    }

    /// Load the user behind an access token.
    pub async fn fetch_identity(&self, access: &TokenPair) -> Result<ProviderUser, HandshakeError> {
        let params = self
            .signer
            .protocol_params([("oauth_token".to_string(), access.token.clone())]);
        let header = self.signer.authorization_header(
            "GET",
            &self.endpoints.user,
            &access.secret,
            &params,
        )?;

        let response = self
            .client
            .get(&self.endpoints.user)
            .header(reqwest::header::AUTHORIZATION, header)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(HandshakeError::Status {
                endpoint: "users/user",
                status: response.status(),
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| HandshakeError::InvalidIdentity(e.to_string()))
    }

    async fn post(
        &self,
        endpoint: &'static str,
        url: &str,
        authorization: String,
    ) -> Result<String, HandshakeError> {
        let response = self
            .client
            .post(url)
            .header(reqwest::header::AUTHORIZATION, authorization)
            .header(reqwest::header::CONTENT_LENGTH, 0)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            tracing::warn!(endpoint, %status, "Identity provider rejected token request");
            return Err(HandshakeError::Status { endpoint, status });
        }

        Ok(response.text().await?)
    }
}
