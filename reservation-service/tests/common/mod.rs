//! Common test utilities for reservation-service integration tests.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Request, Response, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use reservation_service::{
    build_router,
    config::{Environment, OAuthConfig, RateLimitConfig, ReservationConfig, SessionConfig},
    models::{LoggedIn, OperatingHours, SessionId, UserRole},
    services::{metrics, MemoryStore, OAuthClient, UserDirectory},
    AppState,
};
use secrecy::Secret;
use service_core::config::Config as CommonConfig;
use std::sync::{Arc, Once};
use tower::ServiceExt;
use wiremock::MockServer;

pub const PUBLIC_URL: &str = "http://localhost:8080";

static INIT: Once = Once::new();

pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info,reservation_service=debug")
            .with_test_writer()
            .try_init()
            .ok();
        metrics::init_metrics().ok();
    });
}

pub struct TestApp {
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub provider: MockServer,
}

pub async fn spawn_app() -> TestApp {
    init_tracing();

    let provider = MockServer::start().await;

    let config = ReservationConfig {
        common: CommonConfig { port: 8080 },
        environment: Environment::Dev,
        service_name: "reservation-service-test".to_string(),
        service_version: "test".to_string(),
        log_level: "debug".to_string(),
        public_url: PUBLIC_URL.to_string(),
        oauth: OAuthConfig {
            consumer_key: "test-consumer".to_string(),
            consumer_secret: Secret::new("test-consumer-secret".to_string()),
            provider_url: format!("{}/services", provider.uri()),
        },
        session: SessionConfig {
            ttl_minutes: 60,
            cookie_secure: true,
        },
        database: None,
        rate_limit: RateLimitConfig {
            ip_limit: 10_000,
            ip_window_seconds: 60,
        },
        operating_hours: OperatingHours::default(),
    };

    let store = Arc::new(MemoryStore::new());
    let oauth = OAuthClient::new(&config.oauth);
    let state = AppState::new(config, store.clone(), oauth);

    TestApp {
        state,
        store,
        provider,
    }
}

impl TestApp {
    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router().oneshot(request).await.unwrap()
    }

    pub async fn get(&self, uri: &str, session: Option<&str>) -> Response<Body> {
        self.send(request("GET", uri, session, None)).await
    }

    pub async fn post_json(
        &self,
        uri: &str,
        session: Option<&str>,
        body: serde_json::Value,
    ) -> Response<Body> {
        self.send(request("POST", uri, session, Some(body))).await
    }

    /// Open a logged-in session directly, skipping the provider round trip.
    pub async fn login_as(&self, user_id: i64, role: UserRole) -> String {
        let user = self
            .store
            .find_or_create_user(user_id, "Test", &format!("User{}", user_id))
            .await
            .unwrap();
        if role == UserRole::Approver {
            self.store.set_role(user_id, role).await.unwrap();
        }

        let sessions = self.state.authenticator.sessions();
        let id = sessions.begin_login("seed".to_string());
        assert!(sessions.complete_login(
            &id,
            "seed",
            LoggedIn {
                user_id,
                name: user.display_name(),
                is_approver: role == UserRole::Approver,
                has_accepted_terms: false,
            },
        ));
        id.as_str().to_string()
    }

    pub fn session(&self, id: &str) -> Option<reservation_service::models::Session> {
        self.state
            .authenticator
            .sessions()
            .get(&SessionId::from(id))
    }
}

pub fn request(
    method: &str,
    uri: &str,
    session: Option<&str>,
    body: Option<serde_json::Value>,
) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-forwarded-for", "203.0.113.7");
    if let Some(id) = session {
        builder = builder.header(header::COOKIE, format!("session_id={}", id));
    }
    match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn location(response: &Response<Body>) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

/// Value of the `session_id` cookie set by `response`, with its attributes.
pub fn set_cookie(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with("session_id="))
        .map(|v| v.to_string())
}

pub fn cookie_value(set_cookie: &str) -> String {
    set_cookie
        .trim_start_matches("session_id=")
        .split(';')
        .next()
        .unwrap_or_default()
        .to_string()
}

pub fn assert_redirect(response: &Response<Body>) {
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
}
