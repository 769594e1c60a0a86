pub mod config;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;

use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use service_core::middleware::{
    rate_limit::{create_ip_rate_limiter, ip_rate_limit_middleware, IpRateLimiter},
    security_headers::security_headers_middleware,
    tracing::{request_id_middleware, REQUEST_ID_HEADER},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::config::ReservationConfig;
use crate::services::authenticator::CALLBACK_PATH;
use crate::services::{
    Authenticator, AvailabilityStore, OAuthClient, ReservationService, ReservationStore,
    SessionStore, UserDirectory,
};

#[derive(Clone)]
pub struct AppState {
    pub config: ReservationConfig,
    pub authenticator: Arc<Authenticator>,
    pub reservations: ReservationService,
    pub users: Arc<dyn UserDirectory>,
    pub ip_rate_limiter: IpRateLimiter,
}

impl AppState {
    /// Wire every component over one storage back-end.
    pub fn new<S>(config: ReservationConfig, store: Arc<S>, oauth: OAuthClient) -> Self
    where
        S: ReservationStore + AvailabilityStore + UserDirectory + 'static,
    {
        let sessions = Arc::new(SessionStore::new(config.session.ttl()));
        let users: Arc<dyn UserDirectory> = store.clone();

        let authenticator = Arc::new(Authenticator::new(
            oauth,
            sessions,
            users.clone(),
            config.public_url.clone(),
        ));
        let reservations = ReservationService::new(
            store.clone(),
            store,
            users.clone(),
            config.operating_hours,
        );
        let ip_rate_limiter = create_ip_rate_limiter(
            config.rate_limit.ip_limit,
            config.rate_limit.ip_window_seconds,
        );

        Self {
            config,
            authenticator,
            reservations,
            users,
            ip_rate_limiter,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let ip_limiter = state.ip_rate_limiter.clone();

    let api = Router::new()
        .route("/", get(handlers::auth::me))
        .route(CALLBACK_PATH, get(handlers::auth::callback))
        .route("/auth/logout", post(handlers::auth::logout))
        .route("/api/me", get(handlers::auth::me))
        .route("/api/terms/accept", post(handlers::auth::accept_terms))
        .route(
            "/api/reservations",
            post(handlers::reservations::create_reservation),
        )
        .route(
            "/api/reservations/pending",
            get(handlers::reservations::list_pending),
        )
        .route(
            "/api/reservations/:id/confirm",
            post(handlers::reservations::confirm_reservation),
        )
        .route(
            "/api/reservations/:id/cancel",
            post(handlers::reservations::cancel_reservation),
        )
        .route(
            "/api/days/:date/reservations",
            get(handlers::reservations::list_by_date),
        )
        .route(
            "/api/days/:date/availability",
            get(handlers::availability::list_availability),
        )
        .route(
            "/api/availability",
            post(handlers::availability::add_availability)
                .delete(handlers::availability::remove_availability),
        )
        .layer(from_fn_with_state(ip_limiter, ip_rate_limit_middleware));

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics))
        .merge(api)
        .with_state(state)
        .layer(from_fn(middleware::metrics_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    path = %request.uri().path(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
}
