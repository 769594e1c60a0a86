use reservation_service::{
    build_router,
    config::ReservationConfig,
    services::{metrics, Database, MemoryStore, OAuthClient},
    AppState,
};
use service_core::error::AppError;
use service_core::observability::logging::init_tracing;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = ReservationConfig::from_env()?;

    init_tracing(&config.service_name, &config.log_level);

    metrics::init_metrics()
        .map_err(|e| AppError::InternalError(anyhow::anyhow!("Metrics init failed: {}", e)))?;

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        provider = %config.oauth.provider_url,
        "Starting reservation service"
    );

    let oauth = OAuthClient::new(&config.oauth);

    let state = match &config.database {
        Some(db_config) => {
            let db = Database::new(&db_config.url, db_config.max_connections).await?;
            db.run_migrations().await?;
            AppState::new(config.clone(), Arc::new(db), oauth)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, reservations are kept in memory");
            AppState::new(config.clone(), Arc::new(MemoryStore::new()), oauth)
        }
    };

    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
    tracing::info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Service shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
