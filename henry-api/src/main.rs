//! Henry API Server Entry Point
//!
//! Loads local settings, opens the database pool, and starts the Axum HTTP
//! server. A pool that cannot be opened aborts startup.

use axum::Router;
use henry_api::settings::load_local_settings;
use henry_api::telemetry::{init_tracing, TelemetryConfig};
use henry_api::{create_api_router, ApiConfig, ApiError, ApiResult, DbClient, DbConfig};

#[tokio::main]
async fn main() -> ApiResult<()> {
    let settings = load_local_settings();

    let telemetry_config = TelemetryConfig::from_env();
    init_tracing(&telemetry_config)?;
    settings.log();

    let api_config = ApiConfig::from_env()?;
    let db_config = DbConfig::from_env()?;
    tracing::info!(
        host = %db_config.host,
        port = db_config.port,
        database = %db_config.dbname,
        encrypt = db_config.encrypt,
        "Connecting to database"
    );

    let db = DbClient::from_config(&db_config);
    if let Err(e) = db.connect().await {
        tracing::error!(error = %e, "Failed to connect to database, shutting down");
        return Err(e.into());
    }

    let app: Router = create_api_router(db.clone(), &api_config)?;

    let addr = api_config.bind_addr;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;
    tracing::info!(%addr, environment = %api_config.environment, "Starting Henry API server");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;

    db.manager().shutdown().await;
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
