//! Health Check Endpoints
//!
//! - /health - Database connectivity with server time and version
//! - /health/db - Database connection details
//! - /health/live - Process alive check
//!
//! Both database checks go through a health-checked pool, so a dead pool is
//! rebuilt before the check reports. No identity required.

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use chrono::Utc;
use std::sync::Arc;

use crate::db::DbClient;
use crate::types::{
    DatabaseStatus, DbConnectivity, DbHealthResponse, HealthResponse, HealthStatus,
    LivenessResponse,
};

// ============================================================================
// STATE
// ============================================================================

#[derive(Clone)]
pub struct HealthState {
    pub db: DbClient,
    pub start_time: std::time::Instant,
}

impl HealthState {
    pub fn new(db: DbClient) -> Self {
        Self {
            db,
            start_time: std::time::Instant::now(),
        }
    }
}

// ============================================================================
// HANDLERS
// ============================================================================

/// GET /health - Database-backed health check
pub async fn health(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    match state.db.health_snapshot().await {
        Ok(snapshot) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: HealthStatus::Healthy,
                timestamp: Utc::now(),
                database: DatabaseStatus {
                    connected: true,
                    server_time: Some(snapshot.server_time),
                    version: Some(snapshot.version),
                    error: None,
                },
            }),
        ),
        Err(e) => {
            tracing::error!(error = %e, "Health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: HealthStatus::Unhealthy,
                    timestamp: Utc::now(),
                    database: DatabaseStatus {
                        connected: false,
                        server_time: None,
                        version: None,
                        error: Some(e.message),
                    },
                }),
            )
        }
    }
}

/// GET /health/db - Database connection details
pub async fn database(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    match state.db.database_details().await {
        Ok(details) => (
            StatusCode::OK,
            Json(DbHealthResponse {
                status: DbConnectivity::Connected,
                details: Some(details),
                error: None,
            }),
        ),
        Err(e) => {
            tracing::error!(error = %e, "Database health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(DbHealthResponse {
                    status: DbConnectivity::Disconnected,
                    details: None,
                    error: Some(e.message),
                }),
            )
        }
    }
}

/// GET /health/live - Process liveness check
pub async fn liveness(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    Json(LivenessResponse {
        status: "alive".to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============================================================================
// ROUTER
// ============================================================================

/// Create health check router (no identity required)
pub fn create_router(db: DbClient) -> Router {
    let state = Arc::new(HealthState::new(db));

    Router::new()
        .route("/", get(health))
        .route("/db", get(database))
        .route("/live", get(liveness))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unhealthy_response_serialization() -> Result<(), serde_json::Error> {
        let response = HealthResponse {
            status: HealthStatus::Unhealthy,
            timestamp: Utc::now(),
            database: DatabaseStatus {
                connected: false,
                server_time: None,
                version: None,
                error: Some("Database is unavailable".to_string()),
            },
        };

        let json = serde_json::to_value(&response)?;
        assert_eq!(json["status"], "unhealthy");
        assert_eq!(json["database"]["connected"], false);
        assert_eq!(json["database"]["error"], "Database is unavailable");
        Ok(())
    }

    #[test]
    fn test_db_health_serialization() -> Result<(), serde_json::Error> {
        let response = DbHealthResponse {
            status: DbConnectivity::Disconnected,
            details: None,
            error: Some("Database is unavailable".to_string()),
        };
        let json = serde_json::to_value(&response)?;
        assert_eq!(json["status"], "disconnected");
        assert!(json.get("details").is_none());
        Ok(())
    }
}
