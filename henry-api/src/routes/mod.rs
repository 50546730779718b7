//! REST API Routes Module
//!
//! This module assembles all route handlers into the application router.
//!
//! Layout:
//! - `/` and `/test-db`: plain liveness and database checks
//! - `/health/*`: health checks, no identity
//! - `/api/users`, `/api/preferences`: behind `view_as_middleware`
//! - `/api/admin`: behind `view_as_middleware` and `require_admin`

pub mod admin;
pub mod health;
pub mod preferences;
pub mod user;

use axum::{
    extract::State,
    http::{header, HeaderName, HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::get,
    Json, Router,
};
use henry_core::{CALLER_HEADER, VIEW_AS_HEADER};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::ApiConfig;
use crate::constants::{
    ADMIN_USER_HEADER, VIEWING_AS_ROLE_HEADER, VIEWING_AS_USER_HEADER, VIEW_AS_ACTIVE_HEADER,
};
use crate::db::DbClient;
use crate::error::{ApiError, ApiResult};
use crate::middleware::{require_admin, view_as_middleware, IdentityState};
use crate::types::ServerTimeResponse;

// ============================================================================
// ROOT HANDLERS
// ============================================================================

/// GET / - Process is serving
pub async fn root() -> &'static str {
    "API is up!"
}

/// GET /test-db - Database time through the shared pool
pub async fn test_db(State(db): State<DbClient>) -> ApiResult<Json<ServerTimeResponse>> {
    let server_time = db
        .server_time()
        .await
        .map_err(|e| e.masked("DB test failed"))?;
    Ok(Json(ServerTimeResponse { server_time }))
}

// ============================================================================
// ROUTER ASSEMBLY
// ============================================================================

/// Build the CORS layer from the configured origins.
pub fn build_cors_layer(config: &ApiConfig) -> ApiResult<CorsLayer> {
    let origins: Vec<HeaderValue> = config
        .cors_origins()
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    if origins.is_empty() {
        return Err(ApiError::internal_error("No valid CORS origins configured"));
    }
    tracing::info!("CORS: allowing origins: {:?}", config.cors_origins());

    Ok(CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::ACCEPT,
            HeaderName::from_static(CALLER_HEADER),
            HeaderName::from_static(VIEW_AS_HEADER),
        ])
        .expose_headers([
            HeaderName::from_static(VIEW_AS_ACTIVE_HEADER),
            HeaderName::from_static(VIEWING_AS_USER_HEADER),
            HeaderName::from_static(VIEWING_AS_ROLE_HEADER),
            HeaderName::from_static(ADMIN_USER_HEADER),
        ])
        .max_age(Duration::from_secs(config.cors_max_age_secs)))
}

/// Routes under `/api`, wrapped in identity resolution.
pub fn create_identity_routes(db: DbClient, identity: IdentityState) -> Router {
    let admin_routes = admin::create_router(db.clone())
        .layer(from_fn_with_state(identity.clone(), require_admin));

    Router::new()
        .nest("/users", user::create_router(db.clone()))
        .nest("/preferences", preferences::create_router(db))
        .nest("/admin", admin_routes)
        .layer(from_fn_with_state(identity, view_as_middleware))
}

/// Create the complete application router.
pub fn create_api_router(db: DbClient, config: &ApiConfig) -> ApiResult<Router> {
    let identity = IdentityState::new(db.clone());
    let cors = build_cors_layer(config)?;

    let root_routes = Router::new()
        .route("/", get(root))
        .route("/test-db", get(test_db))
        .with_state(db.clone());

    Ok(Router::new()
        .merge(root_routes)
        .nest("/health", health::create_router(db.clone()))
        .nest("/api", create_identity_routes(db, identity))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        ))
}
