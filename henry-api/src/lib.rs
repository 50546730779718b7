//! Henry API - REST Layer for the Henry Assistant Backend
//!
//! This crate serves the Henry Assistant HTTP API over a shared PostgreSQL
//! pool. Two pieces carry the weight:
//!
//! - [`db::ConnectionManager`]: builds the pool with bounded retry, keeps it
//!   warm with a periodic probe, and rebuilds it when a health check fails.
//! - [`middleware::view_as_middleware`]: resolves the caller from request
//!   headers and lets admins act as another user, with audit headers on the
//!   response.

pub mod config;
pub mod constants;
pub mod db;
pub mod error;
pub mod extractors;
pub mod middleware;
pub mod routes;
pub mod settings;
pub mod telemetry;
pub mod types;

// Re-export commonly used types
pub use config::{ApiConfig, ConfigError};
pub use db::{
    ConnectionError, ConnectionManager, ConnectionPhase, DbClient, DbConfig, PgPoolBackend,
    PoolBackend, RetryPolicy, Sleeper, TokioSleeper,
};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use middleware::{require_admin, view_as_middleware, Identity, IdentityState};
pub use routes::{create_api_router, create_identity_routes};
pub use types::*;
