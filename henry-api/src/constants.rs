//! Constants for the Henry API
//!
//! This module contains all constant values used throughout the API.
//! Centralizing constants makes them easy to find, modify, and test.

use std::time::Duration;

// ============================================================================
// DATABASE CONNECTION
// ============================================================================

/// Fixed delay between pool-open attempts (no exponential backoff).
pub const CONNECTION_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Default maximum number of pool-open attempts before giving up.
pub const DEFAULT_MAX_CONNECTION_RETRIES: u32 = 3;

/// Default keep-alive probe interval (4 minutes).
pub const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_millis(240_000);

/// Shortest keep-alive period the manager will schedule.
pub const MIN_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(1);

/// Trivial query used by keep-alive and health probes.
pub const PROBE_QUERY: &str = "SELECT 1";

pub const DEFAULT_DB_PORT: u16 = 5432;
pub const DEFAULT_POOL_MAX: usize = 10;
pub const DEFAULT_POOL_MIN: usize = 2;
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 60_000;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 60_000;

/// Default idle timeout (15 minutes).
pub const DEFAULT_IDLE_TIMEOUT_MS: u64 = 900_000;

/// Timeout for recycling a pooled connection.
pub const POOL_RECYCLE_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================================================
// VIEW-AS RESPONSE HEADERS
// ============================================================================

pub const VIEW_AS_ACTIVE_HEADER: &str = "x-view-as-active";
pub const VIEWING_AS_USER_HEADER: &str = "x-viewing-as-user";
pub const VIEWING_AS_ROLE_HEADER: &str = "x-viewing-as-role";
pub const ADMIN_USER_HEADER: &str = "x-admin-user";

// ============================================================================
// CORS
// ============================================================================

/// Origins always allowed in addition to `FRONTEND_URL`.
pub const LOCAL_DEV_ORIGINS: &[&str] = &["http://localhost:3000", "http://localhost:8080"];

/// Default CORS max age in seconds (24 hours)
pub const DEFAULT_CORS_MAX_AGE_SECS: u64 = 86400;

// ============================================================================
// SERVER
// ============================================================================

pub const DEFAULT_BIND_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 3000;

/// File loaded into the environment outside production.
pub const LOCAL_SETTINGS_FILE: &str = "local.settings.json";

// ============================================================================
// PAGINATION
// ============================================================================

/// Default page size for list operations
pub const DEFAULT_PAGE_SIZE: i64 = 50;

/// Default page size of `GET /api/users`
pub const DEFAULT_USERS_PAGE_SIZE: i64 = 20;

/// Maximum page size for list operations
pub const MAX_PAGE_SIZE: i64 = 1000;
