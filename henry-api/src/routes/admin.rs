//! Admin Dashboard Routes
//!
//! Every route here is mounted behind `require_admin`.

use axum::{
    extract::{Query, State},
    routing::{get, put},
    Json, Router,
};
use std::sync::Arc;

use crate::db::DbClient;
use crate::error::{ApiError, ApiResult};
use crate::extractors::PrincipalPath;
use crate::middleware::Identity;
use crate::types::{
    AdminStats, AdminUpdateUserRequest, AdminUsersResponse, ListUsersQuery, Pagination,
    SuccessResponse, SystemHealth, UpdateUserRequest,
};

#[derive(Clone)]
pub struct AdminState {
    pub db: DbClient,
}

/// GET /api/admin/stats - System-wide statistics
pub async fn stats(State(state): State<Arc<AdminState>>) -> ApiResult<Json<AdminStats>> {
    let stats = state
        .db
        .admin_stats()
        .await
        .map_err(|e| e.masked("Failed to fetch admin statistics"))?;
    Ok(Json(stats))
}

/// GET /api/admin/users - Paginated user listing
pub async fn list_users(
    State(state): State<Arc<AdminState>>,
    Query(query): Query<ListUsersQuery>,
) -> ApiResult<Json<AdminUsersResponse>> {
    let window = query.window();
    let (users, total) = state
        .db
        .admin_list_users(&query, window)
        .await
        .map_err(|e| e.masked("Failed to fetch users"))?;

    Ok(Json(AdminUsersResponse {
        users,
        pagination: Pagination::new(window, total),
    }))
}

/// PUT /api/admin/users/:id - Change role or active status
pub async fn update_user(
    State(state): State<Arc<AdminState>>,
    identity: Identity,
    PrincipalPath(id): PrincipalPath,
    Json(req): Json<AdminUpdateUserRequest>,
) -> ApiResult<Json<SuccessResponse>> {
    let updated = state
        .db
        .admin_update_user(id, &UpdateUserRequest::from(req.clone()))
        .await
        .map_err(|e| e.masked("Failed to update user"))?;
    if !updated {
        return Err(ApiError::user_not_found());
    }

    tracing::info!(
        user_id = %id,
        performed_by = ?identity.caller_id(),
        role = ?req.role,
        is_active = ?req.is_active,
        "Admin updated user"
    );
    Ok(Json(SuccessResponse::OK))
}

/// GET /api/admin/system-health - Database time and last-hour activity
pub async fn system_health(State(state): State<Arc<AdminState>>) -> ApiResult<Json<SystemHealth>> {
    let health = state
        .db
        .system_health()
        .await
        .map_err(|e| e.masked("System health check failed"))?;
    Ok(Json(health))
}

/// Create the admin router. Callers must layer `require_admin` on it.
pub fn create_router(db: DbClient) -> Router {
    let state = Arc::new(AdminState { db });

    Router::new()
        .route("/stats", get(stats))
        .route("/users", get(list_users))
        .route("/users/:id", put(update_user))
        .route("/system-health", get(system_health))
        .with_state(state)
}
