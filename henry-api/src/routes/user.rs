//! User REST API Routes
//!
//! Profile reads and writes are scoped to the effective principal. Checks on
//! who may list, create, read, update or delete another user use the caller.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use henry_core::PrincipalId;
use std::sync::Arc;

use crate::constants::DEFAULT_USERS_PAGE_SIZE;
use crate::db::DbClient;
use crate::error::{ApiError, ApiResult};
use crate::extractors::PrincipalPath;
use crate::middleware::Identity;
use crate::types::{
    AdminUsersResponse, CreateUserRequest, CreatedUser, ListUsersQuery, Pagination,
    SuccessResponse, UpdateProfileRequest, UpdateUserRequest, UserResponse,
};

// ============================================================================
// STATE
// ============================================================================

#[derive(Clone)]
pub struct UserState {
    pub db: DbClient,
}

impl UserState {
    pub fn new(db: DbClient) -> Self {
        Self { db }
    }

    /// Caller must be an active principal. Returns whether they are an admin.
    async fn caller_is_admin(&self, caller: PrincipalId) -> ApiResult<bool> {
        let principal = self
            .db
            .principal_get(caller)
            .await?
            .filter(|p| p.is_active)
            .ok_or_else(|| ApiError::unauthorized("Invalid user credentials"))?;
        Ok(principal.is_privileged())
    }

    /// Caller must be an active admin.
    async fn require_admin(&self, caller: PrincipalId) -> ApiResult<()> {
        let is_admin = self
            .db
            .principal_get(caller)
            .await?
            .is_some_and(|p| p.is_active && p.is_privileged());
        if is_admin {
            Ok(())
        } else {
            Err(ApiError::forbidden("Admin access required"))
        }
    }
}

// ============================================================================
// HANDLERS
// ============================================================================

/// GET /api/users/profile - Profile of the effective principal
pub async fn get_profile(
    State(state): State<Arc<UserState>>,
    identity: Identity,
) -> ApiResult<Json<UserResponse>> {
    let user_id = identity.require_effective()?;

    let user = state
        .db
        .user_profile(user_id)
        .await
        .map_err(|e| e.masked("Failed to fetch user profile"))?
        .ok_or_else(ApiError::user_not_found)?;

    Ok(Json(UserResponse { user }))
}

/// PUT /api/users/profile - Update name or email of the effective principal
pub async fn update_profile(
    State(state): State<Arc<UserState>>,
    identity: Identity,
    Json(req): Json<UpdateProfileRequest>,
) -> ApiResult<Json<SuccessResponse>> {
    let user_id = identity.require_effective()?;
    req.validate().map_err(ApiError::invalid_input)?;
    let email = req.normalized_email();

    if let Some(email) = email {
        let taken = state
            .db
            .user_email_taken(email, user_id)
            .await
            .map_err(|e| e.masked("Failed to update profile"))?;
        if taken {
            return Err(ApiError::invalid_input("Email already in use by another user"));
        }
    }

    let updated = state
        .db
        .user_update_profile(user_id, req.full_name.as_deref(), email)
        .await
        .map_err(|e| e.masked("Failed to update profile"))?;
    if !updated {
        return Err(ApiError::user_not_found());
    }

    tracing::info!(
        user_id = %user_id,
        performed_by = ?identity.caller_id(),
        impersonating = identity.is_impersonating(),
        "User profile updated"
    );

    Ok(Json(SuccessResponse::OK))
}

/// GET /api/users/:id - Any profile for admins, otherwise only the caller's own
pub async fn get_user(
    State(state): State<Arc<UserState>>,
    identity: Identity,
    PrincipalPath(id): PrincipalPath,
) -> ApiResult<Json<UserResponse>> {
    let caller = identity.require_caller()?;

    let is_admin = state
        .caller_is_admin(caller)
        .await
        .map_err(|e| e.masked("Failed to fetch user"))?;
    if !is_admin && caller != id {
        return Err(ApiError::forbidden("Access denied"));
    }

    let user = state
        .db
        .user_profile(id)
        .await
        .map_err(|e| e.masked("Failed to fetch user"))?
        .ok_or_else(ApiError::user_not_found)?;

    Ok(Json(UserResponse { user }))
}

/// GET /api/users - Paginated listing (admin only)
pub async fn list_users(
    State(state): State<Arc<UserState>>,
    identity: Identity,
    Query(query): Query<ListUsersQuery>,
) -> ApiResult<Json<AdminUsersResponse>> {
    let caller = identity.require_caller()?;
    state
        .require_admin(caller)
        .await
        .map_err(|e| e.masked("Failed to fetch users"))?;

    let window = query.window_or(DEFAULT_USERS_PAGE_SIZE);
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

/// POST /api/users - Create a user with default preferences (admin only)
pub async fn create_user(
    State(state): State<Arc<UserState>>,
    identity: Identity,
    Json(req): Json<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<CreatedUser>)> {
    let caller = identity.require_caller()?;
    state
        .require_admin(caller)
        .await
        .map_err(|e| e.masked("Failed to create user"))?;

    let user = req.validate().map_err(ApiError::invalid_input)?;

    let exists = state
        .db
        .user_email_exists(&user.email)
        .await
        .map_err(|e| e.masked("Failed to create user"))?;
    if exists {
        return Err(ApiError::invalid_input("Email already exists"));
    }

    let id = state
        .db
        .user_create(&user)
        .await
        .map_err(|e| e.masked("Failed to create user"))?;

    tracing::info!(user_id = %id, role = %user.role, performed_by = %caller, "User created");
    Ok((
        StatusCode::CREATED,
        Json(CreatedUser {
            id,
            azure_id: user.azure_id,
            email: user.email,
            full_name: user.full_name,
            role: user.role,
        }),
    ))
}

/// PUT /api/users/:id - Update email, name, role or active flag (admin only)
pub async fn update_user(
    State(state): State<Arc<UserState>>,
    identity: Identity,
    PrincipalPath(id): PrincipalPath,
    Json(req): Json<UpdateUserRequest>,
) -> ApiResult<Json<SuccessResponse>> {
    let caller = identity.require_caller()?;
    state
        .require_admin(caller)
        .await
        .map_err(|e| e.masked("Failed to update user"))?;
    req.validate().map_err(ApiError::invalid_input)?;

    if let Some(email) = req.normalized_email() {
        let taken = state
            .db
            .user_email_taken(email, id)
            .await
            .map_err(|e| e.masked("Failed to update user"))?;
        if taken {
            return Err(ApiError::invalid_input("Email already in use by another user"));
        }
    }

    let updated = state
        .db
        .admin_update_user(id, &req)
        .await
        .map_err(|e| e.masked("Failed to update user"))?;
    if !updated {
        return Err(ApiError::user_not_found());
    }

    tracing::info!(
        user_id = %id,
        performed_by = %caller,
        role = ?req.role,
        is_active = ?req.is_active,
        "User updated"
    );
    Ok(Json(SuccessResponse::OK))
}

/// DELETE /api/users/:id - Soft delete (admin only)
pub async fn delete_user(
    State(state): State<Arc<UserState>>,
    identity: Identity,
    PrincipalPath(id): PrincipalPath,
) -> ApiResult<Json<SuccessResponse>> {
    let caller = identity.require_caller()?;
    state
        .require_admin(caller)
        .await
        .map_err(|e| e.masked("Failed to delete user"))?;

    if caller == id {
        return Err(ApiError::invalid_input("Cannot delete your own account"));
    }

    let deactivated = state
        .db
        .user_deactivate(id)
        .await
        .map_err(|e| e.masked("Failed to delete user"))?;
    if !deactivated {
        return Err(ApiError::user_not_found());
    }

    tracing::info!(user_id = %id, performed_by = %caller, "User deactivated");
    Ok(Json(SuccessResponse::OK))
}

// ============================================================================
// ROUTER
// ============================================================================

/// Create the user router. Must be wrapped by `view_as_middleware`.
pub fn create_router(db: DbClient) -> Router {
    let state = Arc::new(UserState::new(db));

    Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/profile", get(get_profile).put(update_profile))
        .route("/:id", get(get_user).put(update_user).delete(delete_user))
        .with_state(state)
}
