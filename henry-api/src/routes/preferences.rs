//! Preference REST API Routes
//!
//! Scoped to the effective principal, so an admin viewing as a user reads
//! and edits that user's preferences.

use axum::{extract::State, routing::get, Json, Router};
use std::sync::Arc;

use crate::db::DbClient;
use crate::error::ApiResult;
use crate::middleware::Identity;
use crate::types::{
    ModelsResponse, Preferences, SuccessResponse, ThemesResponse, UpdatePreferencesRequest,
    AVAILABLE_MODELS, AVAILABLE_THEMES,
};

#[derive(Clone)]
pub struct PreferencesState {
    pub db: DbClient,
}

/// GET /api/preferences - Stored preferences, created with defaults on first read
pub async fn get_preferences(
    State(state): State<Arc<PreferencesState>>,
    identity: Identity,
) -> ApiResult<Json<Preferences>> {
    let user_id = identity.require_effective()?;
    let masked = |e: crate::error::ApiError| e.masked("Failed to fetch preferences");

    if let Some(prefs) = state.db.preferences_get(user_id).await.map_err(masked)? {
        return Ok(Json(prefs));
    }

    tracing::debug!(%user_id, "Creating default preferences");
    let prefs = state
        .db
        .preferences_create_default(user_id)
        .await
        .map_err(masked)?;
    Ok(Json(prefs))
}

/// PUT /api/preferences - Partial upsert
pub async fn update_preferences(
    State(state): State<Arc<PreferencesState>>,
    identity: Identity,
    Json(req): Json<UpdatePreferencesRequest>,
) -> ApiResult<Json<SuccessResponse>> {
    let user_id = identity.require_effective()?;

    state
        .db
        .preferences_upsert(user_id, &req)
        .await
        .map_err(|e| e.masked("Failed to update preferences"))?;

    tracing::info!(
        %user_id,
        performed_by = ?identity.caller_id(),
        "Preferences updated"
    );
    Ok(Json(SuccessResponse::OK))
}

/// GET /api/preferences/models - Selectable AI models
pub async fn list_models() -> Json<ModelsResponse> {
    Json(ModelsResponse {
        models: AVAILABLE_MODELS,
    })
}

/// GET /api/preferences/themes - Selectable UI themes
pub async fn list_themes() -> Json<ThemesResponse> {
    Json(ThemesResponse {
        themes: AVAILABLE_THEMES,
    })
}

/// Create the preferences router. Must be wrapped by `view_as_middleware`.
pub fn create_router(db: DbClient) -> Router {
    let state = Arc::new(PreferencesState { db });

    Router::new()
        .route("/", get(get_preferences).put(update_preferences))
        .route("/models", get(list_models))
        .route("/themes", get(list_themes))
        .with_state(state)
}
