//! Axum Middleware for View-As Identity Resolution
//!
//! This module provides Axum middleware that:
//! - Reads the caller (`x-user-id`) and optional target (`x-view-as-user`) headers
//! - Resolves the effective identity through a [`PrincipalDirectory`]
//! - Injects the resulting [`IdentityContext`] into request extensions
//! - Adds `X-View-As-*` headers to the response while impersonating
//! - Emits an audit log line for every impersonated request
//!
//! Rejections are rendered as `{"error": "..."}` with 401, 403, 404 or 500.
//! Without a view-as header nothing is rejected here; a caller header that
//! is not a principal id surfaces as 401 once a handler asks for the caller.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{request::Parts, HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use henry_core::{
    resolve_identity, IdentityContext, IdentityRejection, PrincipalDirectory, PrincipalId,
    ViewAsAudit, CALLER_HEADER, VIEW_AS_HEADER,
};
use std::sync::Arc;

use crate::constants::{
    ADMIN_USER_HEADER, VIEWING_AS_ROLE_HEADER, VIEWING_AS_USER_HEADER, VIEW_AS_ACTIVE_HEADER,
};
use crate::error::{ApiError, ApiResult};

/// Log target for impersonation audit records.
pub const AUDIT_TARGET: &str = "henry_api::audit";

// ============================================================================
// MIDDLEWARE STATE
// ============================================================================

/// Shared state for identity middleware: where principals are looked up.
#[derive(Clone)]
pub struct IdentityState {
    directory: Arc<dyn PrincipalDirectory>,
}

impl IdentityState {
    pub fn new(directory: impl PrincipalDirectory + 'static) -> Self {
        Self {
            directory: Arc::new(directory),
        }
    }

    pub fn from_arc(directory: Arc<dyn PrincipalDirectory>) -> Self {
        Self { directory }
    }

    pub fn directory(&self) -> &dyn PrincipalDirectory {
        self.directory.as_ref()
    }
}

// ============================================================================
// MIDDLEWARE FUNCTION
// ============================================================================

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|h| h.to_str().ok())
        .map(str::to_owned)
}

/// Axum middleware resolving the effective identity for every request.
///
/// # Example
///
/// ```ignore
/// use axum::{middleware, routing::get, Router};
/// use henry_api::middleware::{view_as_middleware, IdentityState};
///
/// let app = Router::new()
///     .route("/api/preferences", get(handler))
///     .layer(middleware::from_fn_with_state(IdentityState::new(db), view_as_middleware));
/// ```
pub async fn view_as_middleware(
    State(state): State<IdentityState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let caller = header_string(request.headers(), CALLER_HEADER);
    let target = header_string(request.headers(), VIEW_AS_HEADER);

    let identity = resolve_identity(state.directory(), caller.as_deref(), target.as_deref())
        .await
        .map_err(|rejection| {
            tracing::warn!(
                method = %request.method(),
                path = %request.uri().path(),
                reason = %rejection,
                "View-as resolution rejected request"
            );
            ApiError::from(rejection)
        })?;

    let audit = identity.view_as().cloned();
    if let Some(audit) = &audit {
        tracing::info!(
            target: AUDIT_TARGET,
            admin_id = %audit.admin_id,
            target_id = %audit.target_id,
            target_email = %audit.target_email,
            target_role = audit.target_role_label(),
            method = %request.method(),
            path = %request.uri().path(),
            "Admin viewing as user"
        );
    }

    request.extensions_mut().insert(identity);
    let mut response = next.run(request).await;

    if let Some(audit) = &audit {
        apply_view_as_headers(response.headers_mut(), audit);
    }

    Ok(response)
}

/// Add the impersonation headers to a response.
///
/// Values that cannot be carried in a header are skipped.
pub fn apply_view_as_headers(headers: &mut HeaderMap, audit: &ViewAsAudit) {
    let entries = [
        (VIEW_AS_ACTIVE_HEADER, "true".to_string()),
        (VIEWING_AS_USER_HEADER, audit.target_email.clone()),
        (VIEWING_AS_ROLE_HEADER, audit.target_role_label().to_string()),
        (ADMIN_USER_HEADER, audit.admin_id.to_string()),
    ];

    for (name, value) in entries {
        match HeaderValue::from_str(&value) {
            Ok(value) => {
                headers.insert(HeaderName::from_static(name), value);
            }
            Err(_) => {
                tracing::warn!(header = name, "Skipping view-as header with invalid value");
            }
        }
    }
}

// ============================================================================
// TYPED EXTRACTOR
// ============================================================================

/// Typed Axum extractor for the resolved identity.
///
/// `view_as_middleware` must be applied to the route; without it the
/// extractor fails with a 500.
#[derive(Debug, Clone)]
pub struct Identity(pub IdentityContext);

#[axum::async_trait]
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<IdentityContext>()
            .cloned()
            .map(Identity)
            .ok_or_else(|| {
                ApiError::internal_error(
                    "IdentityContext not found in request extensions. \
                     Ensure view_as_middleware is applied to this route.",
                )
            })
    }
}

impl std::ops::Deref for Identity {
    type Target = IdentityContext;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Identity {
    /// Principal whose data the request acts on.
    pub fn require_effective(&self) -> ApiResult<PrincipalId> {
        self.0.effective_id().ok_or_else(|| missing_caller(&self.0))
    }

    /// Principal performing the request.
    pub fn require_caller(&self) -> ApiResult<PrincipalId> {
        self.0.caller_id().ok_or_else(|| missing_caller(&self.0))
    }
}

/// Rejection for a request without a usable caller: 401 either way, with a
/// message that tells an absent header from one naming nobody.
pub(crate) fn missing_caller(identity: &IdentityContext) -> ApiError {
    if identity.has_unrecognized_caller() {
        ApiError::from(IdentityRejection::InvalidCaller)
    } else {
        ApiError::missing_user_header()
    }
}
