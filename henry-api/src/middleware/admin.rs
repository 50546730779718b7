//! Admin-only route guard.
//!
//! Checks the **caller** identity, never the impersonated one: an admin
//! viewing as a regular user keeps admin access, and a regular user cannot
//! gain it through the view-as header.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use henry_core::IdentityContext;

use crate::error::ApiError;
use crate::middleware::view_as::{missing_caller, IdentityState};

/// Reject requests whose caller is not an active admin.
///
/// Must run inside `view_as_middleware`.
pub async fn require_admin(
    State(state): State<IdentityState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let caller = match request.extensions().get::<IdentityContext>() {
        Some(identity) => identity.caller_id().ok_or_else(|| missing_caller(identity))?,
        None => return Err(ApiError::missing_user_header()),
    };

    let principal = state
        .directory()
        .find_principal(caller)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, %caller, "Admin verification lookup failed");
            ApiError::internal_error("Failed to verify admin status")
        })?;

    match principal {
        Some(p) if p.is_active && p.is_privileged() => Ok(next.run(request).await),
        _ => {
            tracing::warn!(%caller, path = %request.uri().path(), "Admin access denied");
            Err(ApiError::forbidden("Admin access required"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::view_as::view_as_middleware;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        middleware,
        routing::get,
        Router,
    };
    use henry_core::{CALLER_HEADER, VIEW_AS_HEADER};
    use henry_test_utils::{admin_principal, inactive, user_principal, InMemoryDirectory};
    use std::sync::Arc;
    use tower::ServiceExt; // for `oneshot`

    fn test_app(directory: Arc<InMemoryDirectory>) -> Router {
        let state = IdentityState::from_arc(directory);
        Router::new()
            .route("/stats", get(|| async { "stats" }))
            .layer(middleware::from_fn_with_state(state.clone(), require_admin))
            .layer(middleware::from_fn_with_state(state, view_as_middleware))
    }

    async fn status_for(
        directory: Arc<InMemoryDirectory>,
        headers: &[(&str, String)],
    ) -> Result<StatusCode, String> {
        let mut builder = Request::builder().uri("/stats");
        for (name, value) in headers {
            builder = builder.header(*name, value.as_str());
        }
        let request = builder.body(Body::empty()).map_err(|e| e.to_string())?;
        let response = test_app(directory)
            .oneshot(request)
            .await
            .map_err(|e| format!("Request failed: {:?}", e))?;
        Ok(response.status())
    }

    #[tokio::test]
    async fn test_admin_allowed() -> Result<(), String> {
        let admin = admin_principal();
        let directory = Arc::new(InMemoryDirectory::new().with_principal(admin.clone()));
        let status = status_for(directory, &[(CALLER_HEADER, admin.id.to_string())]).await?;
        assert_eq!(status, StatusCode::OK);
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_caller_is_unauthorized() -> Result<(), String> {
        let status = status_for(Arc::new(InMemoryDirectory::new()), &[]).await?;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        Ok(())
    }

    #[tokio::test]
    async fn test_unrecognized_caller_is_unauthorized() -> Result<(), String> {
        let directory = Arc::new(InMemoryDirectory::new());
        let status =
            status_for(directory.clone(), &[(CALLER_HEADER, "admin".to_string())]).await?;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(directory.lookup_count(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_regular_and_inactive_users_forbidden() -> Result<(), String> {
        let user = user_principal();
        let retired = inactive(admin_principal());
        let directory = Arc::new(
            InMemoryDirectory::new().with_principals([user.clone(), retired.clone()]),
        );

        for id in [user.id, retired.id] {
            let status = status_for(directory.clone(), &[(CALLER_HEADER, id.to_string())]).await?;
            assert_eq!(status, StatusCode::FORBIDDEN);
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_admin_viewing_as_user_keeps_admin_access() -> Result<(), String> {
        let admin = admin_principal();
        let user = user_principal();
        let directory =
            Arc::new(InMemoryDirectory::new().with_principals([admin.clone(), user.clone()]));

        let status = status_for(
            directory,
            &[
                (CALLER_HEADER, admin.id.to_string()),
                (VIEW_AS_HEADER, user.id.to_string()),
            ],
        )
        .await?;
        assert_eq!(status, StatusCode::OK);
        Ok(())
    }

    #[tokio::test]
    async fn test_lookup_failure_is_internal_error() -> Result<(), String> {
        let admin = admin_principal();
        let directory = Arc::new(InMemoryDirectory::new().with_principal(admin.clone()));
        directory.set_failing(true);

        let status = status_for(directory, &[(CALLER_HEADER, admin.id.to_string())]).await?;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        Ok(())
    }
}
