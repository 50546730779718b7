//! Path extractor for principal ids.
//!
//! The stock `Path<Uuid>` rejection is plain text; `PrincipalPath` keeps the
//! `{"error": "..."}` body every other failure uses.

use axum::{
    async_trait,
    extract::{FromRequestParts, Path},
    http::request::Parts,
};
use henry_core::PrincipalId;

use crate::error::ApiError;

/// A principal id taken from the single path parameter of a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrincipalPath(pub PrincipalId);

#[async_trait]
impl<S> FromRequestParts<S> for PrincipalPath
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(id): Path<PrincipalId> = Path::from_request_parts(parts, state)
            .await
            .map_err(|e| {
                tracing::debug!(path = %parts.uri.path(), error = %e, "Invalid user id in path");
                ApiError::invalid_format("Invalid user id")
            })?;
        Ok(PrincipalPath(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
        routing::get,
        Router,
    };
    use tower::ServiceExt; // for `oneshot`

    fn app() -> Router {
        Router::new().route(
            "/users/:id",
            get(|PrincipalPath(id): PrincipalPath| async move { id.to_string() }),
        )
    }

    #[tokio::test]
    async fn test_valid_id() -> Result<(), String> {
        let id = uuid::Uuid::new_v4();
        let request = Request::builder()
            .uri(format!("/users/{}", id))
            .body(Body::empty())
            .map_err(|e| e.to_string())?;
        let response = app()
            .oneshot(request)
            .await
            .map_err(|e| format!("Request failed: {:?}", e))?;
        assert_eq!(response.status(), StatusCode::OK);
        Ok(())
    }

    #[tokio::test]
    async fn test_invalid_id_has_error_body() -> Result<(), String> {
        let request = Request::builder()
            .uri("/users/nope")
            .body(Body::empty())
            .map_err(|e| e.to_string())?;
        let response = app()
            .oneshot(request)
            .await
            .map_err(|e| format!("Request failed: {:?}", e))?;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .map_err(|e| e.to_string())?;
        let body: serde_json::Value = serde_json::from_slice(&bytes).map_err(|e| e.to_string())?;
        assert_eq!(body, serde_json::json!({ "error": "Invalid user id" }));
        Ok(())
    }
}
