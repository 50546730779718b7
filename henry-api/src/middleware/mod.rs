//! Middleware modules for the Henry API
//!
//! - `view_as`: identity resolution and admin impersonation
//! - `admin`: admin-only guard on the caller identity
//!
//! # Middleware Order
//!
//! `require_admin` reads the identity injected by `view_as_middleware`, so
//! the view-as layer must be the outer one:
//!
//! ```ignore
//! Router::new()
//!     .route("/api/admin/stats", get(handler))
//!     // Innermost
//!     .layer(middleware::from_fn_with_state(state.clone(), require_admin))
//!     // Outermost
//!     .layer(middleware::from_fn_with_state(state, view_as_middleware))
//! ```

mod admin;
pub mod view_as;

pub use admin::require_admin;
pub use view_as::{
    apply_view_as_headers, view_as_middleware, Identity, IdentityState, AUDIT_TARGET,
};
