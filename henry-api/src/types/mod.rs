//! API Request and Response Types
//!
//! This module defines the request and response bodies for the Henry API.

// Health types
mod health;
pub use health::*;

// User types
mod user;
pub use user::*;

// Preference types
mod preferences;
pub use preferences::*;

// Admin dashboard types
mod admin;
pub use admin::*;

use serde::{Deserialize, Serialize};

/// Acknowledgement returned by mutating endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
}

impl SuccessResponse {
    pub const OK: Self = Self { success: true };
}
