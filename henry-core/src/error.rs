//! Error types for identity resolution

use thiserror::Error;

/// Principal lookup errors raised by a [`crate::PrincipalDirectory`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("Principal lookup failed: {reason}")]
    Backend { reason: String },
}

impl DirectoryError {
    pub fn backend(reason: impl Into<String>) -> Self {
        DirectoryError::Backend {
            reason: reason.into(),
        }
    }
}

/// Reasons identity resolution refuses a request.
///
/// The `Display` text is the client-facing message. Lookup failures keep
/// their detail in `reason`, which is for server-side logs only.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IdentityRejection {
    #[error("Missing required header: x-user-id")]
    MissingCaller,

    #[error("Invalid user credentials")]
    InvalidCaller,

    #[error("Insufficient permissions. View As functionality is restricted to admin users only.")]
    InsufficientPrivilege,

    #[error("Target user not found or inactive")]
    TargetNotFound,

    #[error("Could not validate View As permissions")]
    LookupFailed { reason: String },
}

impl From<DirectoryError> for IdentityRejection {
    fn from(err: DirectoryError) -> Self {
        IdentityRejection::LookupFailed {
            reason: err.to_string(),
        }
    }
}
