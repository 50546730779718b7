//! Identity types for Henry principals

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Principal identifier. Both identity headers carry values from this space.
pub type PrincipalId = Uuid;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Parse a header value into a principal identifier.
///
/// `None` means the value cannot name any principal.
pub fn parse_principal_id(value: &str) -> Option<PrincipalId> {
    Uuid::parse_str(value.trim()).ok()
}

// ============================================================================
// ROLES
// ============================================================================

/// Role stored on a principal.
///
/// Only [`Role::Admin`] is privileged. Unknown role strings are preserved
/// verbatim so they round-trip through responses unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    Admin,
    User,
    Other(String),
}

impl Role {
    pub fn as_str(&self) -> &str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
            Role::Other(other) => other,
        }
    }

    /// Whether this role may impersonate other principals.
    pub fn is_privileged(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl From<&str> for Role {
    fn from(value: &str) -> Self {
        match value {
            "admin" => Role::Admin,
            "user" => Role::User,
            other => Role::Other(other.to_string()),
        }
    }
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        Role::from(value.as_str())
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.as_str().to_string()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// PRINCIPAL
// ============================================================================

/// A user record as seen by identity resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: PrincipalId,
    pub email: String,
    pub full_name: Option<String>,
    pub role: Option<Role>,
    pub is_active: bool,
}

impl Principal {
    pub fn is_privileged(&self) -> bool {
        self.role.as_ref().is_some_and(Role::is_privileged)
    }

    /// Human-readable label: full name when present, email otherwise.
    pub fn display_label(&self) -> &str {
        self.full_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(&self.email)
    }
}

// ============================================================================
// VIEW-AS AUDIT
// ============================================================================

/// Audit record attached to a request that is acting as another principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewAsAudit {
    /// The privileged caller performing the impersonation.
    pub admin_id: PrincipalId,
    pub target_id: PrincipalId,
    pub target_email: String,
    pub target_label: String,
    pub target_role: Option<Role>,
}

impl ViewAsAudit {
    /// Role label used in response headers; `none` when the target has no role.
    pub fn target_role_label(&self) -> &str {
        self.target_role.as_ref().map(Role::as_str).unwrap_or("none")
    }
}

// ============================================================================
// IDENTITY CONTEXT
// ============================================================================

/// Per-request identity, produced once by resolution and immutable after.
///
/// `effective_id` equals the target only when impersonation was authorized;
/// otherwise it equals the caller. The constructors are the only way to
/// build one, which keeps that invariant closed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdentityContext {
    caller_id: Option<PrincipalId>,
    target_id: Option<PrincipalId>,
    effective_id: Option<PrincipalId>,
    view_as: Option<ViewAsAudit>,
    #[serde(skip)]
    unrecognized_caller: bool,
}

impl IdentityContext {
    /// Identity for a request acting as itself. The caller may be absent;
    /// handlers decide whether that is an error.
    pub fn direct(caller_id: Option<PrincipalId>) -> Self {
        Self {
            caller_id,
            target_id: None,
            effective_id: caller_id,
            view_as: None,
            unrecognized_caller: false,
        }
    }

    /// Identity for a request whose caller header names no possible
    /// principal. Acts like an anonymous request; handlers that need a
    /// caller reject it as an invalid credential rather than a missing one.
    pub fn unrecognized_caller() -> Self {
        Self {
            unrecognized_caller: true,
            ..Self::direct(None)
        }
    }

    /// Identity for an authorized impersonation of `target` by `admin_id`.
    pub fn impersonating(admin_id: PrincipalId, target: &Principal) -> Self {
        Self {
            caller_id: Some(admin_id),
            target_id: Some(target.id),
            effective_id: Some(target.id),
            view_as: Some(ViewAsAudit {
                admin_id,
                target_id: target.id,
                target_email: target.email.clone(),
                target_label: target.display_label().to_string(),
                target_role: target.role.clone(),
            }),
            unrecognized_caller: false,
        }
    }

    /// Who is performing the request. Use for audit-trail writes.
    pub fn caller_id(&self) -> Option<PrincipalId> {
        self.caller_id
    }

    pub fn target_id(&self) -> Option<PrincipalId> {
        self.target_id
    }

    /// Whose data the request reads and writes.
    pub fn effective_id(&self) -> Option<PrincipalId> {
        self.effective_id
    }

    pub fn is_impersonating(&self) -> bool {
        self.view_as.is_some()
    }

    pub fn view_as(&self) -> Option<&ViewAsAudit> {
        self.view_as.as_ref()
    }

    /// Whether a caller header was sent that is not a principal id.
    pub fn has_unrecognized_caller(&self) -> bool {
        self.unrecognized_caller
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn principal(role: Option<Role>) -> Principal {
        Principal {
            id: Uuid::new_v4(),
            email: "b@x.com".to_string(),
            full_name: Some("Bea Example".to_string()),
            role,
            is_active: true,
        }
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!(Role::from("admin"), Role::Admin);
        assert_eq!(Role::from("user"), Role::User);
        assert_eq!(Role::from("coach"), Role::Other("coach".to_string()));
        assert!(Role::Admin.is_privileged());
        assert!(!Role::User.is_privileged());
        assert!(!Role::from("Admin").is_privileged());
    }

    #[test]
    fn test_role_serializes_as_plain_string() -> Result<(), serde_json::Error> {
        assert_eq!(serde_json::to_string(&Role::Admin)?, "\"admin\"");
        let role: Role = serde_json::from_str("\"coach\"")?;
        assert_eq!(role, Role::Other("coach".to_string()));
        Ok(())
    }

    #[test]
    fn test_parse_principal_id() {
        let id = Uuid::new_v4();
        assert_eq!(parse_principal_id(&format!(" {id} ")), Some(id));
        assert_eq!(parse_principal_id("not-a-uuid"), None);
        assert_eq!(parse_principal_id("user-42"), None);
    }

    #[test]
    fn test_direct_context() {
        let caller = Uuid::new_v4();
        let ctx = IdentityContext::direct(Some(caller));
        assert_eq!(ctx.caller_id(), Some(caller));
        assert_eq!(ctx.effective_id(), Some(caller));
        assert_eq!(ctx.target_id(), None);
        assert!(!ctx.is_impersonating());

        let anonymous = IdentityContext::direct(None);
        assert_eq!(anonymous.effective_id(), None);
        assert!(!anonymous.has_unrecognized_caller());
    }

    #[test]
    fn test_unrecognized_caller_context() {
        let ctx = IdentityContext::unrecognized_caller();
        assert_eq!(ctx.caller_id(), None);
        assert_eq!(ctx.effective_id(), None);
        assert!(!ctx.is_impersonating());
        assert!(ctx.has_unrecognized_caller());
    }

    #[test]
    fn test_impersonating_context() {
        let admin = Uuid::new_v4();
        let target = principal(Some(Role::User));
        let ctx = IdentityContext::impersonating(admin, &target);

        assert_eq!(ctx.caller_id(), Some(admin));
        assert_eq!(ctx.effective_id(), Some(target.id));
        assert!(ctx.is_impersonating());

        let audit = ctx.view_as().expect("audit present");
        assert_eq!(audit.admin_id, admin);
        assert_eq!(audit.target_email, "b@x.com");
        assert_eq!(audit.target_label, "Bea Example");
        assert_eq!(audit.target_role_label(), "user");
    }

    #[test]
    fn test_display_label_falls_back_to_email() {
        let mut p = principal(None);
        p.full_name = Some("   ".to_string());
        assert_eq!(p.display_label(), "b@x.com");
        p.full_name = None;
        assert_eq!(p.display_label(), "b@x.com");
    }

    #[test]
    fn test_missing_role_label() {
        let ctx = IdentityContext::impersonating(Uuid::new_v4(), &principal(None));
        assert_eq!(ctx.view_as().map(ViewAsAudit::target_role_label), Some("none"));
    }
}
