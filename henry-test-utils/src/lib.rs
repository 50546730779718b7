//! Henry Test Utilities
//!
//! Centralized test infrastructure for the Henry workspace:
//! - An in-memory principal directory that counts lookups
//! - Principal fixtures for common scenarios
//! - Proptest generators for principals and identity headers

pub use henry_core::{
    DirectoryError, IdentityContext, IdentityRejection, Principal, PrincipalDirectory,
    PrincipalId, Role, ViewAsAudit,
};

use async_trait::async_trait;
use proptest::prelude::*;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use uuid::Uuid;

// ============================================================================
// IN-MEMORY DIRECTORY
// ============================================================================

/// Principal directory backed by a map.
///
/// Every call to `find_principal` is counted, including failing ones, so
/// tests can assert that resolution performed no lookups.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    principals: HashMap<PrincipalId, Principal>,
    lookups: AtomicUsize,
    failing: AtomicBool,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_principal(mut self, principal: Principal) -> Self {
        self.principals.insert(principal.id, principal);
        self
    }

    pub fn with_principals(mut self, principals: impl IntoIterator<Item = Principal>) -> Self {
        for p in principals {
            self.principals.insert(p.id, p);
        }
        self
    }

    /// Make every subsequent lookup fail with a backend error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PrincipalDirectory for InMemoryDirectory {
    async fn find_principal(&self, id: PrincipalId) -> Result<Option<Principal>, DirectoryError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(DirectoryError::backend("in-memory directory set to fail"));
        }
        Ok(self.principals.get(&id).cloned())
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub fn principal(email: &str, role: Option<Role>, is_active: bool) -> Principal {
    Principal {
        id: Uuid::new_v4(),
        email: email.to_string(),
        full_name: None,
        role,
        is_active,
    }
}

/// Active admin.
pub fn admin_principal() -> Principal {
    Principal {
        full_name: Some("Ada Admin".to_string()),
        ..principal("admin@henry.test", Some(Role::Admin), true)
    }
}

/// Active regular user.
pub fn user_principal() -> Principal {
    Principal {
        full_name: Some("Bea User".to_string()),
        ..principal("b@x.com", Some(Role::User), true)
    }
}

pub fn inactive(p: Principal) -> Principal {
    Principal {
        is_active: false,
        ..p
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub fn principal_id_strategy() -> impl Strategy<Value = PrincipalId> {
    any::<[u8; 16]>().prop_map(Uuid::from_bytes)
}

pub fn role_strategy() -> impl Strategy<Value = Option<Role>> {
    prop_oneof![
        Just(Some(Role::Admin)),
        Just(Some(Role::User)),
        "[a-z]{3,10}".prop_map(|s| Some(Role::from(s))),
        Just(None),
    ]
}

pub fn principal_strategy() -> impl Strategy<Value = Principal> {
    (
        principal_id_strategy(),
        "[a-z]{1,12}@[a-z]{2,8}\\.(com|org|test)",
        proptest::option::of("[A-Z][a-z]{1,10} [A-Z][a-z]{1,10}"),
        role_strategy(),
        any::<bool>(),
    )
        .prop_map(|(id, email, full_name, role, is_active)| Principal {
            id,
            email,
            full_name,
            role,
            is_active,
        })
}

/// Principal that is not an active admin.
pub fn unprivileged_principal_strategy() -> impl Strategy<Value = Principal> {
    principal_strategy().prop_filter("must not be an active admin", |p| {
        !(p.is_active && p.is_privileged())
    })
}

/// Header value that is either a valid principal id or arbitrary garbage.
pub fn header_value_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        principal_id_strategy().prop_map(|id| id.to_string()),
        "[a-z0-9-]{1,40}",
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixtures() {
        assert!(admin_principal().is_privileged());
        assert!(!user_principal().is_privileged());
        assert!(!inactive(admin_principal()).is_active);
    }
}
