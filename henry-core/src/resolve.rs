//! View-As identity resolution
//!
//! Turns the caller header and the optional view-as header into an
//! [`IdentityContext`]. The sequence is read-then-decide with no retries:
//!
//! 1. No view-as header: act as the caller (possibly anonymous), no lookups.
//!    Nothing is rejected here; handlers decide what an absent or
//!    unrecognized caller means.
//! 2. View-as header without a caller: reject.
//! 3. Caller must exist, be active, and hold the admin role.
//! 4. Target must exist and be active.
//! 5. Effective identity becomes the target, with an audit record.
//!
//! Empty header values count as absent. A value that is not a principal id
//! names nobody, so it fails the existence check of its step.

use crate::directory::PrincipalDirectory;
use crate::error::IdentityRejection;
use crate::identity::{parse_principal_id, IdentityContext};

/// Header carrying the authenticated caller.
pub const CALLER_HEADER: &str = "x-user-id";

/// Header carrying the optional impersonation target.
pub const VIEW_AS_HEADER: &str = "x-view-as-user";

fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Resolve the effective identity for one request.
pub async fn resolve_identity<D>(
    directory: &D,
    caller_header: Option<&str>,
    target_header: Option<&str>,
) -> Result<IdentityContext, IdentityRejection>
where
    D: PrincipalDirectory + ?Sized,
{
    let caller_header = present(caller_header);

    let Some(target_raw) = present(target_header) else {
        return Ok(match caller_header.map(parse_principal_id) {
            None => IdentityContext::direct(None),
            Some(Some(caller_id)) => IdentityContext::direct(Some(caller_id)),
            Some(None) => IdentityContext::unrecognized_caller(),
        });
    };

    let caller_raw = caller_header.ok_or(IdentityRejection::MissingCaller)?;
    let caller_id = parse_principal_id(caller_raw).ok_or(IdentityRejection::InvalidCaller)?;

    let caller = directory
        .find_principal(caller_id)
        .await?
        .filter(|p| p.is_active)
        .ok_or(IdentityRejection::InvalidCaller)?;

    if !caller.is_privileged() {
        return Err(IdentityRejection::InsufficientPrivilege);
    }

    let target_id = parse_principal_id(target_raw).ok_or(IdentityRejection::TargetNotFound)?;
    let target = directory
        .find_principal(target_id)
        .await?
        .filter(|p| p.is_active)
        .ok_or(IdentityRejection::TargetNotFound)?;

    Ok(IdentityContext::impersonating(caller.id, &target))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DirectoryError;
    use crate::identity::{Principal, PrincipalId, Role};
    use async_trait::async_trait;
    use proptest::prelude::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    #[derive(Default)]
    struct MapDirectory {
        principals: HashMap<PrincipalId, Principal>,
        lookups: AtomicUsize,
        broken: bool,
    }

    impl MapDirectory {
        fn with(mut self, p: Principal) -> Self {
            self.principals.insert(p.id, p);
            self
        }
    }

    #[async_trait]
    impl PrincipalDirectory for MapDirectory {
        async fn find_principal(
            &self,
            id: PrincipalId,
        ) -> Result<Option<Principal>, DirectoryError> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            if self.broken {
                return Err(DirectoryError::backend("socket closed"));
            }
            Ok(self.principals.get(&id).cloned())
        }
    }

    fn principal(email: &str, role: Role, is_active: bool) -> Principal {
        Principal {
            id: Uuid::new_v4(),
            email: email.to_string(),
            full_name: None,
            role: Some(role),
            is_active,
        }
    }

    #[tokio::test]
    async fn test_self_view_needs_no_lookup() {
        let dir = MapDirectory::default();
        let caller = Uuid::new_v4();
        let ctx = resolve_identity(&dir, Some(&caller.to_string()), None)
            .await
            .expect("resolves");

        assert_eq!(ctx.effective_id(), Some(caller));
        assert!(!ctx.is_impersonating());
        assert_eq!(dir.lookups.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_anonymous_without_view_as() {
        let dir = MapDirectory::default();
        let ctx = resolve_identity(&dir, None, Some("  ")).await.expect("resolves");
        assert_eq!(ctx.effective_id(), None);
        assert_eq!(dir.lookups.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_view_as_without_caller() {
        let dir = MapDirectory::default();
        let result = resolve_identity(&dir, None, Some(&Uuid::new_v4().to_string())).await;
        assert_eq!(result, Err(IdentityRejection::MissingCaller));
        assert_eq!(dir.lookups.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_successful_impersonation() {
        let admin = principal("a@x.com", Role::Admin, true);
        let target = principal("b@x.com", Role::User, true);
        let dir = MapDirectory::default().with(admin.clone()).with(target.clone());

        let ctx = resolve_identity(
            &dir,
            Some(&admin.id.to_string()),
            Some(&target.id.to_string()),
        )
        .await
        .expect("resolves");

        assert_eq!(ctx.effective_id(), Some(target.id));
        assert_eq!(ctx.caller_id(), Some(admin.id));
        assert!(ctx.is_impersonating());
        let audit = ctx.view_as().expect("audit");
        assert_eq!(audit.admin_id, admin.id);
        assert_eq!(audit.target_email, "b@x.com");
        assert_eq!(audit.target_role, Some(Role::User));
    }

    #[tokio::test]
    async fn test_inactive_admin_is_invalid_caller() {
        let admin = principal("a@x.com", Role::Admin, false);
        let target = principal("b@x.com", Role::User, true);
        let dir = MapDirectory::default().with(admin.clone()).with(target.clone());

        let result = resolve_identity(
            &dir,
            Some(&admin.id.to_string()),
            Some(&target.id.to_string()),
        )
        .await;
        assert_eq!(result, Err(IdentityRejection::InvalidCaller));
    }

    #[tokio::test]
    async fn test_non_admin_is_forbidden_before_target_lookup() {
        let caller = principal("u@x.com", Role::User, true);
        let target = principal("b@x.com", Role::User, true);
        let dir = MapDirectory::default().with(caller.clone()).with(target.clone());

        let result = resolve_identity(
            &dir,
            Some(&caller.id.to_string()),
            Some(&target.id.to_string()),
        )
        .await;
        assert_eq!(result, Err(IdentityRejection::InsufficientPrivilege));
        assert_eq!(dir.lookups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_inactive_target_not_found() {
        let admin = principal("a@x.com", Role::Admin, true);
        let target = principal("b@x.com", Role::User, false);
        let dir = MapDirectory::default().with(admin.clone()).with(target.clone());

        let result = resolve_identity(
            &dir,
            Some(&admin.id.to_string()),
            Some(&target.id.to_string()),
        )
        .await;
        assert_eq!(result, Err(IdentityRejection::TargetNotFound));
    }

    #[tokio::test]
    async fn test_unrecognized_caller_without_view_as_passes_through() {
        let dir = MapDirectory::default();
        let ctx = resolve_identity(&dir, Some("nope"), None).await.expect("resolves");

        assert_eq!(ctx.caller_id(), None);
        assert!(ctx.has_unrecognized_caller());
        assert_eq!(dir.lookups.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unrecognized_ids_on_view_as_path() {
        let admin = principal("a@x.com", Role::Admin, true);
        let dir = MapDirectory::default().with(admin.clone());

        let result = resolve_identity(&dir, Some("nope"), Some(&admin.id.to_string())).await;
        assert_eq!(result, Err(IdentityRejection::InvalidCaller));
        assert_eq!(dir.lookups.load(Ordering::SeqCst), 0);

        let result = resolve_identity(&dir, Some(&admin.id.to_string()), Some("user-42")).await;
        assert_eq!(result, Err(IdentityRejection::TargetNotFound));
    }

    #[tokio::test]
    async fn test_unrecognized_target_still_needs_admin() {
        let caller = principal("u@x.com", Role::User, true);
        let dir = MapDirectory::default().with(caller.clone());

        let result = resolve_identity(&dir, Some(&caller.id.to_string()), Some("user-42")).await;
        assert_eq!(result, Err(IdentityRejection::InsufficientPrivilege));
    }

    fn block_on<F: std::future::Future>(future: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .build()
            .expect("runtime")
            .block_on(future)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(128))]

        /// An active admin naming any target that is not a stored active
        /// principal always gets target-not-found.
        #[test]
        fn prop_admin_with_unknown_target_string(target in "\\PC{0,48}") {
            let admin = principal("a@x.com", Role::Admin, true);
            let dir = MapDirectory::default().with(admin.clone());
            prop_assume!(!target.trim().is_empty());

            let result = block_on(resolve_identity(&dir, Some(&admin.id.to_string()), Some(&target)));
            prop_assert_eq!(result, Err(IdentityRejection::TargetNotFound));
        }

        /// Without a view-as header resolution never rejects, whatever the
        /// caller header holds.
        #[test]
        fn prop_self_view_never_rejects(caller in proptest::option::of("\\PC{0,48}")) {
            let dir = MapDirectory::default();
            let result = block_on(resolve_identity(&dir, caller.as_deref(), None));
            prop_assert!(result.is_ok());
            prop_assert_eq!(dir.lookups.load(Ordering::SeqCst), 0);
        }
    }

    #[tokio::test]
    async fn test_lookup_error_is_not_retried() {
        let dir = MapDirectory {
            broken: true,
            ..Default::default()
        };
        let result = resolve_identity(
            &dir,
            Some(&Uuid::new_v4().to_string()),
            Some(&Uuid::new_v4().to_string()),
        )
        .await;

        assert!(matches!(result, Err(IdentityRejection::LookupFailed { .. })));
        assert_eq!(dir.lookups.load(Ordering::SeqCst), 1);
    }
}
