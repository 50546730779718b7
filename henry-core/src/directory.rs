//! Principal lookup trait

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::DirectoryError;
use crate::identity::{Principal, PrincipalId};

/// Source of principal records for identity resolution.
///
/// Implementations return the record whether or not it is active; the
/// resolver applies the active and role rules itself.
#[async_trait]
pub trait PrincipalDirectory: Send + Sync {
    async fn find_principal(&self, id: PrincipalId) -> Result<Option<Principal>, DirectoryError>;
}

#[async_trait]
impl<T> PrincipalDirectory for Arc<T>
where
    T: PrincipalDirectory + ?Sized,
{
    async fn find_principal(&self, id: PrincipalId) -> Result<Option<Principal>, DirectoryError> {
        (**self).find_principal(id).await
    }
}
