/// Revocation Counter
///
/// A per-principal monotonic integer embedded in every access token. Bumping
/// it invalidates all previously issued access tokens at once. The value is
/// always read from the store at verification time, never cached.

use std::sync::Arc;
use uuid::Uuid;

use crate::error::{AppError, AuthError};
use crate::store::PrincipalStore;

#[derive(Clone)]
pub struct RevocationCounter {
    store: Arc<dyn PrincipalStore>,
}

impl RevocationCounter {
    pub fn new(store: Arc<dyn PrincipalStore>) -> Self {
        Self { store }
    }

    pub async fn current_version(&self, principal_id: Uuid) -> Result<i64, AppError> {
        self.store
            .current_revocation_counter(principal_id)
            .await?
            .ok_or_else(|| AuthError::NotAuthenticated.into())
    }

    /// Invalidate outstanding access tokens, leaving the refresh chain alone
    pub async fn bump(&self, principal_id: Uuid) -> Result<i64, AppError> {
        let counter = self
            .store
            .bump_revocation_counter(principal_id)
            .await?
            .ok_or(AuthError::NotAuthenticated)?;

        tracing::info!(principal_id = %principal_id, revocation_counter = counter, "Revocation counter bumped");
        Ok(counter)
    }

    /// Invalidate outstanding access tokens and kill the refresh chain
    pub async fn revoke_chain(&self, principal_id: Uuid) -> Result<i64, AppError> {
        let counter = self
            .store
            .revoke_chain(principal_id)
            .await?
            .ok_or(AuthError::NotAuthenticated)?;

        tracing::info!(principal_id = %principal_id, revocation_counter = counter, "Session chain revoked");
        Ok(counter)
    }
}
