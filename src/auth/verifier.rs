/// Access token verification: signature, expiry, then revocation counter.

use std::sync::Arc;
use uuid::Uuid;

use crate::auth::claims::AccessClaims;
use crate::auth::jwt::Signer;
use crate::auth::revocation::RevocationCounter;
use crate::clock::Clock;
use crate::error::{AppError, AuthError};

/// Identity proven by a valid access token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedAccess {
    pub principal_id: Uuid,
    pub claims: AccessClaims,
}

#[derive(Clone)]
pub struct AccessVerifier {
    signer: Arc<Signer>,
    counter: RevocationCounter,
    clock: Arc<dyn Clock>,
}

impl AccessVerifier {
    pub fn new(signer: Arc<Signer>, counter: RevocationCounter, clock: Arc<dyn Clock>) -> Self {
        Self {
            signer,
            counter,
            clock,
        }
    }

    /// Read-only; safe to call any number of times
    ///
    /// # Errors
    /// - `TokenInvalid`: bad signature or malformed token
    /// - `TokenExpired`: past `exp`
    /// - `TokenRevoked`: embedded counter differs from the stored one
    /// - `NotAuthenticated`: the principal no longer exists
    pub async fn verify(&self, token: &str) -> Result<VerifiedAccess, AppError> {
        let claims = self.signer.verify_access(token, self.clock.now())?;
        let principal_id = claims.principal_id()?;

        let current = self.counter.current_version(principal_id).await?;
        if claims.ver != current {
            tracing::debug!(
                principal_id = %principal_id,
                token_version = claims.ver,
                current_version = current,
                "Access token revoked"
            );
            return Err(AuthError::TokenRevoked.into());
        }

        Ok(VerifiedAccess {
            principal_id,
            claims,
        })
    }
}
