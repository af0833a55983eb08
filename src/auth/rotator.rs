/// Refresh Rotator
///
/// Validates a presented refresh token against the principal's stored record
/// and moves the chain through its states:
///
/// - `ACTIVE` → `ACTIVE`: hash matches, within the absolute lifetime; the
///   stored hash is swapped for a new one, `issued_at` is kept
/// - `ACTIVE` → `REVOKED`: hash mismatch (replay of a rotated-away secret, or
///   a forgery); the counter is bumped and the record cleared
/// - `ACTIVE` → `EXPIRED`: absolute lifetime exceeded; the record is cleared,
///   the counter is left alone
///
/// The swap is a compare-and-set on the hash that was read. Losing that race
/// means another rotation got there first, so the loop re-reads and the
/// presented secret then shows up as reused.

use chrono::Duration;
use std::sync::Arc;

use crate::auth::issuer::{TokenIssuer, TokenPair};
use crate::auth::jwt::Signer;
use crate::auth::password::SecretHasher;
use crate::auth::revocation::RevocationCounter;
use crate::clock::Clock;
use crate::error::{AppError, AuthError, StoreError};
use crate::store::{PrincipalStore, RefreshRecord};

const MAX_ROTATION_ATTEMPTS: usize = 3;

#[derive(Clone)]
pub struct RefreshRotator {
    store: Arc<dyn PrincipalStore>,
    signer: Arc<Signer>,
    hasher: SecretHasher,
    issuer: TokenIssuer,
    counter: RevocationCounter,
    clock: Arc<dyn Clock>,
    absolute_ttl: Duration,
}

impl RefreshRotator {
    pub fn new(
        store: Arc<dyn PrincipalStore>,
        signer: Arc<Signer>,
        hasher: SecretHasher,
        issuer: TokenIssuer,
        clock: Arc<dyn Clock>,
        absolute_ttl: Duration,
    ) -> Self {
        Self {
            counter: RevocationCounter::new(store.clone()),
            store,
            signer,
            hasher,
            issuer,
            clock,
            absolute_ttl,
        }
    }

    /// Exchange a refresh token for a new access/refresh pair
    ///
    /// # Errors
    /// - `NotAuthenticated`: bad or expired envelope, unknown principal, or no
    ///   active chain
    /// - `ReuseDetected`: the secret is not the current one; the whole
    ///   session has been revoked
    /// - `SessionExpired`: the chain outlived the absolute session lifetime
    /// - `StoreError::Conflict`: the chain kept changing underneath us
    pub async fn rotate(&self, presented: &str) -> Result<TokenPair, AppError> {
        let now = self.clock.now();
        let claims = self.signer.verify_refresh(presented, now)?;
        let principal_id = claims.principal_id()?;

        for _ in 0..MAX_ROTATION_ATTEMPTS {
            let secrets = self
                .store
                .find_by_id_with_secrets(principal_id)
                .await?
                .ok_or(AuthError::NotAuthenticated)?;

            let Some(record) = secrets.refresh_record else {
                tracing::info!(principal_id = %principal_id, "Refresh attempted without an active chain");
                return Err(AuthError::NotAuthenticated.into());
            };

            if !self.hasher.verify(&claims.jti, &record.hash)? {
                let counter = self.counter.revoke_chain(principal_id).await?;
                tracing::warn!(
                    target: "security",
                    principal_id = %principal_id,
                    revocation_counter = counter,
                    "Refresh token reuse detected; all sessions revoked"
                );
                return Err(AuthError::ReuseDetected.into());
            }

            if now - record.issued_at > self.absolute_ttl {
                let cleared = self
                    .store
                    .compare_and_set_refresh_record(principal_id, Some(record.hash.as_str()), None)
                    .await?;
                if cleared.is_some() {
                    tracing::info!(
                        principal_id = %principal_id,
                        chain_started_at = %record.issued_at,
                        "Session reached its absolute lifetime"
                    );
                    return Err(AuthError::SessionExpired.into());
                }
                continue;
            }

            let refresh = self.issuer.prepare_refresh(principal_id, now)?;
            let rotated = RefreshRecord {
                hash: refresh.hash,
                issued_at: record.issued_at,
            };

            let Some(counter) = self
                .store
                .compare_and_set_refresh_record(principal_id, Some(record.hash.as_str()), Some(rotated))
                .await?
            else {
                tracing::debug!(principal_id = %principal_id, "Lost rotation race, re-reading chain");
                continue;
            };

            let (access_token, access_expires_at) =
                self.issuer.mint_access(&secrets.principal, counter, now)?;

            tracing::info!(principal_id = %principal_id, "Refresh token rotated");
            return Ok(TokenPair {
                access_token,
                refresh_token: refresh.token,
                access_expires_at,
                refresh_expires_at: refresh.expires_at,
            });
        }

        tracing::warn!(principal_id = %principal_id, "Refresh chain contention, giving up");
        Err(StoreError::Conflict("Refresh chain".to_string()).into())
    }
}
