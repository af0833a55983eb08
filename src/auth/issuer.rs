/// Token Issuer
///
/// Mints access tokens and refresh envelopes, and starts new refresh chains.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::claims::{AccessClaims, RefreshClaims};
use crate::auth::jwt::Signer;
use crate::auth::password::SecretHasher;
use crate::auth::refresh_token::generate_refresh_secret;
use crate::configuration::TokenSettings;
use crate::error::{AppError, AuthError};
use crate::store::{Principal, PrincipalStore, RefreshRecord};

/// Access and refresh tokens handed to the caller together
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
}

/// A signed refresh envelope and the hash of the secret inside it
pub(crate) struct PreparedRefresh {
    pub token: String,
    pub hash: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct TokenIssuer {
    store: Arc<dyn PrincipalStore>,
    signer: Arc<Signer>,
    hasher: SecretHasher,
    settings: TokenSettings,
}

impl TokenIssuer {
    pub fn new(
        store: Arc<dyn PrincipalStore>,
        signer: Arc<Signer>,
        hasher: SecretHasher,
        settings: TokenSettings,
    ) -> Self {
        Self {
            store,
            signer,
            hasher,
            settings,
        }
    }

    /// Sign an access token embedding `revocation_counter`
    pub fn mint_access(
        &self,
        principal: &Principal,
        revocation_counter: i64,
        now: DateTime<Utc>,
    ) -> Result<(String, DateTime<Utc>), AppError> {
        let ttl = self.settings.access_ttl();
        let claims = AccessClaims::new(principal, revocation_counter, now, ttl, &self.settings.issuer);
        let token = self.signer.sign_access(&claims)?;
        Ok((token, now + ttl))
    }

    /// Generate a refresh secret, sign its envelope and hash it
    ///
    /// Nothing is persisted; the caller decides how the hash is stored.
    pub(crate) fn prepare_refresh(
        &self,
        principal_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<PreparedRefresh, AppError> {
        let ttl = self.settings.refresh_ttl();
        let secret = generate_refresh_secret();
        let hash = self.hasher.hash(&secret)?;
        let claims = RefreshClaims::new(principal_id, secret, now, ttl, &self.settings.issuer);
        let token = self.signer.sign_refresh(&claims)?;

        Ok(PreparedRefresh {
            token,
            hash,
            expires_at: now + ttl,
        })
    }

    /// Start a new refresh chain for `principal`
    ///
    /// The chain's `issued_at` is `now`, which anchors the absolute session
    /// lifetime. `bump_counter` invalidates every access token issued before.
    pub async fn start_chain(
        &self,
        principal: &Principal,
        bump_counter: bool,
        now: DateTime<Utc>,
    ) -> Result<TokenPair, AppError> {
        let refresh = self.prepare_refresh(principal.id, now)?;
        let record = RefreshRecord {
            hash: refresh.hash,
            issued_at: now,
        };

        let counter = self
            .store
            .begin_chain(principal.id, record, bump_counter)
            .await?
            .ok_or(AuthError::NotAuthenticated)?;

        let (access_token, access_expires_at) = self.mint_access(principal, counter, now)?;

        tracing::info!(
            principal_id = %principal.id,
            revocation_counter = counter,
            "Refresh chain started"
        );

        Ok(TokenPair {
            access_token,
            refresh_token: refresh.token,
            access_expires_at,
            refresh_expires_at: refresh.expires_at,
        })
    }
}
