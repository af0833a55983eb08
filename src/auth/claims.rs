/// JWT Claims structures
///
/// Access claims carry the revocation-counter snapshot taken at issuance;
/// refresh claims carry the single-use refresh secret as `jti`.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AuthError;
use crate::store::Principal;

/// Claims for access tokens
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct AccessClaims {
    /// Subject (principal ID as UUID string)
    pub sub: String,
    /// Revocation counter at the time of issuance
    pub ver: i64,
    pub username: String,
    pub email: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    pub iss: String,
}

impl AccessClaims {
    pub fn new(
        principal: &Principal,
        revocation_counter: i64,
        now: DateTime<Utc>,
        ttl: Duration,
        issuer: &str,
    ) -> Self {
        Self {
            sub: principal.id.to_string(),
            ver: revocation_counter,
            username: principal.username.clone(),
            email: principal.email.clone(),
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
            iss: issuer.to_string(),
        }
    }

    /// Extract principal ID from claims
    pub fn principal_id(&self) -> Result<Uuid, AuthError> {
        Uuid::parse_str(&self.sub).map_err(|_| AuthError::TokenInvalid)
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.exp <= now.timestamp()
    }
}

/// Claims for refresh tokens
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct RefreshClaims {
    pub sub: String,
    /// The refresh secret; only its hash is ever persisted
    pub jti: String,
    pub exp: i64,
    pub iat: i64,
    pub iss: String,
}

impl RefreshClaims {
    pub fn new(
        principal_id: Uuid,
        secret: String,
        now: DateTime<Utc>,
        ttl: Duration,
        issuer: &str,
    ) -> Self {
        Self {
            sub: principal_id.to_string(),
            jti: secret,
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
            iss: issuer.to_string(),
        }
    }

    pub fn principal_id(&self) -> Result<Uuid, AuthError> {
        Uuid::parse_str(&self.sub).map_err(|_| AuthError::NotAuthenticated)
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.exp <= now.timestamp()
    }
}
