/// JWT Signing and Verification
///
/// Access and refresh tokens are HS256 JWTs signed with separate keys. The
/// library's own `exp` check is switched off: `exp` must be present, and it is
/// compared against the caller's clock instead of hidden wall time.

use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::de::DeserializeOwned;

use crate::auth::claims::{AccessClaims, RefreshClaims};
use crate::configuration::TokenSettings;
use crate::error::{AppError, AuthError};

/// Stateless token signer
#[derive(Clone)]
pub struct Signer {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    validation: Validation,
}

impl Signer {
    pub fn new(settings: &TokenSettings) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Verify issuer matches configuration
        validation.set_issuer(&[&settings.issuer]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        validation.validate_exp = false;

        Self {
            access_encoding: EncodingKey::from_secret(settings.access_token_secret.as_bytes()),
            access_decoding: DecodingKey::from_secret(settings.access_token_secret.as_bytes()),
            refresh_encoding: EncodingKey::from_secret(settings.refresh_token_secret.as_bytes()),
            refresh_decoding: DecodingKey::from_secret(settings.refresh_token_secret.as_bytes()),
            validation,
        }
    }

    pub fn sign_access(&self, claims: &AccessClaims) -> Result<String, AppError> {
        encode(&Header::default(), claims, &self.access_encoding)
            .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))
    }

    pub fn sign_refresh(&self, claims: &RefreshClaims) -> Result<String, AppError> {
        encode(&Header::default(), claims, &self.refresh_encoding)
            .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))
    }

    /// Decode an access token
    ///
    /// # Errors
    /// `TokenInvalid` for a bad signature, issuer or shape; `TokenExpired`
    /// once `exp` has passed.
    pub fn verify_access(&self, token: &str, now: DateTime<Utc>) -> Result<AccessClaims, AuthError> {
        let claims: AccessClaims = self
            .decode_with(token, &self.access_decoding)
            .ok_or(AuthError::TokenInvalid)?;

        if claims.is_expired_at(now) {
            return Err(AuthError::TokenExpired);
        }
        Ok(claims)
    }

    /// Decode a refresh token
    ///
    /// Every failure, including expiry, is `NotAuthenticated`.
    pub fn verify_refresh(&self, token: &str, now: DateTime<Utc>) -> Result<RefreshClaims, AuthError> {
        let claims: RefreshClaims = self
            .decode_with(token, &self.refresh_decoding)
            .ok_or(AuthError::NotAuthenticated)?;

        if claims.is_expired_at(now) {
            tracing::debug!(principal_id = %claims.sub, "Refresh token expired");
            return Err(AuthError::NotAuthenticated);
        }
        Ok(claims)
    }

    fn decode_with<T: DeserializeOwned>(&self, token: &str, key: &DecodingKey) -> Option<T> {
        decode::<T>(token, key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::warn!("JWT validation error: {}", e);
            })
            .ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configuration::test_token_settings;
    use crate::store::Principal;
    use chrono::Duration;
    use uuid::Uuid;

    fn principal() -> Principal {
        Principal {
            id: Uuid::new_v4(),
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            full_name: "Alice".to_string(),
            avatar_url: String::new(),
            revocation_counter: 0,
            created_at: Utc::now(),
        }
    }

    fn access_claims(now: DateTime<Utc>) -> AccessClaims {
        AccessClaims::new(&principal(), 2, now, Duration::minutes(15), "test")
    }

    #[test]
    fn test_sign_and_verify_access_token() {
        let signer = Signer::new(&test_token_settings());
        let now = Utc::now();
        let claims = access_claims(now);

        let token = signer.sign_access(&claims).expect("Failed to sign token");
        let decoded = signer.verify_access(&token, now).expect("Failed to verify token");

        assert_eq!(decoded, claims);
    }

    #[test]
    fn test_expiry_follows_supplied_clock() {
        let signer = Signer::new(&test_token_settings());
        let issued = Utc::now() - Duration::days(2);
        let token = signer.sign_access(&access_claims(issued)).unwrap();

        assert!(signer.verify_access(&token, issued + Duration::minutes(14)).is_ok());
        assert_eq!(
            signer.verify_access(&token, issued + Duration::minutes(15)),
            Err(AuthError::TokenExpired)
        );
    }

    #[test]
    fn test_invalid_token() {
        let signer = Signer::new(&test_token_settings());

        assert_eq!(
            signer.verify_access("invalid.token.here", Utc::now()),
            Err(AuthError::TokenInvalid)
        );
        assert_eq!(
            signer.verify_refresh("invalid.token.here", Utc::now()),
            Err(AuthError::NotAuthenticated)
        );
    }

    #[test]
    fn test_tampered_token() {
        let signer = Signer::new(&test_token_settings());
        let now = Utc::now();
        let token = signer.sign_access(&access_claims(now)).unwrap();

        let tampered = format!("{}X", token);
        assert_eq!(signer.verify_access(&tampered, now), Err(AuthError::TokenInvalid));
    }

    #[test]
    fn test_wrong_issuer() {
        let signer = Signer::new(&test_token_settings());
        let now = Utc::now();
        let token = signer.sign_access(&access_claims(now)).unwrap();

        let mut other = test_token_settings();
        other.issuer = "wrong-issuer".to_string();
        let result = Signer::new(&other).verify_access(&token, now);

        assert_eq!(result, Err(AuthError::TokenInvalid));
    }

    #[test]
    fn test_tokens_are_not_interchangeable() {
        let signer = Signer::new(&test_token_settings());
        let now = Utc::now();
        let refresh = RefreshClaims::new(
            Uuid::new_v4(),
            "secret".to_string(),
            now,
            Duration::days(7),
            "test",
        );
        let refresh_token = signer.sign_refresh(&refresh).unwrap();
        let access_token = signer.sign_access(&access_claims(now)).unwrap();

        assert_eq!(
            signer.verify_access(&refresh_token, now),
            Err(AuthError::TokenInvalid)
        );
        assert_eq!(
            signer.verify_refresh(&access_token, now),
            Err(AuthError::NotAuthenticated)
        );
    }

    #[test]
    fn test_expired_refresh_token_is_not_authenticated() {
        let signer = Signer::new(&test_token_settings());
        let now = Utc::now();
        let claims = RefreshClaims::new(
            Uuid::new_v4(),
            "secret".to_string(),
            now,
            Duration::days(7),
            "test",
        );
        let token = signer.sign_refresh(&claims).unwrap();

        assert_eq!(signer.verify_refresh(&token, now).unwrap(), claims);
        assert_eq!(
            signer.verify_refresh(&token, now + Duration::days(7)),
            Err(AuthError::NotAuthenticated)
        );
    }
}
