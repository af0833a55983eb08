/// Session lifecycle facade
///
/// The surface the web layer talks to: issue on signup/login, rotate,
/// verify, and revoke everything on logout.

use std::sync::Arc;
use uuid::Uuid;

use crate::auth::issuer::{TokenIssuer, TokenPair};
use crate::auth::jwt::Signer;
use crate::auth::password::SecretHasher;
use crate::auth::revocation::RevocationCounter;
use crate::auth::rotator::RefreshRotator;
use crate::auth::verifier::{AccessVerifier, VerifiedAccess};
use crate::avatar::generate_avatar_url;
use crate::clock::Clock;
use crate::configuration::{HashingSettings, TokenSettings};
use crate::error::{AppError, AuthError};
use crate::store::{NewPrincipal, Principal, PrincipalStore};

/// Signup input, already validated by the caller
#[derive(Debug, Clone)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub password: String,
}

#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn PrincipalStore>,
    clock: Arc<dyn Clock>,
    hasher: SecretHasher,
    issuer: TokenIssuer,
    rotator: RefreshRotator,
    verifier: AccessVerifier,
    counter: RevocationCounter,
    settings: TokenSettings,
}

impl SessionManager {
    pub fn new(
        store: Arc<dyn PrincipalStore>,
        clock: Arc<dyn Clock>,
        settings: TokenSettings,
        hashing: &HashingSettings,
    ) -> Self {
        let signer = Arc::new(Signer::new(&settings));
        let hasher = SecretHasher::new(hashing);
        let counter = RevocationCounter::new(store.clone());
        let issuer = TokenIssuer::new(
            store.clone(),
            signer.clone(),
            hasher.clone(),
            settings.clone(),
        );
        let rotator = RefreshRotator::new(
            store.clone(),
            signer.clone(),
            hasher.clone(),
            issuer.clone(),
            clock.clone(),
            settings.absolute_ttl(),
        );
        let verifier = AccessVerifier::new(signer, counter.clone(), clock.clone());

        Self {
            store,
            clock,
            hasher,
            issuer,
            rotator,
            verifier,
            counter,
            settings,
        }
    }

    pub fn settings(&self) -> &TokenSettings {
        &self.settings
    }

    /// Create a principal and start its first chain, without a counter bump
    pub async fn register(&self, registration: Registration) -> Result<(Principal, TokenPair), AppError> {
        let credential_hash = self.hasher.hash_password(&registration.password)?;
        let principal = self
            .store
            .create(NewPrincipal {
                avatar_url: generate_avatar_url(&registration.full_name),
                username: registration.username,
                email: registration.email,
                full_name: registration.full_name,
                credential_hash,
            })
            .await?;

        let tokens = self.issue_on_signup(&principal).await?;
        Ok((principal, tokens))
    }

    /// Check a login identifier (username or email) and password
    ///
    /// Unknown identifiers and wrong passwords are indistinguishable.
    pub async fn authenticate(&self, identifier: &str, password: &str) -> Result<Principal, AppError> {
        let secrets = self
            .store
            .find_by_identifier(identifier.trim())
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !self.hasher.verify(password, &secrets.credential_hash)? {
            return Err(AuthError::InvalidCredentials.into());
        }
        Ok(secrets.principal)
    }

    pub async fn issue_on_signup(&self, principal: &Principal) -> Result<TokenPair, AppError> {
        self.issuer.start_chain(principal, false, self.clock.now()).await
    }

    /// Every login bumps the counter, ending access tokens from earlier logins
    pub async fn issue_on_login(&self, principal: &Principal) -> Result<TokenPair, AppError> {
        self.issuer.start_chain(principal, true, self.clock.now()).await
    }

    pub async fn rotate(&self, presented_refresh_token: &str) -> Result<TokenPair, AppError> {
        self.rotator.rotate(presented_refresh_token).await
    }

    pub async fn verify(&self, presented_access_token: &str) -> Result<VerifiedAccess, AppError> {
        self.verifier.verify(presented_access_token).await
    }

    /// Explicit logout: bump the counter and clear the refresh chain
    pub async fn revoke_all(&self, principal_id: Uuid) -> Result<(), AppError> {
        self.counter.revoke_chain(principal_id).await?;
        Ok(())
    }

    pub async fn current_principal(&self, principal_id: Uuid) -> Result<Principal, AppError> {
        self.store
            .find_by_id(principal_id)
            .await?
            .ok_or_else(|| AuthError::NotAuthenticated.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::configuration::test_token_settings;
    use crate::error::StoreError;
    use crate::store::{InMemoryPrincipalStore, PrincipalSecrets, RefreshRecord, StoreResult};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn manager() -> SessionManager {
        SessionManager::new(
            Arc::new(InMemoryPrincipalStore::new()),
            Arc::new(SystemClock),
            test_token_settings(),
            &HashingSettings { cost: 4 },
        )
    }

    fn registration() -> Registration {
        Registration {
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            full_name: "Alice Liddell".to_string(),
            password: "SecurePass123".to_string(),
        }
    }

    #[tokio::test]
    async fn test_register_issues_tokens_at_counter_zero() {
        let sessions = manager();
        let (principal, tokens) = sessions.register(registration()).await.unwrap();

        let verified = sessions.verify(&tokens.access_token).await.unwrap();
        assert_eq!(verified.principal_id, principal.id);
        assert_eq!(verified.claims.ver, 0);
        assert!(principal.avatar_url.contains("name=Alice%20Liddell"));
    }

    #[tokio::test]
    async fn test_register_rejects_weak_password_and_duplicates() {
        let sessions = manager();
        let mut weak = registration();
        weak.password = "weak".to_string();
        assert!(matches!(
            sessions.register(weak).await,
            Err(AppError::Validation(_))
        ));

        sessions.register(registration()).await.unwrap();
        assert!(matches!(
            sessions.register(registration()).await,
            Err(AppError::Store(StoreError::Conflict(_)))
        ));
    }

    #[tokio::test]
    async fn test_authenticate_by_username_or_email() {
        let sessions = manager();
        let (principal, _) = sessions.register(registration()).await.unwrap();

        let by_name = sessions.authenticate("alice", "SecurePass123").await.unwrap();
        let by_email = sessions
            .authenticate(" alice@example.com ", "SecurePass123")
            .await
            .unwrap();
        assert_eq!(by_name.id, principal.id);
        assert_eq!(by_email.id, principal.id);

        let wrong = sessions.authenticate("alice", "WrongPass123").await.unwrap_err();
        let unknown = sessions.authenticate("bob", "SecurePass123").await.unwrap_err();
        assert_eq!(wrong.auth(), Some(AuthError::InvalidCredentials));
        assert_eq!(unknown.auth(), Some(AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_login_revokes_tokens_from_earlier_logins() {
        let sessions = manager();
        let (principal, signup_tokens) = sessions.register(registration()).await.unwrap();

        let login_tokens = sessions.issue_on_login(&principal).await.unwrap();

        let err = sessions.verify(&signup_tokens.access_token).await.unwrap_err();
        assert_eq!(err.auth(), Some(AuthError::TokenRevoked));
        assert!(sessions.verify(&login_tokens.access_token).await.is_ok());

        // the new login replaced the signup chain
        let err = sessions.rotate(&signup_tokens.refresh_token).await.unwrap_err();
        assert_eq!(err.auth(), Some(AuthError::ReuseDetected));
    }

    /// Wraps the in-memory store; can fail reads or make every swap lose
    #[derive(Default)]
    struct FlakyStore {
        inner: InMemoryPrincipalStore,
        down: AtomicBool,
        lose_swaps: AtomicBool,
    }

    impl FlakyStore {
        fn check_up(&self) -> StoreResult<()> {
            if self.down.load(Ordering::SeqCst) {
                return Err(StoreError::Unavailable("down".to_string()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl PrincipalStore for FlakyStore {
        async fn create(&self, principal: NewPrincipal) -> StoreResult<Principal> {
            self.check_up()?;
            self.inner.create(principal).await
        }

        async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Principal>> {
            self.check_up()?;
            self.inner.find_by_id(id).await
        }

        async fn find_by_id_with_secrets(&self, id: Uuid) -> StoreResult<Option<PrincipalSecrets>> {
            self.check_up()?;
            self.inner.find_by_id_with_secrets(id).await
        }

        async fn find_by_identifier(&self, identifier: &str) -> StoreResult<Option<PrincipalSecrets>> {
            self.check_up()?;
            self.inner.find_by_identifier(identifier).await
        }

        async fn current_revocation_counter(&self, id: Uuid) -> StoreResult<Option<i64>> {
            self.check_up()?;
            self.inner.current_revocation_counter(id).await
        }

        async fn compare_and_set_refresh_record(
            &self,
            id: Uuid,
            expected_hash: Option<&str>,
            new_record: Option<RefreshRecord>,
        ) -> StoreResult<Option<i64>> {
            self.check_up()?;
            if self.lose_swaps.load(Ordering::SeqCst) {
                return Ok(None);
            }
            self.inner
                .compare_and_set_refresh_record(id, expected_hash, new_record)
                .await
        }

        async fn begin_chain(
            &self,
            id: Uuid,
            record: RefreshRecord,
            bump_counter: bool,
        ) -> StoreResult<Option<i64>> {
            self.check_up()?;
            self.inner.begin_chain(id, record, bump_counter).await
        }

        async fn bump_revocation_counter(&self, id: Uuid) -> StoreResult<Option<i64>> {
            self.check_up()?;
            self.inner.bump_revocation_counter(id).await
        }

        async fn revoke_chain(&self, id: Uuid) -> StoreResult<Option<i64>> {
            self.check_up()?;
            self.inner.revoke_chain(id).await
        }
    }

    fn flaky_manager() -> (SessionManager, Arc<FlakyStore>) {
        let store = Arc::new(FlakyStore::default());
        let sessions = SessionManager::new(
            store.clone(),
            Arc::new(SystemClock),
            test_token_settings(),
            &HashingSettings { cost: 4 },
        );
        (sessions, store)
    }

    #[tokio::test]
    async fn test_unavailable_store_is_not_an_auth_failure() {
        let (sessions, store) = flaky_manager();
        let (principal, tokens) = sessions.register(registration()).await.unwrap();

        store.down.store(true, Ordering::SeqCst);

        let err = sessions.verify(&tokens.access_token).await.unwrap_err();
        assert!(matches!(err, AppError::Store(StoreError::Unavailable(_))));
        assert!(err.auth().is_none());

        let err = sessions.rotate(&tokens.refresh_token).await.unwrap_err();
        assert!(matches!(err, AppError::Store(StoreError::Unavailable(_))));
        assert!(err.auth().is_none());

        let err = sessions.authenticate("alice", "SecurePass123").await.unwrap_err();
        assert!(matches!(err, AppError::Store(StoreError::Unavailable(_))));

        // the outage left the session intact
        store.down.store(false, Ordering::SeqCst);
        assert_eq!(sessions.verify(&tokens.access_token).await.unwrap().principal_id, principal.id);
        assert!(sessions.rotate(&tokens.refresh_token).await.is_ok());
    }

    #[tokio::test]
    async fn test_rotation_gives_up_with_conflict_after_bounded_retries() {
        let (sessions, store) = flaky_manager();
        let (principal, tokens) = sessions.register(registration()).await.unwrap();

        store.lose_swaps.store(true, Ordering::SeqCst);

        let err = sessions.rotate(&tokens.refresh_token).await.unwrap_err();
        assert!(matches!(err, AppError::Store(StoreError::Conflict(_))));
        assert!(err.auth().is_none());

        // nothing was revoked and the chain still accepts its current token
        assert_eq!(store.current_revocation_counter(principal.id).await.unwrap(), Some(0));
        assert!(sessions.verify(&tokens.access_token).await.is_ok());

        store.lose_swaps.store(false, Ordering::SeqCst);
        assert!(sessions.rotate(&tokens.refresh_token).await.is_ok());
    }

    #[tokio::test]
    async fn test_revoke_all_ends_everything() {
        let sessions = manager();
        let (principal, tokens) = sessions.register(registration()).await.unwrap();

        sessions.revoke_all(principal.id).await.unwrap();

        let err = sessions.verify(&tokens.access_token).await.unwrap_err();
        assert_eq!(err.auth(), Some(AuthError::TokenRevoked));
        let err = sessions.rotate(&tokens.refresh_token).await.unwrap_err();
        assert_eq!(err.auth(), Some(AuthError::NotAuthenticated));
    }
}
