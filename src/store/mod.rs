/// Principal Store
///
/// Durable storage for principals, keyed by id. Holds the revocation counter
/// and the active refresh record. Every mutation that touches the refresh
/// chain is a single atomic operation; callers never read-then-write.

mod memory;
mod postgres;

pub use memory::InMemoryPrincipalStore;
pub use postgres::PgPrincipalStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::StoreError;

pub type StoreResult<T> = Result<T, StoreError>;

/// Public view of a principal (no secrets)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub avatar_url: String,
    pub revocation_counter: i64,
    pub created_at: DateTime<Utc>,
}

/// Hash of the current refresh secret, plus the start of its chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshRecord {
    pub hash: String,
    /// Set at login; carried unchanged through every rotation
    pub issued_at: DateTime<Utc>,
}

/// A principal loaded together with its secret-bearing fields
#[derive(Debug, Clone)]
pub struct PrincipalSecrets {
    pub principal: Principal,
    pub credential_hash: String,
    pub refresh_record: Option<RefreshRecord>,
}

/// Fields needed to create a principal; the credential is already hashed
#[derive(Debug, Clone)]
pub struct NewPrincipal {
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub avatar_url: String,
    pub credential_hash: String,
}

#[async_trait]
pub trait PrincipalStore: Send + Sync {
    /// Create a principal with counter 0 and no refresh chain
    ///
    /// Fails with `StoreError::Conflict` when the username or email is taken.
    async fn create(&self, principal: NewPrincipal) -> StoreResult<Principal>;

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Principal>>;

    async fn find_by_id_with_secrets(&self, id: Uuid) -> StoreResult<Option<PrincipalSecrets>>;

    /// Look up by email when the identifier contains `@`, by username otherwise
    async fn find_by_identifier(&self, identifier: &str) -> StoreResult<Option<PrincipalSecrets>>;

    async fn current_revocation_counter(&self, id: Uuid) -> StoreResult<Option<i64>>;

    /// Replace the refresh record only if the stored hash equals `expected_hash`
    ///
    /// An absent stored record matches `None`. Returns the revocation counter
    /// at the moment of the swap, or `None` if the condition did not hold or
    /// the principal does not exist.
    async fn compare_and_set_refresh_record(
        &self,
        id: Uuid,
        expected_hash: Option<&str>,
        new_record: Option<RefreshRecord>,
    ) -> StoreResult<Option<i64>>;

    /// Install a fresh chain unconditionally, optionally bumping the counter
    ///
    /// Returns the counter after the update.
    async fn begin_chain(
        &self,
        id: Uuid,
        record: RefreshRecord,
        bump_counter: bool,
    ) -> StoreResult<Option<i64>>;

    /// Returns the counter after the increment
    async fn bump_revocation_counter(&self, id: Uuid) -> StoreResult<Option<i64>>;

    /// Bump the counter and clear the refresh record in one step
    async fn revoke_chain(&self, id: Uuid) -> StoreResult<Option<i64>>;
}

/// Whether a login identifier should be matched against the email column
pub(crate) fn is_email_identifier(identifier: &str) -> bool {
    identifier.contains('@')
}
