use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    is_email_identifier, NewPrincipal, Principal, PrincipalSecrets, PrincipalStore, RefreshRecord,
    StoreResult,
};
use crate::error::StoreError;

/// In-memory implementation of PrincipalStore (for development/testing)
///
/// Each mutation runs under a single write guard, which makes every
/// conditional update atomic with respect to concurrent callers.
#[derive(Debug, Default, Clone)]
pub struct InMemoryPrincipalStore {
    principals: Arc<RwLock<HashMap<Uuid, PrincipalSecrets>>>,
}

impl InMemoryPrincipalStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn matches_identifier(entry: &PrincipalSecrets, identifier: &str) -> bool {
        if is_email_identifier(identifier) {
            entry.principal.email.eq_ignore_ascii_case(identifier)
        } else {
            entry.principal.username.eq_ignore_ascii_case(identifier)
        }
    }
}

#[async_trait]
impl PrincipalStore for InMemoryPrincipalStore {
    async fn create(&self, new: NewPrincipal) -> StoreResult<Principal> {
        let mut principals = self.principals.write().await;

        if principals
            .values()
            .any(|p| p.principal.username.eq_ignore_ascii_case(&new.username))
        {
            return Err(StoreError::Conflict("Username".to_string()));
        }
        if principals
            .values()
            .any(|p| p.principal.email.eq_ignore_ascii_case(&new.email))
        {
            return Err(StoreError::Conflict("Email".to_string()));
        }

        let principal = Principal {
            id: Uuid::new_v4(),
            username: new.username.to_lowercase(),
            email: new.email.to_lowercase(),
            full_name: new.full_name,
            avatar_url: new.avatar_url,
            revocation_counter: 0,
            created_at: Utc::now(),
        };
        principals.insert(
            principal.id,
            PrincipalSecrets {
                principal: principal.clone(),
                credential_hash: new.credential_hash,
                refresh_record: None,
            },
        );

        tracing::debug!(principal_id = %principal.id, "Created principal");
        Ok(principal)
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Principal>> {
        let principals = self.principals.read().await;
        Ok(principals.get(&id).map(|p| p.principal.clone()))
    }

    async fn find_by_id_with_secrets(&self, id: Uuid) -> StoreResult<Option<PrincipalSecrets>> {
        let principals = self.principals.read().await;
        Ok(principals.get(&id).cloned())
    }

    async fn find_by_identifier(&self, identifier: &str) -> StoreResult<Option<PrincipalSecrets>> {
        let principals = self.principals.read().await;
        Ok(principals
            .values()
            .find(|p| Self::matches_identifier(p, identifier))
            .cloned())
    }

    async fn current_revocation_counter(&self, id: Uuid) -> StoreResult<Option<i64>> {
        let principals = self.principals.read().await;
        Ok(principals.get(&id).map(|p| p.principal.revocation_counter))
    }

    async fn compare_and_set_refresh_record(
        &self,
        id: Uuid,
        expected_hash: Option<&str>,
        new_record: Option<RefreshRecord>,
    ) -> StoreResult<Option<i64>> {
        let mut principals = self.principals.write().await;
        let Some(entry) = principals.get_mut(&id) else {
            return Ok(None);
        };

        let current_hash = entry.refresh_record.as_ref().map(|r| r.hash.as_str());
        if current_hash != expected_hash {
            return Ok(None);
        }

        entry.refresh_record = new_record;
        Ok(Some(entry.principal.revocation_counter))
    }

    async fn begin_chain(
        &self,
        id: Uuid,
        record: RefreshRecord,
        bump_counter: bool,
    ) -> StoreResult<Option<i64>> {
        let mut principals = self.principals.write().await;
        Ok(principals.get_mut(&id).map(|entry| {
            if bump_counter {
                entry.principal.revocation_counter += 1;
            }
            entry.refresh_record = Some(record);
            entry.principal.revocation_counter
        }))
    }

    async fn bump_revocation_counter(&self, id: Uuid) -> StoreResult<Option<i64>> {
        let mut principals = self.principals.write().await;
        Ok(principals.get_mut(&id).map(|entry| {
            entry.principal.revocation_counter += 1;
            entry.principal.revocation_counter
        }))
    }

    async fn revoke_chain(&self, id: Uuid) -> StoreResult<Option<i64>> {
        let mut principals = self.principals.write().await;
        Ok(principals.get_mut(&id).map(|entry| {
            entry.principal.revocation_counter += 1;
            entry.refresh_record = None;
            entry.principal.revocation_counter
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_principal(username: &str, email: &str) -> NewPrincipal {
        NewPrincipal {
            username: username.to_string(),
            email: email.to_string(),
            full_name: "Test User".to_string(),
            avatar_url: String::new(),
            credential_hash: "$2b$04$placeholder".to_string(),
        }
    }

    fn record(hash: &str) -> RefreshRecord {
        RefreshRecord {
            hash: hash.to_string(),
            issued_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_create_starts_without_chain() {
        let store = InMemoryPrincipalStore::new();
        let principal = store
            .create(new_principal("alice", "alice@example.com"))
            .await
            .unwrap();

        assert_eq!(principal.revocation_counter, 0);
        let secrets = store.find_by_id_with_secrets(principal.id).await.unwrap().unwrap();
        assert!(secrets.refresh_record.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_username_and_email_conflict() {
        let store = InMemoryPrincipalStore::new();
        store
            .create(new_principal("alice", "alice@example.com"))
            .await
            .unwrap();

        let err = store
            .create(new_principal("ALICE", "other@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(ref f) if f == "Username"));

        let err = store
            .create(new_principal("bob", "Alice@Example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(ref f) if f == "Email"));
    }

    #[tokio::test]
    async fn test_find_by_identifier() {
        let store = InMemoryPrincipalStore::new();
        let principal = store
            .create(new_principal("alice", "alice@example.com"))
            .await
            .unwrap();

        let by_email = store.find_by_identifier("ALICE@example.com").await.unwrap();
        let by_username = store.find_by_identifier("Alice").await.unwrap();
        assert_eq!(by_email.unwrap().principal.id, principal.id);
        assert_eq!(by_username.unwrap().principal.id, principal.id);
        assert!(store.find_by_identifier("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_compare_and_set_requires_matching_hash() {
        let store = InMemoryPrincipalStore::new();
        let id = store
            .create(new_principal("alice", "alice@example.com"))
            .await
            .unwrap()
            .id;

        // empty chain only matches an expected `None`
        assert!(store
            .compare_and_set_refresh_record(id, Some("h0"), Some(record("h1")))
            .await
            .unwrap()
            .is_none());
        assert_eq!(
            store
                .compare_and_set_refresh_record(id, None, Some(record("h1")))
                .await
                .unwrap(),
            Some(0)
        );

        assert!(store
            .compare_and_set_refresh_record(id, Some("stale"), Some(record("h2")))
            .await
            .unwrap()
            .is_none());
        assert!(store
            .compare_and_set_refresh_record(id, Some("h1"), Some(record("h2")))
            .await
            .unwrap()
            .is_some());

        let secrets = store.find_by_id_with_secrets(id).await.unwrap().unwrap();
        assert_eq!(secrets.refresh_record.unwrap().hash, "h2");
    }

    #[tokio::test]
    async fn test_revoke_chain_bumps_and_clears() {
        let store = InMemoryPrincipalStore::new();
        let id = store
            .create(new_principal("alice", "alice@example.com"))
            .await
            .unwrap()
            .id;

        assert_eq!(store.begin_chain(id, record("h1"), true).await.unwrap(), Some(1));
        assert_eq!(store.revoke_chain(id).await.unwrap(), Some(2));

        let secrets = store.find_by_id_with_secrets(id).await.unwrap().unwrap();
        assert!(secrets.refresh_record.is_none());
        assert_eq!(store.current_revocation_counter(id).await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn test_unknown_principal() {
        let store = InMemoryPrincipalStore::new();
        let id = Uuid::new_v4();

        assert!(store.find_by_id(id).await.unwrap().is_none());
        assert!(store.bump_revocation_counter(id).await.unwrap().is_none());
        assert!(store.revoke_chain(id).await.unwrap().is_none());
        assert!(store
            .compare_and_set_refresh_record(id, None, None)
            .await
            .unwrap()
            .is_none());
    }
}
