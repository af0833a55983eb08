use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{
    is_email_identifier, NewPrincipal, Principal, PrincipalSecrets, PrincipalStore, RefreshRecord,
    StoreResult,
};

const SECRET_COLUMNS: &str = r#"
    id, username, email, full_name, avatar_url, revocation_counter, created_at,
    credential_hash, refresh_token_hash, refresh_issued_at
"#;

/// Postgres-backed PrincipalStore
///
/// Chain mutations are single `UPDATE ... RETURNING` statements, so the
/// condition and the write are evaluated atomically by the database.
#[derive(Debug, Clone)]
pub struct PgPrincipalStore {
    pool: PgPool,
}

impl PgPrincipalStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct PrincipalRow {
    id: Uuid,
    username: String,
    email: String,
    full_name: String,
    avatar_url: String,
    revocation_counter: i64,
    created_at: DateTime<Utc>,
}

impl From<PrincipalRow> for Principal {
    fn from(row: PrincipalRow) -> Self {
        Principal {
            id: row.id,
            username: row.username,
            email: row.email,
            full_name: row.full_name,
            avatar_url: row.avatar_url,
            revocation_counter: row.revocation_counter,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct PrincipalSecretsRow {
    id: Uuid,
    username: String,
    email: String,
    full_name: String,
    avatar_url: String,
    revocation_counter: i64,
    created_at: DateTime<Utc>,
    credential_hash: String,
    refresh_token_hash: Option<String>,
    refresh_issued_at: Option<DateTime<Utc>>,
}

impl From<PrincipalSecretsRow> for PrincipalSecrets {
    fn from(row: PrincipalSecretsRow) -> Self {
        let refresh_record = match (row.refresh_token_hash, row.refresh_issued_at) {
            (Some(hash), Some(issued_at)) => Some(RefreshRecord { hash, issued_at }),
            _ => None,
        };
        PrincipalSecrets {
            principal: Principal {
                id: row.id,
                username: row.username,
                email: row.email,
                full_name: row.full_name,
                avatar_url: row.avatar_url,
                revocation_counter: row.revocation_counter,
                created_at: row.created_at,
            },
            credential_hash: row.credential_hash,
            refresh_record,
        }
    }
}

#[async_trait]
impl PrincipalStore for PgPrincipalStore {
    async fn create(&self, new: NewPrincipal) -> StoreResult<Principal> {
        let now = Utc::now();
        let row = sqlx::query_as::<_, PrincipalRow>(
            r#"
            INSERT INTO principals
                (id, username, email, full_name, avatar_url, credential_hash, revocation_counter, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, 0, $7, $7)
            RETURNING id, username, email, full_name, avatar_url, revocation_counter, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(new.username.to_lowercase())
        .bind(new.email.to_lowercase())
        .bind(&new.full_name)
        .bind(&new.avatar_url)
        .bind(&new.credential_hash)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Principal>> {
        let row = sqlx::query_as::<_, PrincipalRow>(
            r#"
            SELECT id, username, email, full_name, avatar_url, revocation_counter, created_at
            FROM principals
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn find_by_id_with_secrets(&self, id: Uuid) -> StoreResult<Option<PrincipalSecrets>> {
        let sql = format!("SELECT {} FROM principals WHERE id = $1", SECRET_COLUMNS);
        let row = sqlx::query_as::<_, PrincipalSecretsRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Into::into))
    }

    async fn find_by_identifier(&self, identifier: &str) -> StoreResult<Option<PrincipalSecrets>> {
        let column = if is_email_identifier(identifier) {
            "email"
        } else {
            "username"
        };
        let sql = format!(
            "SELECT {} FROM principals WHERE {} = $1",
            SECRET_COLUMNS, column
        );
        let row = sqlx::query_as::<_, PrincipalSecretsRow>(&sql)
            .bind(identifier.to_lowercase())
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Into::into))
    }

    async fn current_revocation_counter(&self, id: Uuid) -> StoreResult<Option<i64>> {
        let counter = sqlx::query_scalar::<_, i64>(
            "SELECT revocation_counter FROM principals WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(counter)
    }

    async fn compare_and_set_refresh_record(
        &self,
        id: Uuid,
        expected_hash: Option<&str>,
        new_record: Option<RefreshRecord>,
    ) -> StoreResult<Option<i64>> {
        let (hash, issued_at) = match new_record {
            Some(record) => (Some(record.hash), Some(record.issued_at)),
            None => (None, None),
        };

        let counter = sqlx::query_scalar::<_, i64>(
            r#"
            UPDATE principals
            SET refresh_token_hash = $3, refresh_issued_at = $4, updated_at = now()
            WHERE id = $1 AND refresh_token_hash IS NOT DISTINCT FROM $2
            RETURNING revocation_counter
            "#,
        )
        .bind(id)
        .bind(expected_hash)
        .bind(hash)
        .bind(issued_at)
        .fetch_optional(&self.pool)
        .await?;

        Ok(counter)
    }

    async fn begin_chain(
        &self,
        id: Uuid,
        record: RefreshRecord,
        bump_counter: bool,
    ) -> StoreResult<Option<i64>> {
        let counter = sqlx::query_scalar::<_, i64>(
            r#"
            UPDATE principals
            SET refresh_token_hash = $2,
                refresh_issued_at = $3,
                revocation_counter = revocation_counter + CASE WHEN $4 THEN 1 ELSE 0 END,
                updated_at = now()
            WHERE id = $1
            RETURNING revocation_counter
            "#,
        )
        .bind(id)
        .bind(record.hash)
        .bind(record.issued_at)
        .bind(bump_counter)
        .fetch_optional(&self.pool)
        .await?;

        Ok(counter)
    }

    async fn bump_revocation_counter(&self, id: Uuid) -> StoreResult<Option<i64>> {
        let counter = sqlx::query_scalar::<_, i64>(
            r#"
            UPDATE principals
            SET revocation_counter = revocation_counter + 1, updated_at = now()
            WHERE id = $1
            RETURNING revocation_counter
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(counter)
    }

    async fn revoke_chain(&self, id: Uuid) -> StoreResult<Option<i64>> {
        let counter = sqlx::query_scalar::<_, i64>(
            r#"
            UPDATE principals
            SET revocation_counter = revocation_counter + 1,
                refresh_token_hash = NULL,
                refresh_issued_at = NULL,
                updated_at = now()
            WHERE id = $1
            RETURNING revocation_counter
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(counter)
    }
}
