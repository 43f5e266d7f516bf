//! PostgreSQL store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{AuthStore, StoreError};
use crate::models::{Challenge, Identity};

/// `sqlx`-backed store. Schema lives in `migrations/`.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuthStore for PgStore {
    async fn insert_challenge(&self, challenge: &Challenge) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO auth_challenges (id, address, message, created_at, expires_at, used, used_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(challenge.id)
        .bind(&challenge.address)
        .bind(&challenge.message)
        .bind(challenge.created_at)
        .bind(challenge.expires_at)
        .bind(challenge.used)
        .bind(challenge.used_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_challenge(&self, id: Uuid) -> Result<Option<Challenge>, StoreError> {
        let challenge = sqlx::query_as::<_, Challenge>(
            r#"
            SELECT id, address, message, created_at, expires_at, used, used_at
            FROM auth_challenges
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(challenge)
    }

    async fn mark_challenge_used(
        &self,
        id: Uuid,
        used_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        // Conditional update: only the request that flips the flag sees a row
        let rows_affected = sqlx::query(
            r#"
            UPDATE auth_challenges
            SET used = TRUE, used_at = $2
            WHERE id = $1 AND used = FALSE
            "#,
        )
        .bind(id)
        .bind(used_at)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(rows_affected == 1)
    }

    async fn purge_expired_challenges(&self, before: DateTime<Utc>) -> Result<u64, StoreError> {
        let rows_affected = sqlx::query(
            r#"
            DELETE FROM auth_challenges WHERE expires_at < $1
            "#,
        )
        .bind(before)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(rows_affected)
    }

    async fn insert_identity_if_absent(&self, identity: &Identity) -> Result<bool, StoreError> {
        let rows_affected = sqlx::query(
            r#"
            INSERT INTO identities (id, address, display_name, role, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(identity.id)
        .bind(&identity.address)
        .bind(&identity.display_name)
        .bind(identity.role)
        .bind(identity.created_at)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(rows_affected == 1)
    }

    async fn get_identity_by_address(
        &self,
        address: &str,
    ) -> Result<Option<Identity>, StoreError> {
        let identity = sqlx::query_as::<_, Identity>(
            r#"
            SELECT id, address, display_name, role, created_at
            FROM identities
            WHERE address = $1
            "#,
        )
        .bind(address)
        .fetch_optional(&self.pool)
        .await?;

        Ok(identity)
    }

    async fn get_identity_by_id(&self, id: Uuid) -> Result<Option<Identity>, StoreError> {
        let identity = sqlx::query_as::<_, Identity>(
            r#"
            SELECT id, address, display_name, role, created_at
            FROM identities
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(identity)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}
