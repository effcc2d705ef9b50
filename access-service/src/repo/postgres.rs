//! PostgreSQL backend.

use async_trait::async_trait;
use sqlx::postgres::PgPool;
use std::collections::BTreeSet;

use super::{unknown_identity, IdentityRepository, TrustRepository};
use crate::models::Identity;
use crate::services::ServiceError;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations/postgres");

/// PostgreSQL-backed identity and trust storage.
#[derive(Clone)]
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<(), ServiceError> {
        tracing::info!("Running PostgreSQL migrations...");
        MIGRATOR.run(&self.pool).await?;
        tracing::info!("PostgreSQL migrations completed");
        Ok(())
    }
}

fn map_write_error(err: sqlx::Error, what: impl FnOnce() -> String) -> ServiceError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            ServiceError::Conflict(format!("{} already exists", what()))
        }
        _ => ServiceError::from(err),
    }
}

#[async_trait]
impl IdentityRepository for PostgresRepository {
    async fn insert_identity(&self, identity: &Identity) -> Result<(), ServiceError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, username, password_hash, created_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(&identity.id)
        .bind(&identity.username)
        .bind(&identity.password_hash)
        .bind(identity.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_write_error(e, || format!("identity {:?}", identity.username)))?;
        Ok(())
    }

    async fn find_identity_by_id(&self, id: &str) -> Result<Option<Identity>, ServiceError> {
        Ok(sqlx::query_as::<_, Identity>(
            "SELECT id, username, password_hash, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn find_identity_by_username(
        &self,
        username: &str,
    ) -> Result<Option<Identity>, ServiceError> {
        Ok(sqlx::query_as::<_, Identity>(
            "SELECT id, username, password_hash, created_at FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn update_identity(&self, identity: &Identity) -> Result<bool, ServiceError> {
        let result = sqlx::query("UPDATE users SET username = $1, password_hash = $2 WHERE id = $3")
            .bind(&identity.username)
            .bind(&identity.password_hash)
            .bind(&identity.id)
            .execute(&self.pool)
            .await
            .map_err(|e| map_write_error(e, || format!("username {:?}", identity.username)))?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_identity(&self, id: &str) -> Result<bool, ServiceError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl TrustRepository for PostgresRepository {
    async fn insert_edge(&self, owner_id: &str, reader_id: &str) -> Result<bool, ServiceError> {
        let result = sqlx::query(
            r#"
            INSERT INTO user_trusts (user_id, trusted_user_id)
            VALUES ($1, $2)
            ON CONFLICT (user_id, trusted_user_id) DO NOTHING
            "#,
        )
        .bind(owner_id)
        .bind(reader_id)
        .execute(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                unknown_identity(owner_id, reader_id)
            }
            _ => ServiceError::from(e),
        })?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_edge(&self, owner_id: &str, reader_id: &str) -> Result<bool, ServiceError> {
        let result =
            sqlx::query("DELETE FROM user_trusts WHERE user_id = $1 AND trusted_user_id = $2")
                .bind(owner_id)
                .bind(reader_id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn edge_exists(&self, owner_id: &str, reader_id: &str) -> Result<bool, ServiceError> {
        Ok(sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM user_trusts WHERE user_id = $1 AND trusted_user_id = $2)",
        )
        .bind(owner_id)
        .bind(reader_id)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn readers_of(&self, owner_id: &str) -> Result<BTreeSet<String>, ServiceError> {
        let ids = sqlx::query_scalar::<_, String>(
            "SELECT trusted_user_id FROM user_trusts WHERE user_id = $1",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids.into_iter().collect())
    }

    async fn owners_trusting(&self, reader_id: &str) -> Result<BTreeSet<String>, ServiceError> {
        let ids = sqlx::query_scalar::<_, String>(
            "SELECT user_id FROM user_trusts WHERE trusted_user_id = $1",
        )
        .bind(reader_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids.into_iter().collect())
    }
}
