//! SQLite backend, for single-node deployments and integration tests.

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::collections::BTreeSet;
use std::str::FromStr;

use super::{unknown_identity, IdentityRepository, TrustRepository};
use crate::models::Identity;
use crate::services::ServiceError;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations/sqlite");

/// SQLite-backed identity and trust storage.
#[derive(Clone)]
pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Private in-memory database with the schema applied. One connection, since every
    /// `:memory:` connection would otherwise see its own empty database.
    pub async fn in_memory() -> Result<Self, ServiceError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        let repo = Self::new(pool);
        repo.migrate().await?;
        Ok(repo)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<(), ServiceError> {
        tracing::info!("Running SQLite migrations...");
        MIGRATOR.run(&self.pool).await?;
        tracing::info!("SQLite migrations completed");
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
impl IdentityRepository for SqliteRepository {
    async fn insert_identity(&self, identity: &Identity) -> Result<(), ServiceError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, username, password_hash, created_at)
            VALUES (?, ?, ?, ?)
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
            "SELECT id, username, password_hash, created_at FROM users WHERE id = ?",
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
            "SELECT id, username, password_hash, created_at FROM users WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn update_identity(&self, identity: &Identity) -> Result<bool, ServiceError> {
        let result = sqlx::query("UPDATE users SET username = ?, password_hash = ? WHERE id = ?")
            .bind(&identity.username)
            .bind(&identity.password_hash)
            .bind(&identity.id)
            .execute(&self.pool)
            .await
            .map_err(|e| map_write_error(e, || format!("username {:?}", identity.username)))?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_identity(&self, id: &str) -> Result<bool, ServiceError> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl TrustRepository for SqliteRepository {
    async fn insert_edge(&self, owner_id: &str, reader_id: &str) -> Result<bool, ServiceError> {
        let result = sqlx::query(
            r#"
            INSERT INTO user_trusts (user_id, trusted_user_id)
            VALUES (?, ?)
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
            sqlx::query("DELETE FROM user_trusts WHERE user_id = ? AND trusted_user_id = ?")
                .bind(owner_id)
                .bind(reader_id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn edge_exists(&self, owner_id: &str, reader_id: &str) -> Result<bool, ServiceError> {
        let found = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM user_trusts WHERE user_id = ? AND trusted_user_id = ?",
        )
        .bind(owner_id)
        .bind(reader_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(found > 0)
    }

    async fn readers_of(&self, owner_id: &str) -> Result<BTreeSet<String>, ServiceError> {
        let ids = sqlx::query_scalar::<_, String>(
            "SELECT trusted_user_id FROM user_trusts WHERE user_id = ?",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids.into_iter().collect())
    }

    async fn owners_trusting(&self, reader_id: &str) -> Result<BTreeSet<String>, ServiceError> {
        let ids = sqlx::query_scalar::<_, String>(
            "SELECT user_id FROM user_trusts WHERE trusted_user_id = ?",
        )
        .bind(reader_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids.into_iter().collect())
    }
}
