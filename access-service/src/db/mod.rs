//! Connection management: opens the configured backend and hands out repositories.

use secrecy::ExposeSecret;
use sqlx::postgres::PgPoolOptions;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::config::DatabaseConfig;
use crate::repo::{
    IdentityRepository, InMemoryRepository, PostgresRepository, SqliteRepository,
    TrustRepository,
};
use crate::services::ServiceError;

/// The two repositories a service stack needs, sharing one backend.
#[derive(Clone)]
pub struct Repositories {
    pub identities: Arc<dyn IdentityRepository>,
    pub trust: Arc<dyn TrustRepository>,
}

impl Repositories {
    pub fn new<R>(backend: Arc<R>) -> Self
    where
        R: IdentityRepository + TrustRepository + 'static,
    {
        Self {
            identities: backend.clone(),
            trust: backend,
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryRepository::new()))
    }

    /// Connect to the database named by `config.url` and apply migrations.
    ///
    /// `postgres://` and `postgresql://` select PostgreSQL, `sqlite:` selects SQLite and
    /// `memory:` selects the in-process store.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, ServiceError> {
        let url = config.url.expose_secret();

        if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            tracing::info!("Connecting to PostgreSQL...");
            let pool = PgPoolOptions::new()
                .max_connections(config.max_connections)
                .min_connections(config.min_connections)
                .acquire_timeout(Duration::from_secs(30))
                .idle_timeout(Duration::from_secs(600))
                .max_lifetime(Duration::from_secs(1800))
                .connect(url)
                .await?;
            tracing::info!("Successfully connected to PostgreSQL");

            let repo = PostgresRepository::new(pool);
            repo.migrate().await?;
            Ok(Self::new(Arc::new(repo)))
        } else if url.starts_with("sqlite:") {
            tracing::info!("Opening SQLite database...");
            let options = SqliteConnectOptions::from_str(url)?.foreign_keys(true);
            let pool = SqlitePoolOptions::new()
                .max_connections(config.max_connections)
                .min_connections(config.min_connections)
                .acquire_timeout(Duration::from_secs(30))
                .connect_with(options)
                .await?;
            tracing::info!("SQLite database ready");

            let repo = SqliteRepository::new(pool);
            repo.migrate().await?;
            Ok(Self::new(Arc::new(repo)))
        } else if url == "memory:" {
            tracing::warn!("Using the in-memory store; nothing will survive a restart");
            Ok(Self::in_memory())
        } else {
            Err(ServiceError::InvalidInput(
                "DATABASE_URL must start with postgres://, sqlite: or be memory:".to_string(),
            ))
        }
    }
}
