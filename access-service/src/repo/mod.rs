//! Persistence backends for identities and trust edges.
//!
//! The traits are the storage capability set; validation, logging and error shaping
//! live in the services that wrap them.

mod memory;
mod postgres;
mod sqlite;

use async_trait::async_trait;
use std::collections::BTreeSet;

use crate::models::Identity;
use crate::services::ServiceError;

pub use memory::InMemoryRepository;
pub use postgres::PostgresRepository;
pub use sqlite::SqliteRepository;

/// Storage for identity records.
#[async_trait]
pub trait IdentityRepository: Send + Sync {
    /// Insert a new identity. A taken username or id is `Conflict`.
    async fn insert_identity(&self, identity: &Identity) -> Result<(), ServiceError>;

    async fn find_identity_by_id(&self, id: &str) -> Result<Option<Identity>, ServiceError>;

    async fn find_identity_by_username(
        &self,
        username: &str,
    ) -> Result<Option<Identity>, ServiceError>;

    /// Update username and password hash of the identity with `identity.id`.
    /// Returns `false` when no record matched. `created_at` is left untouched.
    async fn update_identity(&self, identity: &Identity) -> Result<bool, ServiceError>;

    /// Delete an identity and every edge that references it. Returns `false` when absent.
    async fn delete_identity(&self, id: &str) -> Result<bool, ServiceError>;
}

/// Storage for the directed "owner trusts reader" edge set.
#[async_trait]
pub trait TrustRepository: Send + Sync {
    /// Atomically insert an edge. Returns `false` if the edge already existed.
    /// An edge naming an unknown identity is `NotFound`.
    async fn insert_edge(&self, owner_id: &str, reader_id: &str) -> Result<bool, ServiceError>;

    /// Returns `false` when no edge was removed.
    async fn delete_edge(&self, owner_id: &str, reader_id: &str) -> Result<bool, ServiceError>;

    async fn edge_exists(&self, owner_id: &str, reader_id: &str) -> Result<bool, ServiceError>;

    /// Ids that `owner_id` trusts.
    async fn readers_of(&self, owner_id: &str) -> Result<BTreeSet<String>, ServiceError>;

    /// Ids that trust `reader_id`.
    async fn owners_trusting(&self, reader_id: &str) -> Result<BTreeSet<String>, ServiceError>;
}

pub(crate) fn unknown_identity(owner_id: &str, reader_id: &str) -> ServiceError {
    ServiceError::NotFound(format!(
        "edge {} -> {} references an unknown identity",
        owner_id, reader_id
    ))
}
