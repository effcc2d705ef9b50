//! Trust Store: the directed "owner trusts reader" edge set, keyed by identity id.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::repo::TrustRepository;
use crate::services::error::{require_non_empty, ServiceError};

#[derive(Clone)]
pub struct TrustStore {
    repo: Arc<dyn TrustRepository>,
}

impl TrustStore {
    pub fn new(repo: Arc<dyn TrustRepository>) -> Self {
        Self { repo }
    }

    /// Record that `from_id` trusts `to_id`. An existing edge is `Conflict`.
    pub async fn create_edge(&self, from_id: &str, to_id: &str) -> Result<(), ServiceError> {
        require_non_empty("from_id", from_id)?;
        require_non_empty("to_id", to_id)?;

        if !self.repo.insert_edge(from_id, to_id).await? {
            return Err(ServiceError::Conflict(format!(
                "trust edge {} -> {} already exists",
                from_id, to_id
            )));
        }

        tracing::info!(from_id = %from_id, to_id = %to_id, "Trust edge created");
        Ok(())
    }

    pub async fn delete_edge(&self, from_id: &str, to_id: &str) -> Result<(), ServiceError> {
        require_non_empty("from_id", from_id)?;
        require_non_empty("to_id", to_id)?;

        if !self.repo.delete_edge(from_id, to_id).await? {
            return Err(ServiceError::NotFound(format!(
                "trust edge {} -> {}",
                from_id, to_id
            )));
        }

        tracing::info!(from_id = %from_id, to_id = %to_id, "Trust edge deleted");
        Ok(())
    }

    pub async fn edge_exists(&self, from_id: &str, to_id: &str) -> Result<bool, ServiceError> {
        require_non_empty("from_id", from_id)?;
        require_non_empty("to_id", to_id)?;
        self.repo.edge_exists(from_id, to_id).await
    }

    /// Ids `from_id` trusts. Empty when there are none.
    pub async fn list_trusted_by(&self, from_id: &str) -> Result<BTreeSet<String>, ServiceError> {
        require_non_empty("from_id", from_id)?;
        self.repo.readers_of(from_id).await
    }

    /// Ids that trust `to_id`. Empty when there are none.
    pub async fn list_trusters_of(&self, to_id: &str) -> Result<BTreeSet<String>, ServiceError> {
        require_non_empty("to_id", to_id)?;
        self.repo.owners_trusting(to_id).await
    }
}
