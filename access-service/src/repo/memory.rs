//! In-memory backend, used by tests and local experiments.

use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::{unknown_identity, IdentityRepository, TrustRepository};
use crate::models::{Identity, TrustEdge};
use crate::services::ServiceError;

#[derive(Default)]
struct State {
    identities: HashMap<String, Identity>,
    edges: BTreeSet<TrustEdge>,
}

/// Both repositories behind one lock, so edge writes see a consistent identity set.
#[derive(Default)]
pub struct InMemoryRepository {
    state: RwLock<State>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>, ServiceError> {
        self.state
            .read()
            .map_err(|_| ServiceError::Storage(anyhow::anyhow!("in-memory store lock poisoned")))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>, ServiceError> {
        self.state
            .write()
            .map_err(|_| ServiceError::Storage(anyhow::anyhow!("in-memory store lock poisoned")))
    }
}

fn username_taken(state: &State, username: &str, except_id: Option<&str>) -> bool {
    state
        .identities
        .values()
        .any(|i| i.username == username && Some(i.id.as_str()) != except_id)
}

#[async_trait]
impl IdentityRepository for InMemoryRepository {
    async fn insert_identity(&self, identity: &Identity) -> Result<(), ServiceError> {
        let mut state = self.write()?;

        if state.identities.contains_key(&identity.id) {
            return Err(ServiceError::Conflict(format!(
                "identity id {} already exists",
                identity.id
            )));
        }
        if username_taken(&state, &identity.username, None) {
            return Err(ServiceError::Conflict(format!(
                "username {:?} already exists",
                identity.username
            )));
        }

        state
            .identities
            .insert(identity.id.clone(), identity.clone());
        Ok(())
    }

    async fn find_identity_by_id(&self, id: &str) -> Result<Option<Identity>, ServiceError> {
        Ok(self.read()?.identities.get(id).cloned())
    }

    async fn find_identity_by_username(
        &self,
        username: &str,
    ) -> Result<Option<Identity>, ServiceError> {
        Ok(self
            .read()?
            .identities
            .values()
            .find(|i| i.username == username)
            .cloned())
    }

    async fn update_identity(&self, identity: &Identity) -> Result<bool, ServiceError> {
        let mut state = self.write()?;

        if !state.identities.contains_key(&identity.id) {
            return Ok(false);
        }
        if username_taken(&state, &identity.username, Some(&identity.id)) {
            return Err(ServiceError::Conflict(format!(
                "username {:?} already exists",
                identity.username
            )));
        }

        if let Some(existing) = state.identities.get_mut(&identity.id) {
            existing.username = identity.username.clone();
            existing.password_hash = identity.password_hash.clone();
        }
        Ok(true)
    }

    async fn delete_identity(&self, id: &str) -> Result<bool, ServiceError> {
        let mut state = self.write()?;

        if state.identities.remove(id).is_none() {
            return Ok(false);
        }
        state
            .edges
            .retain(|edge| edge.owner_id != id && edge.reader_id != id);
        Ok(true)
    }
}

#[async_trait]
impl TrustRepository for InMemoryRepository {
    async fn insert_edge(&self, owner_id: &str, reader_id: &str) -> Result<bool, ServiceError> {
        let mut state = self.write()?;

        if !state.identities.contains_key(owner_id) || !state.identities.contains_key(reader_id) {
            return Err(unknown_identity(owner_id, reader_id));
        }

        Ok(state.edges.insert(TrustEdge::new(owner_id, reader_id)))
    }

    async fn delete_edge(&self, owner_id: &str, reader_id: &str) -> Result<bool, ServiceError> {
        Ok(self
            .write()?
            .edges
            .remove(&TrustEdge::new(owner_id, reader_id)))
    }

    async fn edge_exists(&self, owner_id: &str, reader_id: &str) -> Result<bool, ServiceError> {
        Ok(self
            .read()?
            .edges
            .contains(&TrustEdge::new(owner_id, reader_id)))
    }

    async fn readers_of(&self, owner_id: &str) -> Result<BTreeSet<String>, ServiceError> {
        Ok(self
            .read()?
            .edges
            .iter()
            .filter(|edge| edge.owner_id == owner_id)
            .map(|edge| edge.reader_id.clone())
            .collect())
    }

    async fn owners_trusting(&self, reader_id: &str) -> Result<BTreeSet<String>, ServiceError> {
        Ok(self
            .read()?
            .edges
            .iter()
            .filter(|edge| edge.reader_id == reader_id)
            .map(|edge| edge.owner_id.clone())
            .collect())
    }
}
