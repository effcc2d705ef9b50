//! Identity Directory: user records, username resolution and credential checks.

use std::sync::{Arc, OnceLock};

use crate::models::Identity;
use crate::repo::IdentityRepository;
use crate::services::error::{require_non_empty, ServiceError};
use crate::utils::{CredentialHasher, Password, PasswordHashString};

const DUMMY_PASSWORD: &str = "unknown-user-placeholder";

#[derive(Clone)]
pub struct IdentityDirectory {
    repo: Arc<dyn IdentityRepository>,
    hasher: Arc<dyn CredentialHasher>,
    dummy_hash: Arc<OnceLock<PasswordHashString>>,
}

impl IdentityDirectory {
    pub fn new(repo: Arc<dyn IdentityRepository>, hasher: Arc<dyn CredentialHasher>) -> Self {
        Self {
            repo,
            hasher,
            dummy_hash: Arc::new(OnceLock::new()),
        }
    }

    /// Store a new identity. A taken username is `Conflict`; callers facing the outside
    /// world must not surface that distinction.
    pub async fn create(&self, identity: &Identity) -> Result<(), ServiceError> {
        require_non_empty("id", &identity.id)?;
        require_non_empty("username", &identity.username)?;
        require_non_empty("password_hash", &identity.password_hash)?;

        self.repo.insert_identity(identity).await?;

        tracing::info!(user_id = %identity.id, username = %identity.username, "Identity created");
        Ok(())
    }

    /// Hash `password` and create a fresh identity for `username`.
    pub async fn register(
        &self,
        username: &str,
        password: &Password,
    ) -> Result<Identity, ServiceError> {
        require_non_empty("username", username)?;
        if password.is_empty() {
            return Err(ServiceError::InvalidInput(
                "password cannot be empty".to_string(),
            ));
        }

        let password_hash = self.hasher.hash(password).map_err(ServiceError::Internal)?;
        let identity = Identity::new(username.to_string(), password_hash);
        self.create(&identity).await?;
        Ok(identity)
    }

    pub async fn get_by_username(&self, username: &str) -> Result<Identity, ServiceError> {
        require_non_empty("username", username)?;
        self.repo
            .find_identity_by_username(username)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("user {:?}", username)))
    }

    pub async fn get_by_id(&self, id: &str) -> Result<Identity, ServiceError> {
        require_non_empty("id", id)?;
        self.repo
            .find_identity_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("user id {}", id)))
    }

    /// Replace username and password hash of an existing identity. The stored
    /// `created_at` is kept whatever the caller passes in.
    pub async fn update(&self, identity: &Identity) -> Result<Identity, ServiceError> {
        require_non_empty("id", &identity.id)?;
        require_non_empty("username", &identity.username)?;
        require_non_empty("password_hash", &identity.password_hash)?;

        let current = self.get_by_id(&identity.id).await?;
        let updated = Identity {
            created_at: current.created_at,
            ..identity.clone()
        };

        if !self.repo.update_identity(&updated).await? {
            return Err(ServiceError::NotFound(format!("user id {}", identity.id)));
        }

        tracing::info!(user_id = %updated.id, "Identity updated");
        Ok(updated)
    }

    pub async fn delete(&self, id: &str) -> Result<(), ServiceError> {
        require_non_empty("id", id)?;
        if !self.repo.delete_identity(id).await? {
            return Err(ServiceError::NotFound(format!("user id {}", id)));
        }

        tracing::info!(user_id = %id, "Identity deleted");
        Ok(())
    }

    /// Compare `candidate` with the stored hash. Neither value is ever logged.
    pub fn verify_credential(
        &self,
        identity: &Identity,
        candidate: &Password,
    ) -> Result<bool, ServiceError> {
        self.hasher
            .verify(candidate, &identity.password_hash())
            .map_err(|e| {
                tracing::error!(user_id = %identity.id, error = %e, "Stored credential is unusable");
                ServiceError::Storage(e)
            })
    }

    /// Run one credential check against a throwaway hash so a login for an unknown
    /// username costs the same as a wrong password. The outcome is discarded.
    pub fn verify_absent_credential(&self, candidate: &Password) {
        let dummy = match self.dummy_hash.get() {
            Some(hash) => hash,
            None => match self.hasher.hash(&Password::new(DUMMY_PASSWORD)) {
                Ok(hash) => self.dummy_hash.get_or_init(|| hash),
                Err(e) => {
                    tracing::error!(error = %e, "Could not prepare placeholder credential");
                    return;
                }
            },
        };
        let _ = self.hasher.verify(candidate, dummy);
    }
}
