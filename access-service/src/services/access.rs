//! Entry points for the routing layer: authenticate, authorize and trust management.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::db::Repositories;
use crate::models::Identity;
use crate::services::authz::{AccessDecision, AuthorizationEngine};
use crate::services::directory::IdentityDirectory;
use crate::services::error::{require_non_empty, AuthFailure, ServiceError};
use crate::services::token::{IssuedToken, TokenService};
use crate::services::trust::TrustStore;
use crate::utils::{CredentialHasher, Password};

#[derive(Clone)]
pub struct AccessService {
    directory: IdentityDirectory,
    trust: TrustStore,
    engine: AuthorizationEngine,
    tokens: TokenService,
}

impl AccessService {
    pub fn new(
        repos: Repositories,
        hasher: Arc<dyn CredentialHasher>,
        tokens: TokenService,
    ) -> Self {
        let directory = IdentityDirectory::new(repos.identities, hasher);
        let trust = TrustStore::new(repos.trust);
        let engine = AuthorizationEngine::new(directory.clone(), trust.clone());
        Self {
            directory,
            trust,
            engine,
            tokens,
        }
    }

    pub fn directory(&self) -> &IdentityDirectory {
        &self.directory
    }

    pub fn trust(&self) -> &TrustStore {
        &self.trust
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    pub async fn register(
        &self,
        username: &str,
        password: &Password,
    ) -> Result<Identity, ServiceError> {
        self.directory.register(username, password).await
    }

    /// Check a username/password pair and issue an identity token.
    ///
    /// An unknown username and a wrong password fail identically.
    pub async fn authenticate(
        &self,
        username: &str,
        password: &Password,
    ) -> Result<IssuedToken, ServiceError> {
        require_non_empty("username", username)?;

        let identity = match self.directory.get_by_username(username).await {
            Ok(identity) => identity,
            Err(ServiceError::NotFound(_)) => {
                self.directory.verify_absent_credential(password);
                tracing::info!(username = %username, "Login for unknown user");
                return Err(ServiceError::AuthenticationFailed(AuthFailure::BadCredentials));
            }
            Err(e) => return Err(e),
        };

        if !self.directory.verify_credential(&identity, password)? {
            tracing::info!(user_id = %identity.id, "Login with wrong password");
            return Err(ServiceError::AuthenticationFailed(AuthFailure::BadCredentials));
        }

        let issued = self.tokens.issue(&identity.username)?;
        tracing::info!(user_id = %identity.id, "User authenticated");
        Ok(issued)
    }

    /// Verify `token` and decide whether its subject may read `owner`'s resources.
    /// Returns the requester's username on success; a missing trust edge is `Forbidden`.
    pub async fn authorize(&self, token: &str, owner: &str) -> Result<String, ServiceError> {
        let claims = self.tokens.verify(token)?;
        self.authorize_requester(&claims.username, owner).await?;
        Ok(claims.username)
    }

    /// Decision half of [`authorize`](Self::authorize), for callers that already hold a
    /// verified requester.
    pub async fn authorize_requester(&self, requester: &str, owner: &str) -> Result<(), ServiceError> {
        match self.engine.can_read(requester, owner).await? {
            AccessDecision::Allow => Ok(()),
            AccessDecision::Deny => Err(ServiceError::Forbidden(format!(
                "{:?} does not trust {:?}",
                owner, requester
            ))),
        }
    }

    /// `owner` lets `reader` read its files.
    pub async fn grant_trust(&self, owner: &str, reader: &str) -> Result<(), ServiceError> {
        let (owner_id, reader_id) = self.resolve_pair(owner, reader).await?;
        self.trust.create_edge(&owner_id, &reader_id).await
    }

    pub async fn revoke_trust(&self, owner: &str, reader: &str) -> Result<(), ServiceError> {
        let (owner_id, reader_id) = self.resolve_pair(owner, reader).await?;
        self.trust.delete_edge(&owner_id, &reader_id).await
    }

    /// Usernames `owner` trusts.
    pub async fn trusted_by(&self, owner: &str) -> Result<BTreeSet<String>, ServiceError> {
        let identity = self.directory.get_by_username(owner).await?;
        let ids = self.trust.list_trusted_by(&identity.id).await?;
        self.usernames(ids).await
    }

    /// Usernames that trust `reader`.
    pub async fn trusters_of(&self, reader: &str) -> Result<BTreeSet<String>, ServiceError> {
        let identity = self.directory.get_by_username(reader).await?;
        let ids = self.trust.list_trusters_of(&identity.id).await?;
        self.usernames(ids).await
    }

    async fn resolve_pair(&self, owner: &str, reader: &str) -> Result<(String, String), ServiceError> {
        require_non_empty("owner", owner)?;
        require_non_empty("reader", reader)?;
        if owner == reader {
            return Err(ServiceError::InvalidInput(
                "cannot grant trust to yourself".to_string(),
            ));
        }

        let owner_identity = self.directory.get_by_username(owner).await?;
        let reader_identity = self.directory.get_by_username(reader).await?;
        Ok((owner_identity.id, reader_identity.id))
    }

    async fn usernames(&self, ids: BTreeSet<String>) -> Result<BTreeSet<String>, ServiceError> {
        let mut names = BTreeSet::new();
        for id in ids {
            match self.directory.get_by_id(&id).await {
                Ok(identity) => {
                    names.insert(identity.username);
                }
                // Deleted between the two reads.
                Err(ServiceError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(names)
    }
}
