//! Authorization Engine: may a requester read resources owned by someone else?

use metrics::counter;

use crate::services::directory::IdentityDirectory;
use crate::services::error::ServiceError;
use crate::services::trust::TrustStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    Allow,
    Deny,
}

impl AccessDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessDecision::Allow => "allow",
            AccessDecision::Deny => "deny",
        }
    }
}

#[derive(Clone)]
pub struct AuthorizationEngine {
    directory: IdentityDirectory,
    trust: TrustStore,
}

impl AuthorizationEngine {
    pub fn new(directory: IdentityDirectory, trust: TrustStore) -> Self {
        Self { directory, trust }
    }

    /// Decide whether `requester` may read resources owned by `owner`.
    ///
    /// An empty owner means the requester's own resources. Self-access is allowed without
    /// touching either store. Otherwise both usernames are resolved afresh and the edge
    /// owner -> requester decides. A missing identity is `NotFound`; the caller collapses
    /// it with storage faults via [`ServiceError::into_access_error`].
    pub async fn can_read(
        &self,
        requester: &str,
        owner: &str,
    ) -> Result<AccessDecision, ServiceError> {
        if owner.is_empty() || owner == requester {
            counter!("authorization_decisions_total", "outcome" => "self").increment(1);
            return Ok(AccessDecision::Allow);
        }

        let outcome = self.decide(requester, owner).await;
        let label = match &outcome {
            Ok(decision) => decision.as_str(),
            Err(ServiceError::NotFound(_)) => "not_found",
            Err(_) => "error",
        };
        counter!("authorization_decisions_total", "outcome" => label).increment(1);

        if let Ok(AccessDecision::Deny) = outcome {
            tracing::info!(requester = %requester, owner = %owner, "Read denied, no trust edge");
        }
        outcome
    }

    async fn decide(&self, requester: &str, owner: &str) -> Result<AccessDecision, ServiceError> {
        let owner_identity = self.directory.get_by_username(owner).await?;
        let requester_identity = self.directory.get_by_username(requester).await?;

        if self
            .trust
            .edge_exists(&owner_identity.id, &requester_identity.id)
            .await?
        {
            Ok(AccessDecision::Allow)
        } else {
            Ok(AccessDecision::Deny)
        }
    }
}
