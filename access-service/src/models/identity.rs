//! Identity model - a registered user account.

use chrono::{DateTime, SubsecRound, Utc};
use serde::Serialize;
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;

use crate::utils::PasswordHashString;

/// Identity entity. `id` never changes once assigned and `created_at` is written once.
#[derive(Clone, FromRow, PartialEq, Eq)]
pub struct Identity {
    pub id: String,
    pub username: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl Identity {
    /// Create a new identity with a fresh id.
    pub fn new(username: String, password_hash: PasswordHashString) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            username,
            password_hash: password_hash.into_string(),
            // Microseconds: the finest resolution every backend stores.
            created_at: Utc::now().trunc_subsecs(6),
        }
    }

    pub fn password_hash(&self) -> PasswordHashString {
        PasswordHashString::new(self.password_hash.clone())
    }

    /// Convert to sanitized response (no credential material).
    pub fn sanitized(&self) -> IdentityResponse {
        IdentityResponse::from(self)
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("password_hash", &"[REDACTED]")
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// Identity as returned over the API.
#[derive(Debug, Clone, Serialize)]
pub struct IdentityResponse {
    pub id: String,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

impl From<&Identity> for IdentityResponse {
    fn from(i: &Identity) -> Self {
        Self {
            id: i.id.clone(),
            username: i.username.clone(),
            created_at: i.created_at,
        }
    }
}
