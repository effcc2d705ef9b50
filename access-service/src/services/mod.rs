//! Services layer for access-service.
//!
//! Token issuance and verification, the identity directory, the trust store, the
//! authorization engine and the facade the HTTP handlers call.

mod access;
mod authz;
mod directory;
pub mod error;
pub mod metrics;
mod namespace;
pub mod token;
mod trust;

pub use access::AccessService;
pub use authz::{AccessDecision, AuthorizationEngine};
pub use directory::IdentityDirectory;
pub use error::{AuthFailure, ServiceError, TokenRejection};
pub use namespace::ResourceNamespace;
pub use token::{IdentityClaims, IssuedToken, TokenService, TOKEN_ALGORITHM};
pub use trust::TrustStore;
