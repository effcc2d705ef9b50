//! Domain models for access-service.

mod identity;
mod trust_edge;

pub use identity::{Identity, IdentityResponse};
pub use trust_edge::TrustEdge;
