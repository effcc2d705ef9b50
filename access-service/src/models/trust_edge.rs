//! Trust edge model - "owner trusts reader".

use serde::Serialize;

/// Directed grant: `owner_id` lets `reader_id` read its resources.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TrustEdge {
    pub owner_id: String,
    pub reader_id: String,
}

impl TrustEdge {
    pub fn new(owner_id: impl Into<String>, reader_id: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            reader_id: reader_id.into(),
        }
    }
}
