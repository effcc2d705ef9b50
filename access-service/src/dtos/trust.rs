use serde::Serialize;
use std::collections::BTreeSet;

/// Usernames on one side of the caller's trust edges.
#[derive(Debug, Serialize)]
pub struct TrustListResponse {
    pub username: String,
    pub users: Vec<String>,
}

impl TrustListResponse {
    pub fn new(username: String, users: BTreeSet<String>) -> Self {
        Self {
            username,
            users: users.into_iter().collect(),
        }
    }
}
