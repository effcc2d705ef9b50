pub mod auth;
pub mod trust;
