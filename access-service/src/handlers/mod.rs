//! HTTP handlers for access-service.

pub mod auth;
pub mod files;
pub mod health;
pub mod metrics;
pub mod trust;
