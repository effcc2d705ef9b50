//! Shared setup for access-service integration tests.

#![allow(dead_code)]

use access_service::{
    build_router,
    config::{
        AccessConfig, DatabaseConfig, Environment, JwtConfig, RateLimitConfig, StorageConfig,
    },
    db::Repositories,
    models::Identity,
    repo::{IdentityRepository, InMemoryRepository, TrustRepository},
    services::{AccessService, ServiceError, TokenService},
    utils::{CredentialHasher, Password, PasswordHashString},
    AppState,
};
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use secrecy::Secret;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tower::util::ServiceExt;

/// Reversible stand-in for argon2 so tests that register many users stay fast.
pub struct PlainHasher;

impl CredentialHasher for PlainHasher {
    fn hash(&self, password: &Password) -> Result<PasswordHashString, anyhow::Error> {
        Ok(PasswordHashString::new(format!("plain:{}", password.as_str())))
    }

    fn verify(
        &self,
        password: &Password,
        password_hash: &PasswordHashString,
    ) -> Result<bool, anyhow::Error> {
        match password_hash.as_str().strip_prefix("plain:") {
            Some(stored) => Ok(stored == password.as_str()),
            None => anyhow::bail!("not a test hash"),
        }
    }
}

/// `PlainHasher` that counts how often each side of the trait is used.
#[derive(Default)]
pub struct CountingHasher {
    hashes: AtomicUsize,
    verifies: AtomicUsize,
}

impl CountingHasher {
    pub fn hashes(&self) -> usize {
        self.hashes.load(Ordering::SeqCst)
    }

    pub fn verifies(&self) -> usize {
        self.verifies.load(Ordering::SeqCst)
    }
}

impl CredentialHasher for CountingHasher {
    fn hash(&self, password: &Password) -> Result<PasswordHashString, anyhow::Error> {
        self.hashes.fetch_add(1, Ordering::SeqCst);
        PlainHasher.hash(password)
    }

    fn verify(
        &self,
        password: &Password,
        password_hash: &PasswordHashString,
    ) -> Result<bool, anyhow::Error> {
        self.verifies.fetch_add(1, Ordering::SeqCst);
        PlainHasher.verify(password, password_hash)
    }
}

pub fn test_config(storage_root: &Path) -> AccessConfig {
    AccessConfig {
        common: service_core::config::Config { port: 0 },
        environment: Environment::Dev,
        service_name: "access-service-test".to_string(),
        service_version: "test".to_string(),
        log_level: "error".to_string(),
        otlp_endpoint: None,
        database: DatabaseConfig {
            url: Secret::new("memory:".to_string()),
            max_connections: 1,
            min_connections: 1,
        },
        jwt: JwtConfig::development(),
        storage: StorageConfig {
            root: storage_root.to_path_buf(),
        },
        rate_limit: RateLimitConfig {
            login_attempts: 1000,
            login_window_seconds: 60,
            register_attempts: 1000,
            register_window_seconds: 60,
        },
    }
}

pub fn access_for(repos: Repositories) -> AccessService {
    let tokens = TokenService::new(&JwtConfig::development()).unwrap();
    AccessService::new(repos, Arc::new(PlainHasher), tokens)
}

/// Router over an in-memory store and a scratch storage root.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub storage: tempfile::TempDir,
}

impl TestApp {
    pub fn spawn() -> Self {
        Self::spawn_with(|_| {})
    }

    pub fn spawn_with(customize: impl FnOnce(&mut AccessConfig)) -> Self {
        let storage = tempfile::tempdir().unwrap();
        let mut config = test_config(storage.path());
        customize(&mut config);

        let state =
            AppState::with_hasher(config, Repositories::in_memory(), Arc::new(PlainHasher))
                .unwrap();
        let router = build_router(state.clone());

        Self {
            router,
            state,
            storage,
        }
    }

    pub async fn send(&self, req: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = self.router.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, body)
    }

    pub async fn raw(&self, req: Request<Body>) -> axum::response::Response {
        self.router.clone().oneshot(req).await.unwrap()
    }

    pub async fn register(&self, username: &str, password: &str) -> StatusCode {
        let (status, _) = self
            .send(json_request(
                "POST",
                "/register",
                serde_json::json!({ "username": username, "password": password }),
            ))
            .await;
        status
    }

    pub async fn login(&self, username: &str, password: &str) -> String {
        let (status, body) = self
            .send(json_request(
                "POST",
                "/login",
                serde_json::json!({ "username": username, "password": password }),
            ))
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {body}");
        body["token"].as_str().unwrap().to_string()
    }

    /// Register and log in, returning a bearer token.
    pub async fn user(&self, username: &str) -> String {
        let password = format!("{username}-password");
        assert_eq!(self.register(username, &password).await, StatusCode::CREATED);
        self.login(username, &password).await
    }

    pub fn write_file(&self, owner: &str, name: &str, contents: &[u8]) {
        let dir = self.storage.path().join(owner);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(name), contents).unwrap();
    }
}

pub fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn authed(method: &str, uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("Authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

/// In-memory repository that counts every storage call.
#[derive(Default)]
pub struct CountingRepository {
    inner: InMemoryRepository,
    calls: AtomicUsize,
}

impl CountingRepository {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn tick(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl IdentityRepository for CountingRepository {
    async fn insert_identity(&self, identity: &Identity) -> Result<(), ServiceError> {
        self.tick();
        self.inner.insert_identity(identity).await
    }

    async fn find_identity_by_id(&self, id: &str) -> Result<Option<Identity>, ServiceError> {
        self.tick();
        self.inner.find_identity_by_id(id).await
    }

    async fn find_identity_by_username(
        &self,
        username: &str,
    ) -> Result<Option<Identity>, ServiceError> {
        self.tick();
        self.inner.find_identity_by_username(username).await
    }

    async fn update_identity(&self, identity: &Identity) -> Result<bool, ServiceError> {
        self.tick();
        self.inner.update_identity(identity).await
    }

    async fn delete_identity(&self, id: &str) -> Result<bool, ServiceError> {
        self.tick();
        self.inner.delete_identity(id).await
    }
}

#[async_trait]
impl TrustRepository for CountingRepository {
    async fn insert_edge(&self, owner_id: &str, reader_id: &str) -> Result<bool, ServiceError> {
        self.tick();
        self.inner.insert_edge(owner_id, reader_id).await
    }

    async fn delete_edge(&self, owner_id: &str, reader_id: &str) -> Result<bool, ServiceError> {
        self.tick();
        self.inner.delete_edge(owner_id, reader_id).await
    }

    async fn edge_exists(&self, owner_id: &str, reader_id: &str) -> Result<bool, ServiceError> {
        self.tick();
        self.inner.edge_exists(owner_id, reader_id).await
    }

    async fn readers_of(&self, owner_id: &str) -> Result<BTreeSet<String>, ServiceError> {
        self.tick();
        self.inner.readers_of(owner_id).await
    }

    async fn owners_trusting(&self, reader_id: &str) -> Result<BTreeSet<String>, ServiceError> {
        self.tick();
        self.inner.owners_trusting(reader_id).await
    }
}

/// Repository whose every call fails, for storage-fault shaping.
pub struct BrokenRepository;

fn fault() -> ServiceError {
    ServiceError::Storage(anyhow::anyhow!("connection reset by peer"))
}

#[async_trait]
impl IdentityRepository for BrokenRepository {
    async fn insert_identity(&self, _: &Identity) -> Result<(), ServiceError> {
        Err(fault())
    }
    async fn find_identity_by_id(&self, _: &str) -> Result<Option<Identity>, ServiceError> {
        Err(fault())
    }
    async fn find_identity_by_username(&self, _: &str) -> Result<Option<Identity>, ServiceError> {
        Err(fault())
    }
    async fn update_identity(&self, _: &Identity) -> Result<bool, ServiceError> {
        Err(fault())
    }
    async fn delete_identity(&self, _: &str) -> Result<bool, ServiceError> {
        Err(fault())
    }
}

#[async_trait]
impl TrustRepository for BrokenRepository {
    async fn insert_edge(&self, _: &str, _: &str) -> Result<bool, ServiceError> {
        Err(fault())
    }
    async fn delete_edge(&self, _: &str, _: &str) -> Result<bool, ServiceError> {
        Err(fault())
    }
    async fn edge_exists(&self, _: &str, _: &str) -> Result<bool, ServiceError> {
        Err(fault())
    }
    async fn readers_of(&self, _: &str) -> Result<BTreeSet<String>, ServiceError> {
        Err(fault())
    }
    async fn owners_trusting(&self, _: &str) -> Result<BTreeSet<String>, ServiceError> {
        Err(fault())
    }
}
