pub mod config;
pub mod db;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod repo;
pub mod services;
pub mod utils;

use service_core::axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post, put},
    Router,
};
use service_core::middleware::{
    metrics::metrics_middleware,
    rate_limit::{create_ip_rate_limiter, ip_rate_limit_middleware, IpRateLimiter},
    security_headers::security_headers_middleware,
    tracing::request_id_middleware,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::config::AccessConfig;
use crate::db::Repositories;
use crate::services::{AccessService, ResourceNamespace, TokenService};
use crate::utils::{Argon2Hasher, CredentialHasher};

#[derive(Clone)]
pub struct AppState {
    pub config: AccessConfig,
    pub access: AccessService,
    pub namespace: ResourceNamespace,
    pub login_rate_limiter: IpRateLimiter,
    pub register_rate_limiter: IpRateLimiter,
}

impl AppState {
    /// Wire the services together over already-opened repositories.
    pub fn new(config: AccessConfig, repos: Repositories) -> Result<Self, anyhow::Error> {
        Self::with_hasher(config, repos, Arc::new(Argon2Hasher))
    }

    pub fn with_hasher(
        config: AccessConfig,
        repos: Repositories,
        hasher: Arc<dyn CredentialHasher>,
    ) -> Result<Self, anyhow::Error> {
        let tokens = TokenService::new(&config.jwt)?;
        let access = AccessService::new(repos, hasher, tokens);
        let namespace = ResourceNamespace::new(config.storage.root.clone());

        let login_rate_limiter = create_ip_rate_limiter(
            config.rate_limit.login_attempts,
            config.rate_limit.login_window_seconds,
        );
        let register_rate_limiter = create_ip_rate_limiter(
            config.rate_limit.register_attempts,
            config.rate_limit.register_window_seconds,
        );

        Ok(Self {
            config,
            access,
            namespace,
            login_rate_limiter,
            register_rate_limiter,
        })
    }
}

pub fn build_router(state: AppState) -> Router {
    let login_route = Router::new()
        .route("/login", post(handlers::auth::login))
        .layer(from_fn_with_state(
            state.login_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    let register_route = Router::new()
        .route("/register", post(handlers::auth::register))
        .layer(from_fn_with_state(
            state.register_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    let trust_routes = Router::new()
        .route("/trust", get(handlers::trust::list_trusted))
        .route("/trust/trusters", get(handlers::trust::list_trusters))
        .route(
            "/trust/:username",
            put(handlers::trust::grant).delete(handlers::trust::revoke),
        )
        .layer(from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ));

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/metrics", get(handlers::metrics::metrics))
        .route("/download/:filename", get(handlers::files::download_own))
        .route(
            "/download/:filename/:owner",
            get(handlers::files::download_from),
        )
        .merge(login_route)
        .merge(register_route)
        .merge(trust_routes)
        .with_state(state)
        .layer(from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &service_core::axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    path = %request.uri().path(),
                )
            },
        ))
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
}
