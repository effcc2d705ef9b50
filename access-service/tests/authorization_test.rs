//! Authorization decisions, trust management and error shaping through `AccessService`.

mod common;

use access_service::{
    db::Repositories,
    repo::SqliteRepository,
    services::{
        AccessDecision, AccessService, AuthFailure, AuthorizationEngine, ServiceError,
        TokenRejection,
    },
    utils::Password,
};
use access_service::{config::JwtConfig, services::TokenService};
use common::{access_for, BrokenRepository, CountingHasher, CountingRepository};
use service_core::error::AppError;
use std::sync::Arc;

async fn with_users(repos: Repositories, names: &[&str]) -> AccessService {
    let service = access_for(repos);
    for name in names {
        service
            .register(name, &Password::new(format!("{name}-pw")))
            .await
            .unwrap();
    }
    service
}

fn engine(service: &AccessService) -> AuthorizationEngine {
    AuthorizationEngine::new(service.directory().clone(), service.trust().clone())
}

#[tokio::test]
async fn test_trust_decision_table() {
    let service = with_users(Repositories::in_memory(), &["owner", "reader", "other"]).await;
    let engine = engine(&service);

    // No edge at all.
    assert_eq!(
        engine.can_read("reader", "owner").await.unwrap(),
        AccessDecision::Deny
    );

    // Reversed edge: reader trusts owner, which grants nothing to reader.
    service.grant_trust("reader", "owner").await.unwrap();
    assert_eq!(
        engine.can_read("reader", "owner").await.unwrap(),
        AccessDecision::Deny
    );
    assert_eq!(
        engine.can_read("owner", "reader").await.unwrap(),
        AccessDecision::Allow
    );

    // Owner trusts reader.
    service.grant_trust("owner", "reader").await.unwrap();
    assert_eq!(
        engine.can_read("reader", "owner").await.unwrap(),
        AccessDecision::Allow
    );

    // Trust is not transitive and not shared with third parties.
    assert_eq!(
        engine.can_read("other", "owner").await.unwrap(),
        AccessDecision::Deny
    );
}

#[tokio::test]
async fn test_missing_owner_and_missing_requester_look_the_same() {
    let service = with_users(Repositories::in_memory(), &["alice"]).await;
    let engine = engine(&service);

    let missing_owner = engine.can_read("alice", "ghost").await.unwrap_err();
    let missing_requester = engine.can_read("ghost", "alice").await.unwrap_err();

    assert!(matches!(missing_owner, ServiceError::NotFound(_)));
    assert!(matches!(missing_requester, ServiceError::NotFound(_)));

    let outward = |e: ServiceError| e.into_access_error().to_string();
    assert_eq!(outward(missing_owner), outward(missing_requester));
}

#[tokio::test]
async fn test_storage_fault_looks_like_missing_user() {
    let broken = access_for(Repositories::new(Arc::new(BrokenRepository)));
    let fault = broken.authorize_requester("alice", "bob").await.unwrap_err();
    assert!(matches!(fault, ServiceError::Storage(_)));

    let healthy = with_users(Repositories::in_memory(), &["alice"]).await;
    let missing = healthy.authorize_requester("alice", "bob").await.unwrap_err();

    let fault = fault.into_access_error();
    let missing = missing.into_access_error();
    assert!(matches!(fault, AppError::NotFound(_)));
    assert_eq!(fault.to_string(), missing.to_string());
}

#[tokio::test]
async fn test_self_access_makes_no_store_calls() {
    let counting = Arc::new(CountingRepository::default());
    let service = access_for(Repositories::new(counting.clone()));
    let engine = engine(&service);

    // Not even registered: self-access never consults the stores.
    assert_eq!(engine.can_read("alice", "alice").await.unwrap(), AccessDecision::Allow);
    assert_eq!(engine.can_read("alice", "").await.unwrap(), AccessDecision::Allow);
    assert_eq!(counting.calls(), 0);

    let token = service.tokens().issue("alice").unwrap().token;
    assert_eq!(service.authorize(&token, "").await.unwrap(), "alice");
    assert_eq!(service.authorize(&token, "alice").await.unwrap(), "alice");
    assert_eq!(counting.calls(), 0);
}

#[tokio::test]
async fn test_alice_bob_scenario() {
    let service = with_users(Repositories::in_memory(), &["alice", "bob"]).await;
    let bob_token = service.tokens().issue("bob").unwrap().token;

    service.grant_trust("alice", "bob").await.unwrap();
    assert_eq!(service.authorize(&bob_token, "alice").await.unwrap(), "bob");

    service.revoke_trust("alice", "bob").await.unwrap();
    assert!(matches!(
        service.authorize(&bob_token, "alice").await,
        Err(ServiceError::Forbidden(_))
    ));
}

#[tokio::test]
async fn test_alice_bob_scenario_on_sqlite() {
    let repos = Repositories::new(Arc::new(SqliteRepository::in_memory().await.unwrap()));
    let service = with_users(repos, &["alice", "bob"]).await;
    let engine = engine(&service);

    service.grant_trust("alice", "bob").await.unwrap();
    assert_eq!(engine.can_read("bob", "alice").await.unwrap(), AccessDecision::Allow);

    service.revoke_trust("alice", "bob").await.unwrap();
    assert_eq!(engine.can_read("bob", "alice").await.unwrap(), AccessDecision::Deny);
}

#[tokio::test]
async fn test_authorize_rejects_bad_tokens_before_deciding() {
    let counting = Arc::new(CountingRepository::default());
    let service = access_for(Repositories::new(counting.clone()));

    let err = service.authorize("not-a-token", "alice").await.unwrap_err();
    assert!(matches!(
        err,
        ServiceError::AuthenticationFailed(AuthFailure::Token(TokenRejection::Malformed))
    ));
    assert_eq!(counting.calls(), 0);
}

#[tokio::test]
async fn test_unknown_user_and_wrong_password_both_run_one_credential_check() {
    let hasher = Arc::new(CountingHasher::default());
    let tokens = TokenService::new(&JwtConfig::development()).unwrap();
    let service = AccessService::new(Repositories::in_memory(), hasher.clone(), tokens);
    service
        .register("alice", &Password::new("alice-pw"))
        .await
        .unwrap();
    let hashes_after_register = hasher.hashes();

    service
        .authenticate("nobody", &Password::new("alice-pw"))
        .await
        .unwrap_err();
    assert_eq!(hasher.verifies(), 1);

    service
        .authenticate("alice", &Password::new("nope"))
        .await
        .unwrap_err();
    assert_eq!(hasher.verifies(), 2);

    // The placeholder hash is computed once and reused.
    service
        .authenticate("ghost", &Password::new("whatever"))
        .await
        .unwrap_err();
    assert_eq!(hasher.verifies(), 3);
    assert_eq!(hasher.hashes(), hashes_after_register + 1);
}

#[tokio::test]
async fn test_authenticate_hides_which_part_was_wrong() {
    let service = with_users(Repositories::in_memory(), &["alice"]).await;

    let unknown = service
        .authenticate("nobody", &Password::new("alice-pw"))
        .await
        .unwrap_err();
    let wrong = service
        .authenticate("alice", &Password::new("nope"))
        .await
        .unwrap_err();

    for err in [unknown, wrong] {
        assert!(matches!(
            err,
            ServiceError::AuthenticationFailed(AuthFailure::BadCredentials)
        ));
    }

    let issued = service
        .authenticate("alice", &Password::new("alice-pw"))
        .await
        .unwrap();
    assert_eq!(issued.token_type, "Bearer");
    assert_eq!(service.tokens().verify(&issued.token).unwrap().username, "alice");
}

#[tokio::test]
async fn test_duplicate_grant_is_conflict() {
    let service = with_users(Repositories::in_memory(), &["alice", "bob"]).await;

    service.grant_trust("alice", "bob").await.unwrap();
    assert!(matches!(
        service.grant_trust("alice", "bob").await,
        Err(ServiceError::Conflict(_))
    ));
}

#[tokio::test]
async fn test_revoking_absent_edge_is_not_found() {
    let service = with_users(Repositories::in_memory(), &["alice", "bob"]).await;

    assert!(matches!(
        service.revoke_trust("alice", "bob").await,
        Err(ServiceError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_trust_store_input_checks() {
    let service = with_users(Repositories::in_memory(), &["alice"]).await;
    let trust = service.trust();

    assert!(matches!(trust.create_edge("", "x").await, Err(ServiceError::InvalidInput(_))));
    assert!(matches!(trust.create_edge("x", "").await, Err(ServiceError::InvalidInput(_))));
    assert!(matches!(trust.edge_exists("", "x").await, Err(ServiceError::InvalidInput(_))));
    assert!(matches!(trust.edge_exists("x", "").await, Err(ServiceError::InvalidInput(_))));
    assert!(matches!(
        service.grant_trust("alice", "alice").await,
        Err(ServiceError::InvalidInput(_))
    ));
}

#[tokio::test]
async fn test_trust_listings_by_username() {
    let service = with_users(Repositories::in_memory(), &["alice", "bob", "carol"]).await;

    assert!(service.trusted_by("alice").await.unwrap().is_empty());
    assert!(service.trusters_of("alice").await.unwrap().is_empty());

    service.grant_trust("alice", "bob").await.unwrap();
    service.grant_trust("alice", "carol").await.unwrap();
    service.grant_trust("carol", "bob").await.unwrap();

    assert_eq!(
        service.trusted_by("alice").await.unwrap().into_iter().collect::<Vec<_>>(),
        vec!["bob", "carol"]
    );
    assert_eq!(
        service.trusters_of("bob").await.unwrap().into_iter().collect::<Vec<_>>(),
        vec!["alice", "carol"]
    );
}

#[tokio::test]
async fn test_deleted_identity_loses_access_immediately() {
    let service = with_users(Repositories::in_memory(), &["alice", "bob"]).await;
    let engine = engine(&service);
    service.grant_trust("alice", "bob").await.unwrap();

    let bob = service.directory().get_by_username("bob").await.unwrap();
    service.directory().delete(&bob.id).await.unwrap();

    assert!(matches!(
        engine.can_read("bob", "alice").await,
        Err(ServiceError::NotFound(_))
    ));
    assert!(service.trusted_by("alice").await.unwrap().is_empty());
}
