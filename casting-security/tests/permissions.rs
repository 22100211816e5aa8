use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::http::StatusCode;
use casting_security::{
    check_permission, AuthError, Authorizer, ClaimsFault, JwksCache, JwtValidator,
    PermissionsClaim, RequiredPermission, SecurityConfig,
};
use casting_test::{JwksServer, TestJwt, TEST_AUDIENCE, TEST_SUBJECT};
use serde_json::json;

async fn authorizer_with(claim: PermissionsClaim) -> (JwksServer, TestJwt, Authorizer) {
    let server = JwksServer::start(json!({ "keys": [] })).await;
    let jwt = TestJwt::new("key-1", &server.issuer());
    server.set_jwks(jwt.jwks());

    let config = SecurityConfig::new(server.url(), server.issuer(), TEST_AUDIENCE)
        .with_permissions_claim(claim);
    let cache = Arc::new(JwksCache::new(config.clone()).unwrap());
    let authorizer = Authorizer::new(Arc::new(JwtValidator::new(cache, config)));
    (server, jwt, authorizer)
}

fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

#[tokio::test]
async fn granted_permission_passes() {
    let (_server, jwt, authorizer) = authorizer_with(PermissionsClaim::Permissions).await;
    let header = bearer(&jwt.token_with(&["get:movies"]));

    let claims = authorizer
        .authorize(Some(&header), RequiredPermission::GET_MOVIES)
        .await
        .unwrap();
    assert_eq!(claims.subject(), TEST_SUBJECT);
}

#[tokio::test]
async fn empty_permissions_is_forbidden() {
    let (_server, jwt, authorizer) = authorizer_with(PermissionsClaim::Permissions).await;
    let header = bearer(&jwt.token_with(&[]));

    let err = authorizer
        .authorize(Some(&header), RequiredPermission::DELETE_ACTORS)
        .await
        .unwrap_err();
    assert_eq!(err, AuthError::PermissionDenied("delete:actors".into()));
    assert_eq!(err.status(), StatusCode::FORBIDDEN);
    assert_eq!(err.public_message(), "Permission not found.");
}

#[tokio::test]
async fn missing_permissions_claim_is_unauthorized() {
    let (_server, jwt, authorizer) = authorizer_with(PermissionsClaim::Permissions).await;
    let header = bearer(&jwt.token().without_permissions().sign());

    let err = authorizer
        .authorize(Some(&header), RequiredPermission::GET_ACTORS)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AuthError::InvalidClaims { fault: ClaimsFault::MissingPermissions, .. }
    ));
    assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(err.public_message(), "Permissions not included in JWT.");
}

#[tokio::test]
async fn permissions_match_exactly() {
    let (_server, jwt, authorizer) = authorizer_with(PermissionsClaim::Permissions).await;
    for granted in ["get:movie", "GET:MOVIES", "get:movies:all", "get:*"] {
        let header = bearer(&jwt.token_with(&[granted]));
        let err = authorizer
            .authorize(Some(&header), RequiredPermission::GET_MOVIES)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "permission_denied", "{granted} must not grant get:movies");
    }
}

#[tokio::test]
async fn scope_claim_can_carry_permissions() {
    let (_server, jwt, authorizer) = authorizer_with(PermissionsClaim::Scope).await;
    let token = jwt
        .token()
        .without_permissions()
        .claim("scope", "openid get:movies post:movies")
        .sign();
    let header = bearer(&token);

    let claims = authorizer
        .authorize(Some(&header), RequiredPermission::POST_MOVIES)
        .await
        .unwrap();
    assert!(claims.has_permission("get:movies"));

    let err = authorizer
        .authorize(Some(&header), RequiredPermission::DELETE_MOVIES)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "permission_denied");
}

#[tokio::test]
async fn check_permission_on_verified_claims() {
    let (_server, jwt, authorizer) = authorizer_with(PermissionsClaim::Permissions).await;
    let token = jwt.token_with(&["patch:actors", "patch:movies"]);
    let claims = authorizer.validator().verify(&token).await.unwrap();

    assert!(check_permission(&claims, RequiredPermission::PATCH_ACTORS).is_ok());
    assert!(check_permission(&claims, RequiredPermission::PATCH_MOVIES).is_ok());
    assert!(check_permission(&claims, RequiredPermission::new("post:actors")).is_err());
}

#[tokio::test]
async fn guard_skips_operation_on_failure() {
    let (_server, jwt, authorizer) = authorizer_with(PermissionsClaim::Permissions).await;
    let counter = AtomicUsize::new(0);
    let calls = &counter;

    let denied = bearer(&jwt.token_with(&["get:actors"]));
    let result = authorizer
        .guard(Some(&denied), RequiredPermission::DELETE_MOVIES, |_claims| async move {
            calls.fetch_add(1, Ordering::SeqCst);
        })
        .await;
    assert!(result.is_err());

    let result = authorizer
        .guard(None, RequiredPermission::GET_ACTORS, |_claims| async move {
            calls.fetch_add(1, Ordering::SeqCst);
        })
        .await;
    assert_eq!(result.unwrap_err(), AuthError::MissingToken);
    assert_eq!(counter.load(Ordering::SeqCst), 0);

    let allowed = bearer(&jwt.token_with(&["delete:movies"]));
    let subject = authorizer
        .guard(Some(&allowed), RequiredPermission::DELETE_MOVIES, |claims| async move {
            calls.fetch_add(1, Ordering::SeqCst);
            claims.subject().to_string()
        })
        .await
        .unwrap();
    assert_eq!(subject, TEST_SUBJECT);
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[test]
fn required_permission_displays_as_wire_string() {
    assert_eq!(RequiredPermission::GET_ACTORS.to_string(), "get:actors");
    assert_eq!(RequiredPermission::DELETE_MOVIES.as_str(), "delete:movies");
}
