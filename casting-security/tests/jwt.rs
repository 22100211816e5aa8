use std::sync::Arc;

use casting_security::{AuthError, ClaimsFault, JwksCache, JwtValidator, SecurityConfig};
use casting_test::{JwksServer, TestJwt, TEST_AUDIENCE, TEST_SUBJECT};
use serde_json::json;

struct Fixture {
    server: JwksServer,
    jwt: TestJwt,
    validator: JwtValidator,
}

async fn fixture() -> Fixture {
    let server = JwksServer::start(json!({ "keys": [] })).await;
    let jwt = TestJwt::new("key-1", &server.issuer());
    server.set_jwks(jwt.jwks());

    let config = SecurityConfig::new(server.url(), server.issuer(), TEST_AUDIENCE);
    let cache = Arc::new(JwksCache::new(config.clone()).unwrap());
    Fixture {
        server,
        jwt,
        validator: JwtValidator::new(cache, config),
    }
}

fn assert_fault(result: Result<impl std::fmt::Debug, AuthError>, expected: ClaimsFault) {
    match result {
        Err(AuthError::InvalidClaims { fault, .. }) => assert_eq!(fault, expected),
        other => panic!("expected InvalidClaims({expected:?}), got {other:?}"),
    }
}

#[tokio::test]
async fn valid_token_yields_claims() {
    let f = fixture().await;
    let token = f.jwt.token_with(&["get:movies", "get:actors"]);

    let claims = f.validator.verify(&token).await.unwrap();
    assert_eq!(claims.subject(), TEST_SUBJECT);
    assert_eq!(claims.issuer(), f.server.issuer());
    assert!(claims.audience().contains(TEST_AUDIENCE));
    assert!(claims.has_permission("get:movies"));
    assert!(claims.has_permission("get:actors"));
    assert!(!claims.has_permission("post:movies"));
    assert!(claims.expires_at() > chrono::Utc::now());
}

#[tokio::test]
async fn verify_header_requires_bearer_scheme() {
    let f = fixture().await;
    let token = f.jwt.token_with(&[]);

    assert_eq!(f.validator.verify_header(None).await.unwrap_err(), AuthError::MissingToken);
    assert_eq!(
        f.validator.verify_header(Some(&format!("Basic {token}"))).await.unwrap_err(),
        AuthError::InvalidHeader
    );
    assert_eq!(
        f.validator.verify_header(Some("Bearer")).await.unwrap_err(),
        AuthError::InvalidHeader
    );
    assert!(f.validator.verify_header(Some(&format!("bearer {token}"))).await.is_ok());
}

#[tokio::test]
async fn expired_token_is_rejected() {
    let f = fixture().await;
    let token = f.jwt.token().expires_in(-3600).sign();
    assert_eq!(f.validator.verify(&token).await.unwrap_err(), AuthError::Expired);
}

#[tokio::test]
async fn token_signed_by_another_key_has_invalid_signature() {
    let f = fixture().await;
    let forger = TestJwt::other_key("key-1", &f.server.issuer());
    let token = forger.token_with(&["get:movies"]);
    assert_eq!(f.validator.verify(&token).await.unwrap_err(), AuthError::InvalidSignature);
}

#[tokio::test]
async fn expired_token_with_bad_signature_is_expired() {
    let f = fixture().await;
    let forger = TestJwt::other_key("key-1", &f.server.issuer());
    let token = forger.token().expires_in(-3600).sign();
    assert_eq!(f.validator.verify(&token).await.unwrap_err(), AuthError::Expired);
}

#[tokio::test]
async fn expired_token_with_unknown_kid_skips_key_fetch() {
    let f = fixture().await;
    let token = f.jwt.token().kid("retired-key").expires_in(-3600).sign();
    assert_eq!(f.validator.verify(&token).await.unwrap_err(), AuthError::Expired);
    assert_eq!(f.server.hits(), 0);
}

#[tokio::test]
async fn wrong_issuer_is_invalid_claims() {
    let f = fixture().await;
    let token = f.jwt.token().issuer("https://someone-else.example/").sign();
    let result = f.validator.verify(&token).await;
    assert_eq!(
        result.as_ref().unwrap_err().public_message(),
        "Incorrect claims. Please, check the audience and issuer."
    );
    assert_fault(result, ClaimsFault::IssuerOrAudience);
}

#[tokio::test]
async fn wrong_audience_is_invalid_claims() {
    let f = fixture().await;
    let token = f.jwt.token().audience("another-api").sign();
    assert_fault(f.validator.verify(&token).await, ClaimsFault::IssuerOrAudience);
}

#[tokio::test]
async fn audience_list_containing_api_is_accepted() {
    let f = fixture().await;
    let token = f
        .jwt
        .token()
        .audience(vec!["https://tenant.example/userinfo", TEST_AUDIENCE])
        .sign();
    let claims = f.validator.verify(&token).await.unwrap();
    assert_eq!(claims.audience().iter().count(), 2);
}

#[tokio::test]
async fn disallowed_algorithm_is_rejected_before_key_lookup() {
    let f = fixture().await;
    let token = f.jwt.token().sign_hs256(b"shared-secret");

    let result = f.validator.verify(&token).await;
    assert_eq!(result.as_ref().unwrap_err().public_message(), "Token algorithm is not allowed.");
    assert_fault(result, ClaimsFault::Algorithm);
    assert_eq!(f.server.hits(), 0);
}

#[tokio::test]
async fn alg_none_is_an_algorithm_fault() {
    let f = fixture().await;
    for alg in ["none", "NONE"] {
        let token = f.jwt.token().permissions(&["get:movies"]).unsigned(alg);
        let result = f.validator.verify(&token).await;
        assert_eq!(result.as_ref().unwrap_err().public_message(), "Token algorithm is not allowed.");
        assert_fault(result, ClaimsFault::Algorithm);
    }
    assert_eq!(f.server.hits(), 0);
}

#[tokio::test]
async fn empty_allow_list_rejects_everything() {
    let f = fixture().await;
    let mut config = f.validator.config().clone();
    config.allowed_algorithms.clear();
    let validator = JwtValidator::new(f.validator.jwks().clone(), config);

    let token = f.jwt.token_with(&["get:movies"]);
    assert_fault(validator.verify(&token).await, ClaimsFault::Algorithm);
}

#[tokio::test]
async fn malformed_tokens_are_rejected() {
    let f = fixture().await;
    for token in ["", "abc", "abc.def", "a..c", "not-base64!.payload.sig", "a.b.c.d"] {
        let err = f.validator.verify(token).await.unwrap_err();
        assert_eq!(err.kind(), "malformed_token", "token {token:?} gave {err:?}");
    }
    assert_eq!(f.server.hits(), 0);
}

#[tokio::test]
async fn missing_kid_is_malformed() {
    let f = fixture().await;
    let token = f.jwt.token().without_kid().sign();
    assert!(matches!(
        f.validator.verify(&token).await,
        Err(AuthError::MalformedToken(_))
    ));
}

#[tokio::test]
async fn unknown_kid_fails_after_one_refresh() {
    let f = fixture().await;
    let token = f.jwt.token().kid("rotated-away").sign();

    let err = f.validator.verify(&token).await.unwrap_err();
    assert_eq!(err, AuthError::UnknownKeyId("rotated-away".into()));
    assert_eq!(err.public_message(), "Unable to find the appropriate key.");
    assert_eq!(f.server.hits(), 1);

    // A second miss within the refresh interval does not hit the provider again.
    let _ = f.validator.verify(&token).await;
    assert_eq!(f.server.hits(), 1);
}

#[tokio::test]
async fn missing_subject_is_structural_fault() {
    let f = fixture().await;
    let token = f.jwt.token().without("sub").sign();
    assert_fault(f.validator.verify(&token).await, ClaimsFault::Structure);
}

#[tokio::test]
async fn mistyped_permissions_is_structural_fault() {
    let f = fixture().await;
    let token = f.jwt.token().claim("permissions", "get:movies").sign();
    assert_fault(f.validator.verify(&token).await, ClaimsFault::Structure);
}

#[tokio::test]
async fn not_yet_valid_token_is_rejected() {
    let f = fixture().await;
    let nbf = chrono::Utc::now().timestamp() + 3600;
    let token = f.jwt.token().claim("nbf", nbf).sign();
    assert_fault(f.validator.verify(&token).await, ClaimsFault::Structure);
}

#[tokio::test]
async fn keys_are_fetched_once_for_many_tokens() {
    let f = fixture().await;
    for _ in 0..5 {
        let token = f.jwt.token_with(&["get:actors"]);
        f.validator.verify(&token).await.unwrap();
    }
    assert_eq!(f.server.hits(), 1);
}
