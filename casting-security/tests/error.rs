use axum::http::StatusCode;
use axum::response::IntoResponse;
use casting_core::HttpError;
use casting_security::{AuthError, ClaimsFault};
use http_body_util::BodyExt;

async fn error_parts(err: AuthError) -> (StatusCode, serde_json::Value) {
    let resp = err.into_response();
    let status = resp.status();
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&body).unwrap())
}

fn all_variants() -> Vec<AuthError> {
    vec![
        AuthError::MissingToken,
        AuthError::InvalidHeader,
        AuthError::MalformedToken("bad base64".into()),
        AuthError::UnknownKeyId("kid-123".into()),
        AuthError::InvalidSignature,
        AuthError::Expired,
        AuthError::invalid_claims(ClaimsFault::IssuerOrAudience, "Invalid issuer"),
        AuthError::invalid_claims(ClaimsFault::Algorithm, "HS256"),
        AuthError::invalid_claims(ClaimsFault::Structure, "missing sub"),
        AuthError::invalid_claims(ClaimsFault::MissingPermissions, "no permissions"),
        AuthError::PermissionDenied("delete:movies".into()),
        AuthError::KeyFetchFailure("connection refused".into()),
    ]
}

#[tokio::test]
async fn every_failure_uses_uniform_body() {
    for err in all_variants() {
        let message = err.public_message();
        let expected_status = err.status();
        let (status, body) = error_parts(err).await;
        assert_eq!(status, expected_status);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], status.as_u16());
        assert_eq!(body["message"], message);
        assert_eq!(body.as_object().unwrap().len(), 3);
    }
}

#[test]
fn only_permission_denied_is_forbidden() {
    for err in all_variants() {
        let expected = if matches!(err, AuthError::PermissionDenied(_)) {
            StatusCode::FORBIDDEN
        } else {
            StatusCode::UNAUTHORIZED
        };
        assert_eq!(err.status(), expected, "{err:?}");
    }
}

#[tokio::test]
async fn public_messages() {
    let cases = [
        (AuthError::MissingToken, "Authorization header is expected."),
        (AuthError::Expired, "Token expired."),
        (AuthError::UnknownKeyId("k".into()), "Unable to find the appropriate key."),
        (
            AuthError::invalid_claims(ClaimsFault::IssuerOrAudience, "x"),
            "Incorrect claims. Please, check the audience and issuer.",
        ),
        (
            AuthError::invalid_claims(ClaimsFault::MissingPermissions, "x"),
            "Permissions not included in JWT.",
        ),
        (AuthError::PermissionDenied("get:movies".into()), "Permission not found."),
    ];
    for (err, expected) in cases {
        let (_, body) = error_parts(err).await;
        assert_eq!(body["message"], expected);
    }
}

#[tokio::test]
async fn internal_detail_is_not_exposed() {
    let err = AuthError::KeyFetchFailure("connection refused to 10.0.0.7".into());
    assert!(err.to_string().contains("10.0.0.7"));
    let (_, body) = error_parts(err).await;
    assert!(!body.to_string().contains("10.0.0.7"));

    let err = AuthError::PermissionDenied("delete:movies".into());
    assert!(err.to_string().contains("delete:movies"));
    let (_, body) = error_parts(err).await;
    assert!(!body.to_string().contains("delete:movies"));
}

#[test]
fn kinds_are_distinct() {
    let mut kinds: Vec<_> = all_variants().iter().map(AuthError::kind).collect();
    kinds.dedup();
    assert_eq!(kinds.len(), 9);
}

#[test]
fn converts_to_http_error() {
    let forbidden: HttpError = AuthError::PermissionDenied("get:actors".into()).into();
    assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);
    assert_eq!(forbidden.message(), "Permission not found.");

    let unauthorized: HttpError = AuthError::Expired.into();
    assert_eq!(unauthorized.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(unauthorized.message(), "Token expired.");
}
