use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use tracing::warn;

use crate::claims::ClaimSet;
use crate::error::AuthError;

/// Extract a Bearer token from an Authorization header value.
///
/// `None` is `MissingToken`; anything other than `Bearer <token>` (scheme
/// compared case-insensitively, exactly one token) is `InvalidHeader`.
pub fn extract_bearer_token(header_value: Option<&str>) -> Result<&str, AuthError> {
    let header_value = header_value.ok_or(AuthError::MissingToken)?;
    let mut parts = header_value.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(token), None) if scheme.eq_ignore_ascii_case("Bearer") => Ok(token),
        _ => Err(AuthError::InvalidHeader),
    }
}

/// Read the Authorization header value from request headers.
///
/// A header that is not valid visible ASCII is `InvalidHeader`.
pub fn authorization_header(headers: &HeaderMap) -> Result<Option<&str>, AuthError> {
    headers
        .get(AUTHORIZATION)
        .map(|value| value.to_str().map_err(|_| AuthError::InvalidHeader))
        .transpose()
}

/// Handler extractor for the claims validated by [`crate::require_permission`].
///
/// Fails with `MissingToken` when the route is not behind the permission
/// layer, so an unguarded handler cannot run as if it were authorized.
///
/// # Example
///
/// ```ignore
/// async fn list_actors(Claims(claims): Claims) -> Json<Vec<Actor>> {
///     tracing::info!(sub = %claims.subject(), "listing actors");
///     ...
/// }
/// ```
#[derive(Clone, Debug)]
pub struct Claims(pub ClaimSet);

impl<S> FromRequestParts<S> for Claims
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<ClaimSet>()
            .cloned()
            .map(Claims)
            .ok_or_else(|| {
                warn!(uri = %parts.uri, "Claims requested on a route without a permission layer");
                AuthError::MissingToken
            })
    }
}
