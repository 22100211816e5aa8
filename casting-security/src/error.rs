use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use casting_core::{error_response, HttpError};

/// Which part of a token's claims was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimsFault {
    /// Issuer or audience does not match the configured provider/API.
    IssuerOrAudience,
    /// The header declares an algorithm outside the allow-list.
    Algorithm,
    /// A required claim is missing or has the wrong type.
    Structure,
    /// The permissions claim is absent.
    MissingPermissions,
}

/// Authentication and authorization failures.
///
/// Variants that carry a `String` hold internal detail for logs. The detail is
/// never returned to the caller; responses use [`AuthError::public_message`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// The Authorization header is missing from the request.
    MissingToken,

    /// The Authorization header is not of the form `Bearer <token>`.
    InvalidHeader,

    /// The token is not a well-formed three-segment JWT.
    MalformedToken(String),

    /// The key ID (kid) from the token header is not in the key set.
    UnknownKeyId(String),

    /// The signature does not match the resolved key.
    InvalidSignature,

    /// The token has expired.
    Expired,

    /// The token verified but its claims (or declared algorithm) are unacceptable.
    InvalidClaims { fault: ClaimsFault, detail: String },

    /// The token is valid but does not grant the required permission.
    PermissionDenied(String),

    /// The key set could not be fetched and no usable cached set exists.
    KeyFetchFailure(String),
}

impl AuthError {
    pub fn invalid_claims(fault: ClaimsFault, detail: impl Into<String>) -> Self {
        AuthError::InvalidClaims {
            fault,
            detail: detail.into(),
        }
    }

    /// Stable machine-readable tag for this failure.
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::MissingToken => "missing_token",
            AuthError::InvalidHeader => "invalid_header",
            AuthError::MalformedToken(_) => "malformed_token",
            AuthError::UnknownKeyId(_) => "unknown_key_id",
            AuthError::InvalidSignature => "invalid_signature",
            AuthError::Expired => "token_expired",
            AuthError::InvalidClaims { .. } => "invalid_claims",
            AuthError::PermissionDenied(_) => "permission_denied",
            AuthError::KeyFetchFailure(_) => "key_fetch_failure",
        }
    }

    /// 403 for authorization failures, 401 for everything else.
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::PermissionDenied(_) => StatusCode::FORBIDDEN,
            _ => StatusCode::UNAUTHORIZED,
        }
    }

    /// Message safe to return to the caller.
    pub fn public_message(&self) -> &'static str {
        match self {
            AuthError::MissingToken => "Authorization header is expected.",
            AuthError::InvalidHeader => "Authorization header must be a bearer token.",
            AuthError::MalformedToken(_) => "Unable to parse authentication token.",
            AuthError::UnknownKeyId(_) => "Unable to find the appropriate key.",
            AuthError::InvalidSignature => "Token signature is invalid.",
            AuthError::Expired => "Token expired.",
            AuthError::InvalidClaims { fault, .. } => match fault {
                ClaimsFault::IssuerOrAudience => {
                    "Incorrect claims. Please, check the audience and issuer."
                }
                ClaimsFault::Algorithm => "Token algorithm is not allowed.",
                ClaimsFault::Structure => "Token claims are malformed.",
                ClaimsFault::MissingPermissions => "Permissions not included in JWT.",
            },
            AuthError::PermissionDenied(_) => "Permission not found.",
            AuthError::KeyFetchFailure(_) => "Unable to fetch signing keys.",
        }
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::MissingToken => write!(f, "Missing Authorization header"),
            AuthError::InvalidHeader => write!(f, "Invalid authorization header"),
            AuthError::MalformedToken(msg) => write!(f, "Malformed token: {msg}"),
            AuthError::UnknownKeyId(kid) => write!(f, "Unknown signing key: {kid}"),
            AuthError::InvalidSignature => write!(f, "Invalid token signature"),
            AuthError::Expired => write!(f, "Token expired"),
            AuthError::InvalidClaims { detail, .. } => write!(f, "Invalid claims: {detail}"),
            AuthError::PermissionDenied(perm) => write!(f, "Permission denied: {perm}"),
            AuthError::KeyFetchFailure(msg) => write!(f, "JWKS fetch error: {msg}"),
        }
    }
}

impl std::error::Error for AuthError {}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        error_response(self.status(), self.public_message())
    }
}

impl From<AuthError> for HttpError {
    fn from(err: AuthError) -> Self {
        let message = err.public_message().to_string();
        match err {
            AuthError::PermissionDenied(_) => HttpError::Forbidden(message),
            _ => HttpError::Unauthorized(message),
        }
    }
}
