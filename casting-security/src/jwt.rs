use std::str::FromStr;
use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, decode_header, Algorithm, Validation};
use tracing::{debug, warn};

use crate::claims::ClaimSet;
use crate::config::SecurityConfig;
use crate::error::{AuthError, ClaimsFault};
use crate::extractor::extract_bearer_token;
use crate::jwks::JwksCache;

/// Bearer token verifier.
///
/// Resolves the signing key through the [`JwksCache`], checks the signature
/// and the standard claims, and parses the payload into a [`ClaimSet`].
/// Every step short-circuits with its own [`AuthError`]; no partially
/// populated claim set is ever returned.
///
/// # Example
///
/// ```ignore
/// let jwks = Arc::new(JwksCache::new(config.clone())?);
/// let validator = JwtValidator::new(jwks, config);
/// let claims = validator.verify_header(Some("Bearer eyJ...")).await?;
/// ```
pub struct JwtValidator {
    jwks: Arc<JwksCache>,
    config: SecurityConfig,
}

impl JwtValidator {
    /// Create a new validator backed by a JWKS cache.
    pub fn new(jwks: Arc<JwksCache>, config: SecurityConfig) -> Self {
        Self { jwks, config }
    }

    /// Returns the security configuration.
    pub fn config(&self) -> &SecurityConfig {
        &self.config
    }

    /// Returns the key cache used to resolve signing keys.
    pub fn jwks(&self) -> &Arc<JwksCache> {
        &self.jwks
    }

    /// Verify the raw value of an `Authorization` header.
    pub async fn verify_header(&self, header_value: Option<&str>) -> Result<ClaimSet, AuthError> {
        let token = extract_bearer_token(header_value)?;
        self.verify(token).await
    }

    /// Verify a compact JWT and return its claims.
    ///
    /// This performs, in order:
    /// 1. Structural check (three non-empty segments, decodable header)
    /// 2. Algorithm allow-list check, before the token's `alg` is trusted
    /// 3. Expiry check on the unverified payload, so an expired token is
    ///    reported as expired whatever its signature and never costs a fetch
    /// 4. Key retrieval by `kid`
    /// 5. Signature validation
    /// 6. Standard claims validation (exp, nbf, iss, aud)
    /// 7. Strict parsing into a [`ClaimSet`]
    pub async fn verify(&self, token: &str) -> Result<ClaimSet, AuthError> {
        if token.split('.').count() != 3 || token.split('.').any(str::is_empty) {
            return Err(AuthError::MalformedToken(
                "expected three dot-separated segments".into(),
            ));
        }

        reject_unknown_algorithm(token)?;

        let header = decode_header(token)
            .map_err(|e| AuthError::MalformedToken(format!("Failed to decode header: {e}")))?;

        let algorithm = header.alg;
        debug!(?algorithm, kid = ?header.kid, "Decoded JWT header");

        if self.config.allowed_algorithms.is_empty() {
            return Err(AuthError::invalid_claims(
                ClaimsFault::Algorithm,
                "No allowed JWT algorithms configured",
            ));
        }

        if !self.config.allowed_algorithms.contains(&algorithm) {
            warn!(?algorithm, "Rejected token with disallowed algorithm");
            return Err(AuthError::invalid_claims(
                ClaimsFault::Algorithm,
                format!("Disallowed JWT algorithm: {algorithm:?}"),
            ));
        }

        if expired_before_verification(token)? {
            debug!("Rejected expired token before key lookup");
            return Err(AuthError::Expired);
        }

        let kid = header
            .kid
            .as_deref()
            .ok_or_else(|| AuthError::MalformedToken("JWT header missing 'kid' field".into()))?;

        let key = self.jwks.get(kid).await?;

        if let Some(key_alg) = key.algorithm() {
            if key_alg != algorithm {
                return Err(AuthError::invalid_claims(
                    ClaimsFault::Algorithm,
                    format!("Key {kid} is published for {key_alg:?}, token uses {algorithm:?}"),
                ));
            }
        }

        let mut validation = Validation::new(algorithm);
        validation.algorithms = vec![algorithm];
        validation.set_issuer(&[&self.config.issuer]);
        validation.set_audience(&[&self.config.audience]);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        validation.validate_exp = true;
        validation.validate_nbf = true;

        let token_data = decode::<serde_json::Value>(token, key.decoding_key(), &validation)
            .map_err(|e| {
                let err = map_jwt_error(e.kind());
                warn!(kid = %kid, error = %err, "JWT validation failed");
                err
            })?;

        let claims = ClaimSet::from_verified(token_data.claims, self.config.permissions_claim)?;

        debug!(sub = %claims.subject(), "JWT validated");
        Ok(claims)
    }
}

fn decode_segment(segment: &str, what: &str) -> Result<serde_json::Value, AuthError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|e| AuthError::MalformedToken(format!("Failed to decode {what}: {e}")))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| AuthError::MalformedToken(format!("Failed to parse {what}: {e}")))
}

/// `alg` values outside what `jsonwebtoken` knows (`none` above all) are an
/// algorithm fault, not a parse failure.
fn reject_unknown_algorithm(token: &str) -> Result<(), AuthError> {
    let header = decode_segment(token.split('.').next().unwrap_or_default(), "header")?;
    if let Some(alg) = header.get("alg").and_then(serde_json::Value::as_str) {
        if Algorithm::from_str(alg).is_err() {
            warn!(alg, "Rejected token with unsupported algorithm");
            return Err(AuthError::invalid_claims(
                ClaimsFault::Algorithm,
                format!("Unsupported JWT algorithm: {alg}"),
            ));
        }
    }
    Ok(())
}

/// Leeway applied to `exp`, matching `Validation::default().leeway`.
const EXP_LEEWAY_SECS: i64 = 60;

/// Reads `exp` from the payload without checking the signature.
///
/// Only ever used to reject. A missing or non-numeric `exp` is left to the
/// verified decode, which reports it as a claims fault.
fn expired_before_verification(token: &str) -> Result<bool, AuthError> {
    let claims = decode_segment(token.split('.').nth(1).unwrap_or_default(), "payload")?;

    Ok(claims
        .get("exp")
        .and_then(serde_json::Value::as_i64)
        .is_some_and(|exp| exp + EXP_LEEWAY_SECS < chrono::Utc::now().timestamp()))
}

fn map_jwt_error(kind: &ErrorKind) -> AuthError {
    match kind {
        ErrorKind::InvalidSignature => AuthError::InvalidSignature,
        ErrorKind::ExpiredSignature => AuthError::Expired,
        ErrorKind::InvalidIssuer => {
            AuthError::invalid_claims(ClaimsFault::IssuerOrAudience, "Invalid issuer")
        }
        ErrorKind::InvalidAudience => {
            AuthError::invalid_claims(ClaimsFault::IssuerOrAudience, "Invalid audience")
        }
        ErrorKind::MissingRequiredClaim(claim) => AuthError::invalid_claims(
            ClaimsFault::Structure,
            format!("Missing required claim: {claim}"),
        ),
        ErrorKind::ImmatureSignature => {
            AuthError::invalid_claims(ClaimsFault::Structure, "Token not yet valid")
        }
        ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
            AuthError::invalid_claims(ClaimsFault::Algorithm, "Algorithm does not match key")
        }
        ErrorKind::InvalidToken | ErrorKind::Base64(_) | ErrorKind::Json(_) | ErrorKind::Utf8(_) => {
            AuthError::MalformedToken(format!("{kind:?}"))
        }
        _ => AuthError::InvalidSignature,
    }
}
