use std::str::FromStr;

use casting_core::{AppConfig, ConfigError};
use jsonwebtoken::Algorithm;

/// Where the granted permissions are read from in the token payload.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PermissionsClaim {
    /// A `permissions` array of strings (the identity provider's RBAC claim).
    #[default]
    Permissions,
    /// A space-delimited OAuth2 `scope` string.
    Scope,
}

/// Security configuration for token verification and the JWKS cache.
#[derive(Clone, Debug)]
pub struct SecurityConfig {
    /// URL of the JWKS endpoint (e.g., https://tenant.auth0.com/.well-known/jwks.json)
    pub jwks_url: String,

    /// Expected issuer in the "iss" claim
    pub issuer: String,

    /// API identifier that must appear in the "aud" claim
    pub audience: String,

    /// JWKS cache TTL in seconds (default: 3600)
    pub jwks_cache_ttl_secs: u64,

    /// Minimum interval between unknown-kid refreshes in seconds (default: 10)
    pub jwks_min_refresh_interval_secs: u64,

    /// Timeout of the outbound JWKS request in seconds (default: 5)
    pub jwks_fetch_timeout_secs: u64,

    /// Allowed JWT algorithms. Tokens using other algorithms are rejected.
    /// Default: RS256 only.
    pub allowed_algorithms: Vec<Algorithm>,

    /// Claim holding the granted permissions.
    pub permissions_claim: PermissionsClaim,
}

impl SecurityConfig {
    /// Create a new SecurityConfig with default cache settings.
    pub fn new(jwks_url: impl Into<String>, issuer: impl Into<String>, audience: impl Into<String>) -> Self {
        Self {
            jwks_url: jwks_url.into(),
            issuer: issuer.into(),
            audience: audience.into(),
            jwks_cache_ttl_secs: 3600,
            jwks_min_refresh_interval_secs: 10,
            jwks_fetch_timeout_secs: 5,
            allowed_algorithms: vec![Algorithm::RS256],
            permissions_claim: PermissionsClaim::Permissions,
        }
    }

    /// Build a config for an identity provider domain, deriving the issuer
    /// (`https://<domain>/`) and the JWKS URL (`<issuer>.well-known/jwks.json`).
    pub fn for_domain(domain: &str, audience: impl Into<String>) -> Self {
        let issuer = issuer_from_domain(domain);
        let jwks_url = format!("{issuer}.well-known/jwks.json");
        Self::new(jwks_url, issuer, audience)
    }

    /// Read the security settings from application configuration.
    ///
    /// Keys: `auth0.domain`, `api.audience` (required); `auth0.jwks.url`,
    /// `auth0.algorithms`, `auth0.jwks.ttl.secs`, `auth0.jwks.timeout.secs`,
    /// `auth0.jwks.min.refresh.secs`, `auth0.permissions.claim` (optional).
    pub fn from_app_config(config: &AppConfig) -> Result<Self, ConfigError> {
        let domain = config.get_str("auth0.domain")?;
        let audience = config.get_str("api.audience")?;
        let mut security = Self::for_domain(domain, audience);

        if let Ok(url) = config.get_str("auth0.jwks.url") {
            security.jwks_url = url.to_string();
        }
        if config.contains_key("auth0.algorithms") {
            let algorithms = config
                .get_list("auth0.algorithms")?
                .iter()
                .map(|name| {
                    Algorithm::from_str(name).map_err(|_| ConfigError::TypeMismatch {
                        key: "auth0.algorithms".into(),
                        expected: "JWT algorithm name",
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            security.allowed_algorithms = algorithms;
        }
        security.jwks_cache_ttl_secs = config.get_or("auth0.jwks.ttl.secs", security.jwks_cache_ttl_secs)?;
        security.jwks_fetch_timeout_secs =
            config.get_or("auth0.jwks.timeout.secs", security.jwks_fetch_timeout_secs)?;
        security.jwks_min_refresh_interval_secs = config.get_or(
            "auth0.jwks.min.refresh.secs",
            security.jwks_min_refresh_interval_secs,
        )?;
        if let Ok(claim) = config.get_str("auth0.permissions.claim") {
            security.permissions_claim = match claim {
                "permissions" => PermissionsClaim::Permissions,
                "scope" => PermissionsClaim::Scope,
                _ => {
                    return Err(ConfigError::TypeMismatch {
                        key: "auth0.permissions.claim".into(),
                        expected: "\"permissions\" or \"scope\"",
                    })
                }
            };
        }

        Ok(security)
    }

    /// Set the JWKS cache TTL in seconds.
    pub fn with_cache_ttl(mut self, ttl_secs: u64) -> Self {
        self.jwks_cache_ttl_secs = ttl_secs;
        self
    }

    /// Set the minimum interval between unknown-kid refresh attempts.
    pub fn with_min_refresh_interval(mut self, interval_secs: u64) -> Self {
        self.jwks_min_refresh_interval_secs = interval_secs;
        self
    }

    /// Set the JWKS request timeout.
    pub fn with_fetch_timeout(mut self, timeout_secs: u64) -> Self {
        self.jwks_fetch_timeout_secs = timeout_secs;
        self
    }

    /// Set the allowed JWT algorithms. Empty lists will cause validation to fail.
    pub fn with_allowed_algorithms(
        mut self,
        algorithms: impl IntoIterator<Item = Algorithm>,
    ) -> Self {
        self.allowed_algorithms = algorithms.into_iter().collect();
        self
    }

    /// Convenience method to allow a single algorithm.
    pub fn with_allowed_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.allowed_algorithms = vec![algorithm];
        self
    }

    /// Select the claim that carries permissions.
    pub fn with_permissions_claim(mut self, claim: PermissionsClaim) -> Self {
        self.permissions_claim = claim;
        self
    }
}

/// `tenant.auth0.com` and `https://tenant.auth0.com` both become
/// `https://tenant.auth0.com/`.
fn issuer_from_domain(domain: &str) -> String {
    let trimmed = domain.trim().trim_end_matches('/');
    if trimmed.starts_with("https://") || trimmed.starts_with("http://") {
        format!("{trimmed}/")
    } else {
        format!("https://{trimmed}/")
    }
}
