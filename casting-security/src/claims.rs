use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::PermissionsClaim;
use crate::error::{AuthError, ClaimsFault};

/// The `aud` claim: a single identifier or a list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    One(String),
    Many(Vec<String>),
}

impl Audience {
    pub fn contains(&self, audience: &str) -> bool {
        match self {
            Audience::One(aud) => aud == audience,
            Audience::Many(auds) => auds.iter().any(|aud| aud == audience),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        let items: &[String] = match self {
            Audience::One(aud) => std::slice::from_ref(aud),
            Audience::Many(auds) => auds,
        };
        items.iter().map(String::as_str)
    }
}

/// Wire shape of the verified payload. Parsing is strict: a missing or
/// mistyped required claim fails instead of defaulting.
#[derive(Deserialize)]
struct RawClaims {
    iss: String,
    sub: String,
    aud: Audience,
    exp: i64,
    #[serde(default)]
    permissions: Option<Vec<String>>,
    #[serde(default)]
    scope: Option<String>,
}

/// Claims of a token that passed signature and standard-claim validation.
///
/// Only [`crate::JwtValidator`] constructs this type, from a verified payload.
#[derive(Clone, Debug, Serialize)]
pub struct ClaimSet {
    issuer: String,
    subject: String,
    audience: Audience,
    expires_at: DateTime<Utc>,
    permissions: Option<BTreeSet<String>>,
    #[serde(skip)]
    raw: serde_json::Value,
}

impl ClaimSet {
    /// Parse a verified payload.
    ///
    /// `permissions` is `None` when the configured claim is absent; that case
    /// is rejected later by the permission check, not here.
    pub(crate) fn from_verified(
        payload: serde_json::Value,
        source: PermissionsClaim,
    ) -> Result<Self, AuthError> {
        let parsed: RawClaims = serde_json::from_value(payload.clone())
            .map_err(|e| AuthError::invalid_claims(ClaimsFault::Structure, e.to_string()))?;

        let expires_at = DateTime::<Utc>::from_timestamp(parsed.exp, 0).ok_or_else(|| {
            AuthError::invalid_claims(ClaimsFault::Structure, format!("exp out of range: {}", parsed.exp))
        })?;

        let permissions = match source {
            PermissionsClaim::Permissions => parsed.permissions.map(|p| p.into_iter().collect()),
            PermissionsClaim::Scope => parsed
                .scope
                .map(|scope| scope.split_whitespace().map(String::from).collect()),
        };

        Ok(ClaimSet {
            issuer: parsed.iss,
            subject: parsed.sub,
            audience: parsed.aud,
            expires_at,
            permissions,
            raw: payload,
        })
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn audience(&self) -> &Audience {
        &self.audience
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Granted permissions, or `None` if the token carried no permissions claim.
    pub fn permissions(&self) -> Option<&BTreeSet<String>> {
        self.permissions.as_ref()
    }

    /// Exact membership test. No wildcard or hierarchy matching.
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions
            .as_ref()
            .is_some_and(|granted| granted.contains(permission))
    }

    /// The full verified payload, for claims not modelled here.
    pub fn raw(&self) -> &serde_json::Value {
        &self.raw
    }
}
