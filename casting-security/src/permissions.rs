use crate::claims::ClaimSet;
use crate::error::{AuthError, ClaimsFault};

/// Permission a protected operation requires, fixed at route registration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RequiredPermission(&'static str);

impl RequiredPermission {
    pub const GET_ACTORS: Self = Self("get:actors");
    pub const POST_ACTORS: Self = Self("post:actors");
    pub const PATCH_ACTORS: Self = Self("patch:actors");
    pub const DELETE_ACTORS: Self = Self("delete:actors");
    pub const GET_MOVIES: Self = Self("get:movies");
    pub const POST_MOVIES: Self = Self("post:movies");
    pub const PATCH_MOVIES: Self = Self("patch:movies");
    pub const DELETE_MOVIES: Self = Self("delete:movies");

    pub const fn new(permission: &'static str) -> Self {
        Self(permission)
    }

    pub const fn as_str(&self) -> &'static str {
        self.0
    }
}

impl std::fmt::Display for RequiredPermission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0)
    }
}

/// Check that `claims` grant `required`.
///
/// A token without any permissions claim is `InvalidClaims` (401); a token
/// whose permissions do not contain `required` is `PermissionDenied` (403).
pub fn check_permission(claims: &ClaimSet, required: RequiredPermission) -> Result<(), AuthError> {
    let granted = claims.permissions().ok_or_else(|| {
        AuthError::invalid_claims(ClaimsFault::MissingPermissions, "permissions claim missing")
    })?;

    if granted.contains(required.as_str()) {
        Ok(())
    } else {
        Err(AuthError::PermissionDenied(required.as_str().to_string()))
    }
}
