pub mod claims;
pub mod config;
pub mod error;
pub mod extractor;
pub mod jwks;
pub mod jwt;
pub mod middleware;
pub mod permissions;

// Re-export primary public types for convenience.
pub use claims::{Audience, ClaimSet};
pub use config::{PermissionsClaim, SecurityConfig};
pub use error::{AuthError, ClaimsFault};
pub use extractor::{extract_bearer_token, Claims};
pub use jwks::{JwksCache, KeySet, SigningKey};
pub use jwt::JwtValidator;
pub use middleware::{require_permission, Authorizer};
pub use permissions::{check_permission, RequiredPermission};

pub mod prelude {
    //! Re-exports of the most commonly used security types.
    pub use crate::{
        require_permission, Authorizer, Claims, JwksCache, JwtValidator, RequiredPermission,
        SecurityConfig,
    };
}
