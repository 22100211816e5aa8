mod app;
mod jwks_server;
mod jwt;

pub use app::{resolve_path, TestApp, TestRequest, TestResponse};
pub use jwks_server::{JwksServer, JWKS_PATH, UNREACHABLE_JWKS_URL};
pub use jwt::{jwks_of, TestJwt, TokenBuilder, TEST_AUDIENCE, TEST_SUBJECT};
