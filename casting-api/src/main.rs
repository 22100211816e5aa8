use std::net::SocketAddr;
use std::sync::Arc;

use casting_api::{build_router, CastingStore};
use casting_core::AppConfig;
use casting_security::{Authorizer, JwksCache, JwtValidator, SecurityConfig};
use tokio::net::TcpListener;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    casting_core::init_tracing();

    let config = AppConfig::load()?;
    let security = SecurityConfig::from_app_config(&config)?;
    let addr: SocketAddr = config.get_or("server.addr", SocketAddr::from(([0, 0, 0, 0], 8080)))?;

    let jwks = Arc::new(JwksCache::new(security.clone())?);
    // Startup must not depend on the identity provider being reachable.
    match jwks.prefetch().await {
        Ok(count) => info!(keys = count, url = %security.jwks_url, "JWKS loaded"),
        Err(err) => warn!(url = %security.jwks_url, error = %err, "JWKS prefetch failed, keys will be fetched on demand"),
    }

    let authorizer = Authorizer::new(Arc::new(JwtValidator::new(jwks, security.clone())));
    let app = build_router(&authorizer, CastingStore::new());

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, issuer = %security.issuer, audience = %security.audience, "Casting agency listening");
    axum::serve(listener, app).await?;
    Ok(())
}
