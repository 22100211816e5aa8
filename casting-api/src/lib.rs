pub mod extract;
pub mod models;
pub mod routes;
pub mod state;
pub mod store;

use axum::routing::get;
use axum::Router;

use casting_core::layers::{catch_panic_layer, default_cors, default_trace};
use casting_security::Authorizer;

pub use state::AppState;
pub use store::CastingStore;

/// Assemble the service: the public welcome route, the guarded actor and
/// movie routes, JSON 404/405 fallbacks, and the tracing, CORS and
/// panic-catching layers.
pub fn build_router(authorizer: &Authorizer, store: CastingStore) -> Router {
    Router::new()
        .route("/", get(routes::index))
        .merge(routes::actors::router(authorizer))
        .merge(routes::movies::router(authorizer))
        .fallback(routes::not_found)
        .method_not_allowed_fallback(routes::method_not_allowed)
        .layer(catch_panic_layer())
        .layer(default_cors())
        .layer(default_trace())
        .with_state(AppState { store })
}
