use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::Value;
use tokio::net::TcpListener;

pub const JWKS_PATH: &str = "/.well-known/jwks.json";

/// An address nothing listens on, for "provider unreachable" cases.
pub const UNREACHABLE_JWKS_URL: &str = "http://127.0.0.1:1/.well-known/jwks.json";

struct ServerState {
    jwks: RwLock<Value>,
    hits: AtomicUsize,
    failing: AtomicBool,
    delay_ms: AtomicU64,
}

/// Local stand-in for the identity provider's JWKS endpoint.
///
/// Counts every fetch, and lets tests swap the published keys, make the
/// endpoint fail with 503, or delay responses.
#[derive(Clone)]
pub struct JwksServer {
    addr: SocketAddr,
    state: Arc<ServerState>,
}

impl JwksServer {
    /// Bind to an ephemeral port on 127.0.0.1 and serve `jwks`.
    pub async fn start(jwks: Value) -> Self {
        let state = Arc::new(ServerState {
            jwks: RwLock::new(jwks),
            hits: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
            delay_ms: AtomicU64::new(0),
        });

        let router = Router::new()
            .route(JWKS_PATH, get(serve_jwks))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind JWKS server");
        let addr = listener.local_addr().expect("no local address");
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });

        Self { addr, state }
    }

    pub fn url(&self) -> String {
        format!("http://{}{JWKS_PATH}", self.addr)
    }

    /// Issuer URL matching this server, with trailing slash.
    pub fn issuer(&self) -> String {
        format!("http://{}/", self.addr)
    }

    /// Number of JWKS requests served so far, including failed ones.
    pub fn hits(&self) -> usize {
        self.state.hits.load(Ordering::SeqCst)
    }

    pub fn set_jwks(&self, jwks: Value) {
        *self.state.jwks.write().expect("jwks lock poisoned") = jwks;
    }

    pub fn set_failing(&self, failing: bool) {
        self.state.failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Duration) {
        self.state
            .delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }
}

async fn serve_jwks(State(state): State<Arc<ServerState>>) -> Response {
    state.hits.fetch_add(1, Ordering::SeqCst);

    let delay = state.delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }

    if state.failing.load(Ordering::SeqCst) {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }

    let jwks = state.jwks.read().expect("jwks lock poisoned").clone();
    Json(jwks).into_response()
}
