use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::routing::get;
use axum::Router;
use casting_core::layers::{catch_panic_layer, default_cors, default_trace};
use casting_core::init_tracing;
use http_body_util::BodyExt;
use tower::ServiceExt;

async fn boom() -> &'static str {
    panic!("handler exploded")
}

#[tokio::test]
async fn panics_render_uniform_500() {
    let app = Router::new()
        .route("/boom", get(boom))
        .layer(catch_panic_layer())
        .layer(default_trace());

    let resp = app
        .oneshot(Request::get("/boom").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body = resp.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["success"], false);
    assert_eq!(json["error"], 500);
    assert_eq!(json["message"], "Server Error");
}

#[tokio::test]
async fn cors_allows_any_origin() {
    let app = Router::new()
        .route("/", get(|| async { "ok" }))
        .layer(default_cors());

    let resp = app
        .oneshot(
            Request::get("/")
                .header("origin", "https://casting.example")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()["access-control-allow-origin"], "*");
}

#[test]
fn init_tracing_twice_is_harmless() {
    init_tracing();
    init_tracing();
}
