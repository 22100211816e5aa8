use casting_core::{error_response, HttpError};

use axum::http::StatusCode;
use axum::response::IntoResponse;
use http_body_util::BodyExt;

async fn error_parts(resp: axum::response::Response) -> (StatusCode, serde_json::Value) {
    let status = resp.status();
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    (status, json)
}

#[tokio::test]
async fn not_found_uniform_body() {
    let (status, body) = error_parts(HttpError::NotFound("Not found".into()).into_response()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], 404);
    assert_eq!(body["message"], "Not found");
}

#[tokio::test]
async fn unprocessable_uniform_body() {
    let (status, body) =
        error_parts(HttpError::Unprocessable("unprocessable".into()).into_response()).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], 422);
}

#[tokio::test]
async fn custom_status_is_preserved() {
    let err = HttpError::Custom {
        status: StatusCode::CONFLICT,
        message: "already exists".into(),
    };
    let (status, body) = error_parts(err.into_response()).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], 409);
    assert_eq!(body["message"], "already exists");
}

#[tokio::test]
async fn error_response_helper_shape() {
    let (status, body) = error_parts(error_response(StatusCode::FORBIDDEN, "Forbidden")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let obj = body.as_object().unwrap();
    assert_eq!(obj.len(), 3);
    assert_eq!(obj["success"], false);
}

#[test]
fn status_and_message_accessors() {
    let err = HttpError::MethodNotAllowed("Method Not Allowed".into());
    assert_eq!(err.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(err.message(), "Method Not Allowed");
    assert_eq!(err.to_string(), "Method Not Allowed: Method Not Allowed");
}

#[test]
fn io_error_maps_to_internal() {
    let err: HttpError = std::io::Error::other("disk").into();
    assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
}
