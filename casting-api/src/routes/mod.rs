pub mod actors;
pub mod movies;

use axum::Json;
use serde_json::{json, Value};

use casting_core::HttpError;

pub async fn index() -> Json<Value> {
    Json(json!({
        "success": true,
        "message": "Welcome to the Casting Agency",
    }))
}

pub async fn not_found() -> HttpError {
    HttpError::NotFound("Not found".into())
}

pub async fn method_not_allowed() -> HttpError {
    HttpError::MethodNotAllowed("Method Not Allowed".into())
}
