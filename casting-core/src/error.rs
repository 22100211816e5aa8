use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

/// Helper to create a JSON error response with the uniform
/// `{ "success": false, "error": <status>, "message": <text> }` body.
pub fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    let body = serde_json::json!({
        "success": false,
        "error": status.as_u16(),
        "message": message.into(),
    });
    (status, Json(body)).into_response()
}

/// Application-level HTTP error.
///
/// Every variant renders the same JSON shape so that authorization failures
/// and business failures only differ in status code and message.
pub enum HttpError {
    NotFound(String),
    Unauthorized(String),
    Forbidden(String),
    BadRequest(String),
    MethodNotAllowed(String),
    Unprocessable(String),
    Internal(String),
    Custom { status: StatusCode, message: String },
}

impl HttpError {
    /// Status code this error renders with.
    pub fn status(&self) -> StatusCode {
        match self {
            HttpError::NotFound(_) => StatusCode::NOT_FOUND,
            HttpError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            HttpError::Forbidden(_) => StatusCode::FORBIDDEN,
            HttpError::BadRequest(_) => StatusCode::BAD_REQUEST,
            HttpError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            HttpError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            HttpError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            HttpError::Custom { status, .. } => *status,
        }
    }

    /// Message placed in the response body.
    pub fn message(&self) -> &str {
        match self {
            HttpError::NotFound(msg)
            | HttpError::Unauthorized(msg)
            | HttpError::Forbidden(msg)
            | HttpError::BadRequest(msg)
            | HttpError::MethodNotAllowed(msg)
            | HttpError::Unprocessable(msg)
            | HttpError::Internal(msg) => msg,
            HttpError::Custom { message, .. } => message,
        }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            HttpError::NotFound(msg)
            | HttpError::Unauthorized(msg)
            | HttpError::Forbidden(msg)
            | HttpError::BadRequest(msg)
            | HttpError::MethodNotAllowed(msg)
            | HttpError::Unprocessable(msg)
            | HttpError::Internal(msg)
            | HttpError::Custom { message: msg, .. } => error_response(status, msg),
        }
    }
}

impl std::fmt::Display for HttpError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HttpError::NotFound(msg) => write!(f, "Not Found: {msg}"),
            HttpError::Unauthorized(msg) => write!(f, "Unauthorized: {msg}"),
            HttpError::Forbidden(msg) => write!(f, "Forbidden: {msg}"),
            HttpError::BadRequest(msg) => write!(f, "Bad Request: {msg}"),
            HttpError::MethodNotAllowed(msg) => write!(f, "Method Not Allowed: {msg}"),
            HttpError::Unprocessable(msg) => write!(f, "Unprocessable: {msg}"),
            HttpError::Internal(msg) => write!(f, "Internal Error: {msg}"),
            HttpError::Custom { status, message } => write!(f, "Custom Error ({status}): {message}"),
        }
    }
}

impl std::fmt::Debug for HttpError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        <Self as std::fmt::Display>::fmt(self, f)
    }
}

impl std::error::Error for HttpError {}

impl From<std::io::Error> for HttpError {
    fn from(err: std::io::Error) -> Self {
        HttpError::Internal(err.to_string())
    }
}
