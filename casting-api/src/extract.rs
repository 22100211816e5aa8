use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{FromRequest, FromRequestParts, Path, Request};
use axum::http::request::Parts;
use axum::Json;
use garde::Validate;
use serde::de::DeserializeOwned;
use tracing::debug;

use casting_core::HttpError;

use crate::models::unprocessable;

/// JSON request body that is deserialized and then validated.
///
/// Every rejection renders as 422 in the uniform error shape.
pub struct Payload<T>(pub T);

impl<T, S> FromRequest<S> for Payload<T>
where
    T: DeserializeOwned + Validate,
    T::Context: Default,
    S: Send + Sync,
{
    type Rejection = HttpError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection: JsonRejection| {
                debug!(reason = %rejection.body_text(), "Rejected request body");
                HttpError::Unprocessable("unprocessable".into())
            })?;
        value.validate().map_err(|report| {
            debug!(reason = %report, "Request body failed validation");
            unprocessable(&report)
        })?;
        Ok(Payload(value))
    }
}

/// Numeric `{id}` path segment. Anything else is 404, as no such entity
/// can exist.
pub struct EntityId(pub u64);

impl<S> FromRequestParts<S> for EntityId
where
    S: Send + Sync,
{
    type Rejection = HttpError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(id) = Path::<u64>::from_request_parts(parts, state)
            .await
            .map_err(|rejection: PathRejection| {
                debug!(reason = %rejection.body_text(), "Rejected entity id");
                HttpError::NotFound("Not found".into())
            })?;
        Ok(EntityId(id))
    }
}
