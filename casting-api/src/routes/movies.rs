use axum::extract::State;
use axum::routing::{delete, get, patch, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tracing::info;

use casting_core::HttpError;
use casting_security::{require_permission, Authorizer, Claims, RequiredPermission};

use crate::extract::{EntityId, Payload};
use crate::models::{MoviePatch, NewMovie};
use crate::state::AppState;

pub fn router(authorizer: &Authorizer) -> Router<AppState> {
    let collection = require_permission(get(list_movies), authorizer, RequiredPermission::GET_MOVIES)
        .merge(require_permission(post(create_movie), authorizer, RequiredPermission::POST_MOVIES));
    let item = require_permission(patch(update_movie), authorizer, RequiredPermission::PATCH_MOVIES)
        .merge(require_permission(delete(delete_movie), authorizer, RequiredPermission::DELETE_MOVIES));

    Router::new()
        .route("/movies", collection)
        .route("/movies/{id}", item)
}

async fn list_movies(State(state): State<AppState>, Claims(claims): Claims) -> Json<Value> {
    let movies = state.store.list_movies().await;
    info!(count = movies.len(), sub = %claims.subject(), "Movies listed");
    Json(json!({ "success": true, "movies": movies }))
}

async fn create_movie(
    State(state): State<AppState>,
    Claims(claims): Claims,
    Payload(new): Payload<NewMovie>,
) -> Json<Value> {
    let movie = state.store.create_movie(new).await;
    info!(id = movie.id, sub = %claims.subject(), "Movie created");
    Json(json!({ "success": true, "movie": movie }))
}

async fn update_movie(
    State(state): State<AppState>,
    Claims(claims): Claims,
    EntityId(id): EntityId,
    Payload(patch): Payload<MoviePatch>,
) -> Result<Json<Value>, HttpError> {
    let movie = state
        .store
        .update_movie(id, patch)
        .await
        .ok_or_else(|| HttpError::NotFound("Not found".into()))?;
    info!(id, sub = %claims.subject(), "Movie updated");
    Ok(Json(json!({ "success": true, "movie": movie })))
}

async fn delete_movie(
    State(state): State<AppState>,
    Claims(claims): Claims,
    EntityId(id): EntityId,
) -> Result<Json<Value>, HttpError> {
    let movie = state
        .store
        .delete_movie(id)
        .await
        .ok_or_else(|| HttpError::NotFound("Not found".into()))?;
    info!(id, sub = %claims.subject(), "Movie deleted");
    Ok(Json(json!({
        "success": true,
        "delete": id,
        "message": format!("Movie {} successfully deleted.", movie.title),
    })))
}
