use axum::extract::State;
use axum::routing::{delete, get, patch, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tracing::info;

use casting_core::HttpError;
use casting_security::{require_permission, Authorizer, Claims, RequiredPermission};

use crate::extract::{EntityId, Payload};
use crate::models::{ActorPatch, NewActor};
use crate::state::AppState;

pub fn router(authorizer: &Authorizer) -> Router<AppState> {
    Router::new()
        .route(
            "/actors",
            require_permission(get(list_actors), authorizer, RequiredPermission::GET_ACTORS).merge(
                require_permission(post(create_actor), authorizer, RequiredPermission::POST_ACTORS),
            ),
        )
        .route(
            "/actors/{id}",
            require_permission(patch(update_actor), authorizer, RequiredPermission::PATCH_ACTORS)
                .merge(require_permission(
                    delete(delete_actor),
                    authorizer,
                    RequiredPermission::DELETE_ACTORS,
                )),
        )
}

async fn list_actors(State(state): State<AppState>, Claims(claims): Claims) -> Json<Value> {
    let actors = state.store.list_actors().await;
    info!(count = actors.len(), sub = %claims.subject(), "Actors listed");
    Json(json!({ "success": true, "actors": actors }))
}

async fn create_actor(
    State(state): State<AppState>,
    Claims(claims): Claims,
    Payload(new): Payload<NewActor>,
) -> Json<Value> {
    let actor = state.store.create_actor(new).await;
    info!(id = actor.id, sub = %claims.subject(), "Actor created");
    Json(json!({ "success": true, "actor": actor }))
}

async fn update_actor(
    State(state): State<AppState>,
    Claims(claims): Claims,
    EntityId(id): EntityId,
    Payload(patch): Payload<ActorPatch>,
) -> Result<Json<Value>, HttpError> {
    let actor = state
        .store
        .update_actor(id, patch)
        .await
        .ok_or_else(|| HttpError::NotFound("Not found".into()))?;
    info!(id, sub = %claims.subject(), "Actor updated");
    Ok(Json(json!({ "success": true, "actor": actor })))
}

async fn delete_actor(
    State(state): State<AppState>,
    Claims(claims): Claims,
    EntityId(id): EntityId,
) -> Result<Json<Value>, HttpError> {
    state
        .store
        .delete_actor(id)
        .await
        .ok_or_else(|| HttpError::NotFound("Not found".into()))?;
    info!(id, sub = %claims.subject(), "Actor deleted");
    Ok(Json(json!({ "success": true, "delete": id })))
}
