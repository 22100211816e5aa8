use std::future::Future;
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::{from_fn_with_state, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::MethodRouter;
use tracing::{debug, warn};

use crate::claims::ClaimSet;
use crate::error::AuthError;
use crate::extractor::authorization_header;
use crate::jwt::JwtValidator;
use crate::permissions::{check_permission, RequiredPermission};

/// Composition point of the authorization layer.
///
/// Holds the shared [`JwtValidator`]; cheap to clone.
#[derive(Clone)]
pub struct Authorizer {
    validator: Arc<JwtValidator>,
}

impl Authorizer {
    pub fn new(validator: Arc<JwtValidator>) -> Self {
        Self { validator }
    }

    pub fn validator(&self) -> &Arc<JwtValidator> {
        &self.validator
    }

    /// Verify the Authorization header value and check `required`.
    pub async fn authorize(
        &self,
        header_value: Option<&str>,
        required: RequiredPermission,
    ) -> Result<ClaimSet, AuthError> {
        let claims = self.validator.verify_header(header_value).await?;
        check_permission(&claims, required).inspect_err(|err| {
            warn!(sub = %claims.subject(), permission = %required, error = %err, "Permission check failed");
        })?;
        debug!(sub = %claims.subject(), permission = %required, "Request authorized");
        Ok(claims)
    }

    /// Run `op` with the validated claims, or return the failure without
    /// invoking it.
    ///
    /// ```ignore
    /// let movies = authorizer
    ///     .guard(header, RequiredPermission::GET_MOVIES, |claims| store.list_movies())
    ///     .await?;
    /// ```
    pub async fn guard<F, Fut, T>(
        &self,
        header_value: Option<&str>,
        required: RequiredPermission,
        op: F,
    ) -> Result<T, AuthError>
    where
        F: FnOnce(ClaimSet) -> Fut,
        Fut: Future<Output = T>,
    {
        let claims = self.authorize(header_value, required).await?;
        Ok(op(claims).await)
    }
}

#[derive(Clone)]
struct PermissionLayerState {
    authorizer: Authorizer,
    required: RequiredPermission,
}

async fn authorize_request(
    State(layer): State<PermissionLayerState>,
    mut req: Request,
    next: Next,
) -> Response {
    // Owned copy: the request body is not Sync, so no borrow of `req` may be held across an await.
    let header_value = authorization_header(req.headers()).map(|value| value.map(str::to_owned));
    let outcome = match header_value {
        Ok(header_value) => {
            layer
                .authorizer
                .authorize(header_value.as_deref(), layer.required)
                .await
        }
        Err(err) => Err(err),
    };

    match outcome {
        Ok(claims) => {
            req.extensions_mut().insert(claims);
            next.run(req).await
        }
        Err(err) => {
            warn!(uri = %req.uri(), kind = err.kind(), error = %err, "Request rejected");
            err.into_response()
        }
    }
}

/// Wrap a method router so that every request must carry a bearer token
/// granting `required` before the handler runs.
///
/// The validated [`ClaimSet`] is available to the handler through the
/// [`crate::Claims`] extractor.
///
/// ```ignore
/// Router::new().route(
///     "/movies",
///     require_permission(get(list_movies), &authorizer, RequiredPermission::GET_MOVIES),
/// )
/// ```
pub fn require_permission<S>(
    route: MethodRouter<S>,
    authorizer: &Authorizer,
    required: RequiredPermission,
) -> MethodRouter<S>
where
    S: Clone + Send + Sync + 'static,
{
    let state = PermissionLayerState {
        authorizer: authorizer.clone(),
        required,
    };
    route.route_layer(from_fn_with_state(state, authorize_request))
}
