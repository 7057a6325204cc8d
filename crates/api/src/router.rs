//! Router assembly.

use axum::extract::DefaultBodyLimit;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{get, patch, post, put};
use axum::Router;

use crate::errors;
use crate::guards;
use crate::handlers::{healthcheck, movies, tokens, users};
use crate::state::AppState;

/// Request bodies larger than this are refused outright.
pub const MAX_REQUEST_BODY_BYTES: usize = 1_048_576;

/// Assembles the `/v1` routes and wraps them in the guard chain.
///
/// The last layer added runs first, so panic containment is outermost,
/// then rate limiting, then principal resolution. The capability checks
/// are route layers on the movie sub-routers only.
pub fn build(state: AppState) -> Router {
    let open = Router::new()
        .route("/v1/healthcheck", get(healthcheck::status))
        .route("/v1/users", post(users::register))
        .route("/v1/users/activated", put(users::activate))
        .route(
            "/v1/tokens/authentication",
            post(tokens::create_authentication_token),
        )
        .route(
            "/v1/tokens/activation",
            post(tokens::create_activation_token),
        );

    let reads = Router::new()
        .route("/v1/movies", get(movies::list))
        .route("/v1/movies/:id", get(movies::show))
        .route_layer(from_fn_with_state(
            state.clone(),
            guards::require_movies_read,
        ));

    let writes = Router::new()
        .route("/v1/movies", post(movies::create))
        .route(
            "/v1/movies/:id",
            patch(movies::update).delete(movies::delete),
        )
        .route_layer(from_fn_with_state(
            state.clone(),
            guards::require_movies_write,
        ));

    Router::new()
        .merge(open)
        .merge(reads)
        .merge(writes)
        .fallback(errors::not_found)
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(from_fn_with_state(state.clone(), guards::resolve_principal))
        .layer(from_fn_with_state(state.clone(), guards::limit_clients))
        .layer(from_fn(guards::recover_panic))
        .with_state(state)
}
