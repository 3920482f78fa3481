use axum::{
    Router, middleware,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::error::ApiError;
use crate::middleware::{require_auth, require_correct_user};
use crate::state::AppState;
use crate::{auth, messages, users};

/// Build the full route table.
///
/// Guards per route:
/// - `/auth/*`: none
/// - `/users`, `/messages`: logged in
/// - `/users/{username}…`: logged in as `{username}`
/// - `/messages/{id}`, `/messages/{id}/read`: logged in, then checked against
///   the loaded message inside the handler
pub fn build_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login));

    let own_user_routes = Router::new()
        .route("/users/{username}", get(users::get_user))
        .route("/users/{username}/to", get(users::messages_to))
        .route("/users/{username}/from", get(users::messages_from))
        .route_layer(middleware::from_fn(require_correct_user));

    let protected_routes = Router::new()
        .route("/users", get(users::list_users))
        .merge(own_user_routes)
        .route("/messages", post(messages::send_message))
        .route("/messages/{id}", get(messages::get_message))
        .route("/messages/{id}/read", post(messages::mark_read))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .fallback(not_found)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn not_found() -> ApiError {
    ApiError::NotFound("Not found".into())
}
