use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};

use messagely_types::api::{InboxResponse, OutboxResponse, UserListResponse, UserResponse};

use crate::convert;
use crate::error::ApiError;
use crate::state::{AppState, run_db};

/// GET /users
pub async fn list_users(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let rows = run_db(&state, |db| db.list_users()).await?;
    let users = rows.into_iter().map(convert::summary).collect();
    Ok(Json(UserListResponse { users }))
}

/// GET /users/{username}
pub async fn get_user(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let lookup = username.clone();
    let user = run_db(&state, move |db| db.get_user(&lookup)?.map(convert::user).transpose())
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No such user: {}", username)))?;

    Ok(Json(UserResponse { user }))
}

/// GET /users/{username}/to: messages received, each with its sender.
pub async fn messages_to(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let messages = run_db(&state, move |db| {
        db.messages_to(&username)?
            .into_iter()
            .map(convert::inbox_message)
            .collect::<anyhow::Result<Vec<_>>>()
    })
    .await?;

    Ok(Json(InboxResponse { messages }))
}

/// GET /users/{username}/from: messages sent, each with its recipient.
pub async fn messages_from(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let messages = run_db(&state, move |db| {
        db.messages_from(&username)?
            .into_iter()
            .map(convert::outbox_message)
            .collect::<anyhow::Result<Vec<_>>>()
    })
    .await?;

    Ok(Json(OutboxResponse { messages }))
}
