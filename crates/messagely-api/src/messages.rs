use axum::{
    Extension, Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

use messagely_types::api::{
    Claims, MessageDetailResponse, ReadReceiptResponse, SendMessageRequest, SentMessageResponse,
};
use messagely_types::models::ReadReceipt;

use crate::convert;
use crate::error::ApiError;
use crate::middleware::{ensure_participant, ensure_recipient};
use crate::state::{AppState, run_db};

/// Ids that don't parse can't name a stored message.
fn parse_message_id(raw: &str) -> Result<Uuid, ApiError> {
    raw.parse::<Uuid>()
        .map_err(|_| ApiError::NotFound(format!("No such message: {}", raw)))
}

/// GET /messages/{id}
///
/// Loaded first, then authorized: only the sender or recipient may view it.
pub async fn get_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let message_id = parse_message_id(&id)?;

    let row = run_db(&state, move |db| db.get_message(&message_id.to_string()))
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No such message: {}", message_id)))?;

    ensure_participant(&claims, &row.from_user.username, &row.to_user.username)?;

    let message = convert::message_detail(row)?;
    Ok(Json(MessageDetailResponse { message }))
}

/// POST /messages: send from the authenticated user to `to_username`.
pub async fn send_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    payload: Result<Json<SendMessageRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;

    if req.to_username.trim().is_empty() {
        return Err(ApiError::Validation("to_username is required".into()));
    }
    if req.body.trim().is_empty() {
        return Err(ApiError::Validation("body is required".into()));
    }

    let message_id = Uuid::new_v4();
    let from = claims.username.clone();
    let to = req.to_username.clone();

    let row = run_db(&state, move |db| {
        if db.get_user(&to)?.is_none() {
            return Ok(None);
        }
        db.insert_message(&message_id.to_string(), &from, &to, &req.body)
            .map(Some)
    })
    .await?
    .ok_or_else(|| ApiError::Validation(format!("Unknown recipient: {}", req.to_username)))?;

    info!("Message {} sent from {} to {}", message_id, claims.username, row.to_username);

    let message = convert::sent_message(row)?;
    Ok((StatusCode::CREATED, Json(SentMessageResponse { message })))
}

/// POST /messages/{id}/read
///
/// Only the recipient may mark a message read. Repeating the call is a no-op
/// that reports the original `read_at`.
pub async fn mark_read(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let message_id = parse_message_id(&id)?;
    let not_found = || ApiError::NotFound(format!("No such message: {}", message_id));

    let row = run_db(&state, move |db| db.get_message(&message_id.to_string()))
        .await?
        .ok_or_else(not_found)?;

    ensure_recipient(&claims, &row.to_user.username)?;

    let read_at = run_db(&state, move |db| db.mark_read(&message_id.to_string()))
        .await?
        .ok_or_else(not_found)?;

    let read_at = convert::parse_timestamp(&read_at)?;
    Ok(Json(ReadReceiptResponse {
        message: ReadReceipt {
            id: message_id,
            read_at,
        },
    }))
}
