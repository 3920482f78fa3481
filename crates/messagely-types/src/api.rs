use serde::{Deserialize, Serialize};

use crate::models::{
    InboxMessage, MessageDetail, OutboxMessage, ReadReceipt, SentMessage, User, UserSummary,
};

// -- JWT Claims --

/// Principal carried by every bearer token. Attached to the request by the
/// auth middleware and read by the handlers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub username: String,
    pub iat: usize,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
}

// -- Users --

#[derive(Debug, Serialize, Deserialize)]
pub struct UserListResponse {
    pub users: Vec<UserSummary>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserResponse {
    pub user: User,
}

// -- Messages --

/// Body of `POST /messages`. Fields default to empty so that a missing field
/// is reported as a validation failure rather than a parse failure.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    #[serde(default)]
    pub to_username: String,
    #[serde(default)]
    pub body: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InboxResponse {
    pub messages: Vec<InboxMessage>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OutboxResponse {
    pub messages: Vec<OutboxMessage>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageDetailResponse {
    pub message: MessageDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SentMessageResponse {
    pub message: SentMessage,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReadReceiptResponse {
    pub message: ReadReceipt,
}

// -- Errors --

/// Uniform failure body: `{"error": {"message": ..., "status": ...}}`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
    pub status: u16,
}
