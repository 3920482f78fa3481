use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::info;

use messagely_db::models::NewUser;
use messagely_types::api::{Claims, LoginRequest, RegisterRequest, TokenResponse};

use crate::error::ApiError;
use crate::state::{AppState, run_db};

const TOKEN_LIFETIME_DAYS: i64 = 30;

/// POST /auth/register: create a user and log them in.
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;

    // Validate input
    if req.username.len() < 3 || req.username.len() > 32 {
        return Err(ApiError::Validation(
            "username must be 3 to 32 characters".into(),
        ));
    }
    if req.password.len() < 8 {
        return Err(ApiError::Validation(
            "password must be at least 8 characters".into(),
        ));
    }
    if [&req.first_name, &req.last_name, &req.phone]
        .iter()
        .any(|field| field.trim().is_empty())
    {
        return Err(ApiError::Validation(
            "first_name, last_name and phone are required".into(),
        ));
    }

    // Hash password with Argon2id
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))?
        .to_string();

    let created = run_db(&state, {
        let username = req.username.clone();
        move |db| {
            if db.get_user(&username)?.is_some() {
                return Ok(false);
            }
            db.create_user(&NewUser {
                username: &username,
                password_hash: &password_hash,
                first_name: &req.first_name,
                last_name: &req.last_name,
                phone: &req.phone,
            })?;
            Ok(true)
        }
    })
    .await?;

    if !created {
        return Err(ApiError::Conflict(format!(
            "username '{}' is taken",
            req.username
        )));
    }

    info!("Registered user {}", req.username);
    let token = create_token(&state.jwt_secret, &req.username)?;
    Ok((StatusCode::CREATED, Json(TokenResponse { token })))
}

/// POST /auth/login: verify credentials and bump `last_login_at`.
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;

    let username = req.username.clone();
    let user = run_db(&state, move |db| db.get_user(&username))
        .await?
        .ok_or(ApiError::Unauthorized)?;

    // Verify password
    let parsed_hash = PasswordHash::new(&user.password)
        .map_err(|e| anyhow::anyhow!("stored hash for {} is corrupt: {}", user.username, e))?;

    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| ApiError::Unauthorized)?;

    let username = user.username.clone();
    run_db(&state, move |db| db.update_login_timestamp(&username)).await?;

    let token = create_token(&state.jwt_secret, &user.username)?;
    Ok(Json(TokenResponse { token }))
}

pub fn create_token(secret: &str, username: &str) -> anyhow::Result<String> {
    let now = chrono::Utc::now();
    let claims = Claims {
        username: username.to_string(),
        iat: now.timestamp() as usize,
        exp: (now + chrono::Duration::days(TOKEN_LIFETIME_DAYS)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}
