use axum::{
    Extension,
    extract::{Path, Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};
use jsonwebtoken::{DecodingKey, Validation, decode};
use tracing::debug;

use messagely_types::api::Claims;

use crate::error::ApiError;
use crate::state::AppState;

/// Require a valid bearer token and attach its `Claims` to the request.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let bearer = req
        .headers()
        .typed_get::<Authorization<Bearer>>()
        .ok_or(ApiError::Unauthorized)?;

    let claims = decode_token(&state.jwt_secret, bearer.token())?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

/// Require that the authenticated user is the one named by the `{username}`
/// path segment. Must run inside `require_auth`.
pub async fn require_correct_user(
    Path(username): Path<String>,
    Extension(claims): Extension<Claims>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    ensure_correct_user(&claims, &username)?;
    Ok(next.run(req).await)
}

pub fn decode_token(secret: &str, token: &str) -> Result<Claims, ApiError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| {
        debug!("Rejected token: {}", e);
        ApiError::Unauthorized
    })
}

pub fn ensure_correct_user(claims: &Claims, username: &str) -> Result<(), ApiError> {
    if claims.username == username {
        Ok(())
    } else {
        Err(ApiError::Forbidden)
    }
}

/// Sender or recipient may view a message.
pub fn ensure_participant(
    claims: &Claims,
    from_username: &str,
    to_username: &str,
) -> Result<(), ApiError> {
    if claims.username == from_username || claims.username == to_username {
        Ok(())
    } else {
        Err(ApiError::Forbidden)
    }
}

/// Only the recipient may mark a message read.
pub fn ensure_recipient(claims: &Claims, to_username: &str) -> Result<(), ApiError> {
    ensure_correct_user(claims, to_username)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::create_token;

    fn claims(username: &str) -> Claims {
        Claims {
            username: username.to_string(),
            iat: 0,
            exp: usize::MAX,
        }
    }

    #[test]
    fn correct_user_must_match_exactly() {
        assert!(ensure_correct_user(&claims("alice"), "alice").is_ok());
        assert!(matches!(
            ensure_correct_user(&claims("alice"), "Alice"),
            Err(ApiError::Forbidden)
        ));
    }

    #[test]
    fn participants_are_sender_or_recipient() {
        assert!(ensure_participant(&claims("alice"), "alice", "bob").is_ok());
        assert!(ensure_participant(&claims("bob"), "alice", "bob").is_ok());
        assert!(matches!(
            ensure_participant(&claims("carol"), "alice", "bob"),
            Err(ApiError::Forbidden)
        ));
    }

    #[test]
    fn sender_is_not_the_recipient() {
        assert!(ensure_recipient(&claims("bob"), "bob").is_ok());
        assert!(matches!(ensure_recipient(&claims("alice"), "bob"), Err(ApiError::Forbidden)));
    }

    #[test]
    fn token_round_trips_with_the_same_secret() {
        let token = create_token("secret", "alice").unwrap();
        assert_eq!(decode_token("secret", &token).unwrap().username, "alice");
        assert!(matches!(decode_token("other", &token), Err(ApiError::Unauthorized)));
        assert!(matches!(decode_token("secret", "not-a-jwt"), Err(ApiError::Unauthorized)));
    }
}
