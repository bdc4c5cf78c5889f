use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

use crate::handlers::{ApiError, ErrorResponse};
use crate::models::{Claims, Role, User};
use crate::workflow::Actor;
use crate::AppState;

/// Extractor that validates JWT and provides the authenticated user.
///
/// Add `auth: AuthUser` to a handler's parameters to require authentication.
pub struct AuthUser {
    pub claims: Claims,
    pub actor: Actor,
}

impl AuthUser {
    /// Reject callers that do not hold `role`
    pub fn require_role(&self, role: Role) -> Result<(), ApiError> {
        if self.actor.role == role {
            Ok(())
        } else {
            Err(ApiError::forbidden(format!("only a {} may do that", role)))
        }
    }
}

#[async_trait::async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        // Try Authorization header first, then fall back to ?token= query param
        // (WebSocket connections can't send custom headers)
        let token = if let Some(auth_header) = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
        {
            auth_header
                .strip_prefix("Bearer ")
                .ok_or(AuthError::InvalidToken)?
                .to_string()
        } else if let Some(query) = parts.uri.query() {
            query
                .split('&')
                .find_map(|pair| pair.strip_prefix("token="))
                .ok_or(AuthError::MissingToken)?
                .to_string()
        } else {
            return Err(AuthError::MissingToken);
        };

        let claims = decode_token(&token, &state.config.jwt_secret)?;
        let user_id = claims.sub.parse::<i64>().map_err(|_| AuthError::InvalidToken)?;

        Ok(AuthUser {
            actor: Actor {
                user_id,
                role: claims.role,
            },
            claims,
        })
    }
}

/// Issue a signed token for `user` valid for `ttl_hours`
pub fn issue_token(user: &User, secret: &str, ttl_hours: i64) -> anyhow::Result<String> {
    let now = chrono::Utc::now();
    let exp = now + chrono::TimeDelta::hours(ttl_hours);

    let claims = Claims {
        sub: user.id.to_string(),
        username: user.username.clone(),
        role: user.role,
        exp: exp.timestamp() as usize,
        iat: now.timestamp() as usize,
    };

    jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| anyhow::anyhow!("token generation error: {}", e))
}

fn decode_token(token: &str, secret: &str) -> Result<Claims, AuthError> {
    jsonwebtoken::decode::<Claims>(
        token,
        &jsonwebtoken::DecodingKey::from_secret(secret.as_bytes()),
        &jsonwebtoken::Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| AuthError::InvalidToken)
}

pub enum AuthError {
    MissingToken,
    InvalidToken,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthError::MissingToken => (StatusCode::UNAUTHORIZED, "Missing authentication token"),
            AuthError::InvalidToken => (StatusCode::UNAUTHORIZED, "Invalid or expired token"),
        };
        (status, Json(ErrorResponse::new(message))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Role) -> User {
        User {
            id: 12,
            username: "dana".to_string(),
            password_hash: String::new(),
            role,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_token_round_trip_carries_role() {
        let token = issue_token(&user(Role::Designer), "secret", 1).unwrap();
        let claims = decode_token(&token, "secret").ok().unwrap();
        assert_eq!(claims.sub, "12");
        assert_eq!(claims.role, Role::Designer);
        assert_eq!(claims.username, "dana");
    }

    #[test]
    fn test_wrong_secret_and_expired_tokens_rejected() {
        let token = issue_token(&user(Role::Admin), "secret", 1).unwrap();
        assert!(decode_token(&token, "other").is_err());

        let expired = issue_token(&user(Role::Admin), "secret", -2).unwrap();
        assert!(decode_token(&expired, "secret").is_err());
    }
}
