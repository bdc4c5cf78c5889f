use axum::{extract::State, Json};
use std::sync::Arc;

use crate::auth::{issue_token, AuthUser};
use crate::models::{LoginRequest, LoginResponse, User};
use crate::AppState;

use super::ApiError;

/// POST /api/auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    if req.username.is_empty() || req.password.is_empty() {
        return Err(ApiError::bad_request("username and password are required"));
    }

    let user = state
        .store
        .get_user_by_username(&req.username)
        .await
        .map_err(|_| ApiError::internal("database error"))?
        .ok_or_else(|| ApiError::unauthorized("invalid credentials"))?;

    let password = req.password.clone();
    let hash = user.password_hash.clone();
    let valid = tokio::task::spawn_blocking(move || bcrypt::verify(&password, &hash))
        .await
        .map_err(|_| ApiError::internal("password verification error"))?
        .map_err(|_| ApiError::internal("password verification error"))?;

    if !valid {
        tracing::warn!("Failed login for '{}'", req.username);
        return Err(ApiError::unauthorized("invalid credentials"));
    }

    let token = issue_token(&user, &state.config.jwt_secret, state.config.token_ttl_hours)
        .map_err(|e| ApiError::internal(e.to_string()))?;

    Ok(Json(LoginResponse {
        token,
        username: user.username,
        role: user.role,
    }))
}

/// GET /api/auth/me
pub async fn me(
    auth: AuthUser,
    State(state): State<Arc<AppState>>,
) -> Result<Json<User>, ApiError> {
    let user = state
        .store
        .get_user(auth.actor.user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;
    Ok(Json(user))
}
