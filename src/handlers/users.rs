use std::sync::Arc;
use axum::{extract::{Path, State}, http::StatusCode, Json};
use crate::{auth::AuthUser, models::*, handlers::{ApiError, created}, AppState};

async fn hash_password(password: String) -> Result<String, ApiError> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, bcrypt::DEFAULT_COST))
        .await
        .map_err(|e| ApiError::internal(format!("Task join error: {}", e)))?
        .map_err(|e| ApiError::internal(format!("Failed to hash password: {}", e)))
}

pub async fn list_users(
    auth: AuthUser,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<User>>, ApiError> {
    auth.require_role(Role::Admin)?;
    let users = state.store.list_users().await?;
    Ok(Json(users))
}

pub async fn get_user(
    auth: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<User>, ApiError> {
    auth.require_role(Role::Admin)?;
    let user = state.store.get_user(id).await?
        .ok_or_else(|| ApiError::not_found("User"))?;
    Ok(Json(user))
}

pub async fn create_user(
    auth: AuthUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    auth.require_role(Role::Admin)?;
    if req.username.trim().is_empty() || req.password.is_empty() {
        return Err(ApiError::bad_request("username and password are required"));
    }
    let password_hash = hash_password(req.password).await?;
    let user = state.store.create_user(req.username.trim(), &password_hash, req.role).await?;
    tracing::info!("User '{}' created with role {}", user.username, user.role);
    Ok(created(user))
}

pub async fn update_user(
    auth: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<Json<User>, ApiError> {
    auth.require_role(Role::Admin)?;
    if req.username.trim().is_empty() {
        return Err(ApiError::bad_request("username is required"));
    }
    if id == auth.actor.user_id && req.role != Role::Admin {
        return Err(ApiError::bad_request("Cannot remove your own admin role"));
    }
    let password_hash = match req.password.filter(|p| !p.is_empty()) {
        Some(p) => Some(hash_password(p).await?),
        None => None,
    };
    let user = state
        .store
        .update_user(id, req.username.trim(), password_hash.as_deref(), req.role)
        .await?;
    Ok(Json(user))
}

pub async fn delete_user(
    auth: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    auth.require_role(Role::Admin)?;
    // Prevent self-deletion
    if auth.actor.user_id == id {
        return Err(ApiError::bad_request("Cannot delete your own account"));
    }
    state.store.delete_user(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
