use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;

use crate::auth::AuthUser;
use crate::models::*;
use crate::workflow::Command;
use crate::AppState;

use super::ApiError;

/// POST /api/requests/:id/installation/progress
pub async fn update_progress(
    auth: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<ProgressRequest>,
) -> Result<Json<TransitionResponse>, ApiError> {
    let notes = req.notes.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
    let command = Command::UpdateProgress {
        progress: req.progress,
        notes,
    };
    Ok(Json(state.workflow.execute(&auth.actor, id, command).await?))
}

/// POST /api/requests/:id/installation/complete
pub async fn complete_installation(
    auth: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<TransitionResponse>, ApiError> {
    Ok(Json(
        state
            .workflow
            .execute(&auth.actor, id, Command::CompleteInstallation)
            .await?,
    ))
}

/// POST /api/requests/:id/installation/verify
pub async fn verify_installation(
    auth: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<TransitionResponse>, ApiError> {
    Ok(Json(
        state
            .workflow
            .execute(&auth.actor, id, Command::VerifyInstallation)
            .await?,
    ))
}
