use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::auth::AuthUser;
use crate::models::Notification;
use crate::AppState;

use super::{ApiError, MessageResponse};

#[derive(Debug, Deserialize)]
pub struct NotificationQuery {
    #[serde(default)]
    pub unread: bool,
}

/// GET /api/notifications
pub async fn list_notifications(
    auth: AuthUser,
    State(state): State<Arc<AppState>>,
    Query(query): Query<NotificationQuery>,
) -> Result<Json<Vec<Notification>>, ApiError> {
    Ok(Json(
        state
            .store
            .list_notifications(auth.actor.user_id, query.unread)
            .await?,
    ))
}

/// GET /api/notifications/unread-count
pub async fn unread_count(
    auth: AuthUser,
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let count = state.store.count_unread_notifications(auth.actor.user_id).await?;
    Ok(Json(serde_json::json!({ "unread": count })))
}

/// POST /api/notifications/:id/read
pub async fn mark_read(
    auth: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.store.mark_notification_read(id, auth.actor.user_id).await?;
    Ok(MessageResponse::new("notification marked read"))
}

/// POST /api/notifications/read-all
pub async fn mark_all_read(
    auth: AuthUser,
    State(state): State<Arc<AppState>>,
) -> Result<Json<MessageResponse>, ApiError> {
    let count = state.store.mark_all_notifications_read(auth.actor.user_id).await?;
    Ok(MessageResponse::new(format!("{} notifications marked read", count)))
}
