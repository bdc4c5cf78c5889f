use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use crate::auth::AuthUser;
use crate::models::*;
use crate::workflow::{allowed_actions, Action};
use crate::AppState;

use super::{created, ApiError};

/// A request with its design and the actions the caller may attempt next
#[derive(Serialize)]
pub struct RequestDetail {
    pub request: Request,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub design: Option<Design>,
    pub allowed_actions: Vec<Action>,
}

/// GET /api/requests
pub async fn list_requests(
    auth: AuthUser,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Request>>, ApiError> {
    Ok(Json(state.workflow.list_visible(&auth.actor).await?))
}

/// GET /api/requests/:id
pub async fn get_request(
    auth: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<RequestDetail>, ApiError> {
    let (request, design) = state.workflow.get_visible(&auth.actor, id).await?;
    let allowed_actions = allowed_actions(request.status, auth.actor.role);
    Ok(Json(RequestDetail {
        request,
        design,
        allowed_actions,
    }))
}

/// POST /api/requests
pub async fn submit_requirements(
    auth: AuthUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<SubmitRequirementsRequest>,
) -> Result<(StatusCode, Json<Request>), ApiError> {
    let request = state.workflow.submit_requirements(&auth.actor, &req).await?;
    Ok(created(request))
}

/// POST /api/requests/:id/assign
pub async fn assign(
    auth: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<AssignRequest>,
) -> Result<Json<TransitionResponse>, ApiError> {
    Ok(Json(state.workflow.assign(&auth.actor, id, &req).await?))
}

/// POST /api/requests/:id/installer
pub async fn assign_installer(
    auth: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<AssignInstallerRequest>,
) -> Result<Json<TransitionResponse>, ApiError> {
    Ok(Json(state.workflow.assign_installer(&auth.actor, id, &req).await?))
}

/// PUT /api/requests/:id/status
pub async fn override_status(
    auth: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<StatusOverrideRequest>,
) -> Result<Json<TransitionResponse>, ApiError> {
    Ok(Json(state.workflow.override_status(&auth.actor, id, &req).await?))
}
