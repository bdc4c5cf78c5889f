use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse},
    Json,
};
use std::sync::Arc;

use crate::auth::AuthUser;
use crate::models::*;
use crate::services::report_path;
use crate::workflow::Command;
use crate::AppState;

use super::{created, ApiError};

async fn visible_design(state: &AppState, auth: &AuthUser, id: i64) -> Result<Design, ApiError> {
    let (_, design) = state.workflow.get_visible(&auth.actor, id).await?;
    design.ok_or_else(|| ApiError::not_found("Design"))
}

/// POST /api/requests/:id/design
pub async fn generate_design(
    auth: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<(StatusCode, Json<DesignResponse>), ApiError> {
    Ok(created(state.workflow.generate_design(&auth.actor, id).await?))
}

/// GET /api/requests/:id/design
pub async fn get_design(
    auth: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Design>, ApiError> {
    Ok(Json(visible_design(&state, &auth, id).await?))
}

/// GET /api/requests/:id/design/topology.dot
pub async fn get_topology_dot(
    auth: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let design = visible_design(&state, &auth, id).await?;
    Ok((
        [(header::CONTENT_TYPE, "text/vnd.graphviz; charset=utf-8")],
        design.topology.to_dot(),
    ))
}

/// GET /api/requests/:id/design/report
pub async fn get_report(
    auth: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Html<String>, ApiError> {
    let design = visible_design(&state, &auth, id).await?;
    if !design.has_report() {
        return Err(ApiError::not_found("Report"));
    }
    let path = report_path(&state.config.reports_dir, id);
    match tokio::fs::read_to_string(&path).await {
        Ok(html) => Ok(Html(html)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ApiError::not_found("Report")),
        Err(e) => {
            tracing::error!("Failed to read report {}: {}", path.display(), e);
            Err(ApiError::internal("failed to read report"))
        }
    }
}

/// POST /api/requests/:id/design/report
pub async fn render_report(
    auth: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<DesignResponse>, ApiError> {
    Ok(Json(state.workflow.render_report(&auth.actor, id).await?))
}

/// POST /api/requests/:id/design/submit
pub async fn submit_design(
    auth: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<TransitionResponse>, ApiError> {
    Ok(Json(state.workflow.execute(&auth.actor, id, Command::SubmitDesign).await?))
}

/// POST /api/requests/:id/design/approve
pub async fn approve_design(
    auth: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<TransitionResponse>, ApiError> {
    Ok(Json(state.workflow.execute(&auth.actor, id, Command::ApproveDesign).await?))
}

/// POST /api/requests/:id/design/accept
pub async fn accept_design(
    auth: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<TransitionResponse>, ApiError> {
    Ok(Json(state.workflow.execute(&auth.actor, id, Command::AcceptDesign).await?))
}
