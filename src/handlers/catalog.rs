use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::auth::AuthUser;
use crate::models::*;
use crate::AppState;

use super::{created, ApiError};

fn validate(req: &CreateDeviceRequest) -> Result<(), ApiError> {
    if req.model.trim().is_empty() {
        return Err(ApiError::bad_request("model is required"));
    }
    if !req.unit_price.is_finite() || req.unit_price <= 0.0 {
        return Err(ApiError::bad_request("unit_price must be a positive number"));
    }
    if req.port_count == Some(0) {
        return Err(ApiError::bad_request("port_count must be positive when given"));
    }
    Ok(())
}

/// GET /api/catalog
pub async fn list_devices(
    _auth: AuthUser,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<DeviceCatalogEntry>>, ApiError> {
    Ok(Json(state.store.list_devices().await?))
}

/// GET /api/catalog/:id
pub async fn get_device(
    _auth: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<DeviceCatalogEntry>, ApiError> {
    let device = state
        .store
        .get_device(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("Device"))?;
    Ok(Json(device))
}

/// POST /api/catalog
pub async fn create_device(
    auth: AuthUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateDeviceRequest>,
) -> Result<(StatusCode, Json<DeviceCatalogEntry>), ApiError> {
    auth.require_role(Role::Admin)?;
    validate(&req)?;
    let device = state.store.create_device(&req).await?;
    tracing::info!("Catalog entry {} ({}) added", device.id, device.device_type);
    Ok(created(device))
}

/// PUT /api/catalog/:id
pub async fn update_device(
    auth: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<CreateDeviceRequest>,
) -> Result<Json<DeviceCatalogEntry>, ApiError> {
    auth.require_role(Role::Admin)?;
    validate(&req)?;
    Ok(Json(state.store.update_device(&id, &req).await?))
}

/// DELETE /api/catalog/:id
pub async fn delete_device(
    auth: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    auth.require_role(Role::Admin)?;
    state.store.delete_device(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
