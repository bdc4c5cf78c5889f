pub mod auth;
pub mod catalog;
pub mod designs;
pub mod installation;
pub mod notifications;
pub mod requests;
pub mod users;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use crate::planner::PlanError;
use crate::services::ServiceError;
use crate::workflow::WorkflowError;
use crate::AppState;

/// Error response: {"error": "message"} plus the individual problems when there are several
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: Vec::new(),
        }
    }
}

/// API error type
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    details: Vec<String>,
}

impl ApiError {
    fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
            details: Vec::new(),
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }

    pub fn not_found(resource: &str) -> Self {
        Self::new(StatusCode::NOT_FOUND, format!("{} not found", resource))
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, msg)
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, msg)
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, msg)
    }

    pub fn unprocessable(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, msg)
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    fn with_details(mut self, details: Vec<String>) -> Self {
        self.details = details;
        self
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
                details: self.details,
            }),
        )
            .into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        // Check typed store errors first (no fragile string matching)
        if let Some(nf) = err.downcast_ref::<crate::db::NotFoundError>() {
            return Self::not_found(&format!("{} {}", nf.resource, nf.id));
        }
        if let Some(c) = err.downcast_ref::<crate::db::ConflictError>() {
            return Self::conflict(c.message.clone());
        }
        tracing::error!("Internal error: {:#}", err);
        Self::internal(err.to_string())
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        let message = err.to_string();
        match err {
            ServiceError::Plan(PlanError::Validation { issues }) => Self::bad_request(message)
                .with_details(issues.iter().map(|i| i.to_string()).collect()),
            ServiceError::Plan(PlanError::CatalogIncomplete { issues }) => Self::unprocessable(message)
                .with_details(issues.iter().map(|i| i.to_string()).collect()),
            ServiceError::Plan(PlanError::AddressSpaceExhausted { .. }) => Self::unprocessable(message),
            ServiceError::Workflow(WorkflowError::Authorization(_)) => Self::forbidden(message),
            ServiceError::Workflow(WorkflowError::Precondition(_)) => Self::conflict(message),
            ServiceError::NotFound(msg) => Self::new(StatusCode::NOT_FOUND, msg),
            ServiceError::Render(_) => Self::new(StatusCode::BAD_GATEWAY, message),
            ServiceError::Internal(e) => e.into(),
        }
    }
}

/// Message response for simple status messages
#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(msg: impl Into<String>) -> Json<Self> {
        Json(Self { message: msg.into() })
    }
}

/// Response helper: return 201 Created with JSON body
pub fn created<T: Serialize>(item: T) -> (StatusCode, Json<T>) {
    (StatusCode::CREATED, Json(item))
}

/// Healthcheck endpoint: returns 200 OK with status, 503 if the database is unreachable
pub async fn healthcheck(State(state): State<Arc<AppState>>) -> (StatusCode, Json<serde_json::Value>) {
    let db_ok = state.store.ping().await.is_ok();
    let ws_clients = match &state.ws_hub {
        Some(hub) => hub.client_count().await,
        None => 0,
    };
    let status = if db_ok { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (
        status,
        Json(serde_json::json!({
            "status": if db_ok { "ok" } else { "degraded" },
            "service": "campus-planner",
            "database": db_ok,
            "ws_clients": ws_clients,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        })),
    )
}
