pub mod effects;
pub mod reports;
pub mod workflow;

pub use effects::StoreNotifier;
pub use reports::{report_path, HtmlReportRenderer};
pub use workflow::WorkflowService;

use crate::db::{ConflictError, NotFoundError};
use crate::planner::PlanError;
use crate::workflow::WorkflowError;

/// Failure of a caller-facing operation
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    #[error("{0}")]
    NotFound(String),

    #[error("report rendering failed: {0}")]
    Render(String),

    #[error(transparent)]
    Internal(anyhow::Error),
}

impl From<anyhow::Error> for ServiceError {
    fn from(err: anyhow::Error) -> Self {
        if let Some(nf) = err.downcast_ref::<NotFoundError>() {
            return Self::NotFound(nf.to_string());
        }
        // A lost compare-and-set means the request no longer satisfies the
        // transition that was evaluated against it.
        if let Some(c) = err.downcast_ref::<ConflictError>() {
            return Self::Workflow(WorkflowError::Precondition(c.message.clone()));
        }
        Self::Internal(err)
    }
}
