use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle status of a planning request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    New,
    Assigned,
    DesignInProgress,
    DesignSubmitted,
    AwaitingClientReview,
    DesignComplete,
    InstallationInProgress,
    Completed,
}

impl RequestStatus {
    pub const ALL: [RequestStatus; 8] = [
        RequestStatus::New,
        RequestStatus::Assigned,
        RequestStatus::DesignInProgress,
        RequestStatus::DesignSubmitted,
        RequestStatus::AwaitingClientReview,
        RequestStatus::DesignComplete,
        RequestStatus::InstallationInProgress,
        RequestStatus::Completed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::New => "new",
            RequestStatus::Assigned => "assigned",
            RequestStatus::DesignInProgress => "design_in_progress",
            RequestStatus::DesignSubmitted => "design_submitted",
            RequestStatus::AwaitingClientReview => "awaiting_client_review",
            RequestStatus::DesignComplete => "design_complete",
            RequestStatus::InstallationInProgress => "installation_in_progress",
            RequestStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RequestStatus::ALL
            .into_iter()
            .find(|st| st.as_str() == s)
            .ok_or_else(|| format!("unknown request status '{}'", s))
    }
}

/// Occupancy of a single room
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomRequirement {
    pub name: String,
    #[serde(default)]
    pub wired_hosts: u32,
    #[serde(default)]
    pub wireless_hosts: u32,
}

/// A department and the rooms it occupies, in submission order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepartmentRequirement {
    pub name: String,
    #[serde(default)]
    pub rooms: Vec<RoomRequirement>,
}

/// Request is the root entity: a client's facility requirements and their progress
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub id: i64,
    pub client_id: i64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site: Option<String>,
    pub requires_installation: bool,
    pub departments: Vec<DepartmentRequirement>,
    pub status: RequestStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_designer_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_installer_id: Option<i64>,
    pub installation_progress: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub installation_notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub installer_completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_verified_at: Option<DateTime<Utc>>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Raw room input; counts are signed so negative values can be reported
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoomInput {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub wired_hosts: Option<i64>,
    #[serde(default)]
    pub wireless_hosts: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DepartmentInput {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub rooms: Vec<RoomInput>,
}

/// SubmitRequirementsRequest is posted by a client to open a request
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitRequirementsRequest {
    pub name: String,
    #[serde(default)]
    pub site: Option<String>,
    #[serde(default)]
    pub requires_installation: bool,
    #[serde(default)]
    pub departments: Vec<DepartmentInput>,
}

/// Fields of a new request after validation
#[derive(Debug, Clone)]
pub struct NewRequest {
    pub client_id: i64,
    pub name: String,
    pub site: Option<String>,
    pub requires_installation: bool,
    pub departments: Vec<DepartmentRequirement>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssignRequest {
    pub designer_id: i64,
    #[serde(default)]
    pub installer_id: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssignInstallerRequest {
    pub installer_id: i64,
}

/// Administrative override of status and/or assignees
#[derive(Debug, Clone, Deserialize)]
pub struct StatusOverrideRequest {
    pub status: RequestStatus,
    #[serde(default)]
    pub designer_id: Option<i64>,
    #[serde(default)]
    pub installer_id: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProgressRequest {
    pub progress: i32,
    #[serde(default)]
    pub notes: Option<String>,
}

/// A side effect that failed after its transition committed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub effect: String,
    pub error: String,
}

/// Result of a caller-facing workflow operation
#[derive(Debug, Clone, Serialize)]
pub struct TransitionResponse {
    pub request: Request,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}
