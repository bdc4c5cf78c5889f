use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Notification type tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Assignment,
    DesignReview,
    DesignApproved,
    ClientAcceptance,
    ProjectCompleted,
    InstallationStarted,
    InstallationProgress,
    InstallationCompleted,
    InstallationVerified,
}

impl NotificationKind {
    pub const ALL: [NotificationKind; 9] = [
        NotificationKind::Assignment,
        NotificationKind::DesignReview,
        NotificationKind::DesignApproved,
        NotificationKind::ClientAcceptance,
        NotificationKind::ProjectCompleted,
        NotificationKind::InstallationStarted,
        NotificationKind::InstallationProgress,
        NotificationKind::InstallationCompleted,
        NotificationKind::InstallationVerified,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Assignment => "assignment",
            NotificationKind::DesignReview => "design_review",
            NotificationKind::DesignApproved => "design_approved",
            NotificationKind::ClientAcceptance => "client_acceptance",
            NotificationKind::ProjectCompleted => "project_completed",
            NotificationKind::InstallationStarted => "installation_started",
            NotificationKind::InstallationProgress => "installation_progress",
            NotificationKind::InstallationCompleted => "installation_completed",
            NotificationKind::InstallationVerified => "installation_verified",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NotificationKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("unknown notification kind '{}'", s))
    }
}

/// Notification delivered to a single user about a request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    pub user_id: i64,
    pub request_id: i64,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}
