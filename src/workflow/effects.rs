use std::fmt;

use super::{Command, EffectSpec};
use crate::models::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    User(i64),
    /// Every user holding the role
    Role(Role),
}

impl fmt::Display for Recipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Recipient::User(id) => write!(f, "user {}", id),
            Recipient::Role(role) => write!(f, "all {}s", role),
        }
    }
}

/// Work to run after a transition has been committed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Notify {
        recipient: Recipient,
        request_id: i64,
        kind: NotificationKind,
        title: String,
        message: String,
    },
    RenderReport {
        request_id: i64,
    },
}

impl Effect {
    /// Short description used when reporting a failed effect
    pub fn describe(&self) -> String {
        match self {
            Effect::Notify { recipient, kind, .. } => format!("notify {} ({})", recipient, kind),
            Effect::RenderReport { request_id } => format!("render report for request {}", request_id),
        }
    }
}

pub(super) fn resolve(spec: EffectSpec, command: &Command, before: &Request, after: &Request) -> Vec<Effect> {
    use NotificationKind as N;

    match spec {
        EffectSpec::NotifyAssignees => {
            let ids = match command {
                Command::Assign { designer, installer } => {
                    let mut ids = vec![designer.user_id];
                    ids.extend(installer.map(|i| i.user_id));
                    ids
                }
                Command::AssignInstaller { installer } => vec![installer.user_id],
                _ => vec![],
            };
            ids.into_iter()
                .map(|id| notify(Recipient::User(id), N::Assignment, after))
                .collect()
        }
        EffectSpec::NotifyAdmins(kind) => vec![notify(Recipient::Role(Role::Admin), kind, after)],
        EffectSpec::NotifyClient(kind) => vec![notify(Recipient::User(after.client_id), kind, after)],
        EffectSpec::NotifyInstaller(kind) => after
            .assigned_installer_id
            .map(|id| notify(Recipient::User(id), kind, after))
            .into_iter()
            .collect(),
        EffectSpec::NotifyClientIfCompleted if after.status == RequestStatus::Completed => {
            vec![notify(Recipient::User(after.client_id), N::ProjectCompleted, after)]
        }
        EffectSpec::NotifyInstallerIfStarted
            if after.status == RequestStatus::InstallationInProgress
                && before.status != RequestStatus::InstallationInProgress =>
        {
            after
                .assigned_installer_id
                .map(|id| notify(Recipient::User(id), N::InstallationStarted, after))
                .into_iter()
                .collect()
        }
        EffectSpec::RenderReport => vec![Effect::RenderReport { request_id: after.id }],
        EffectSpec::NotifyClientIfCompleted | EffectSpec::NotifyInstallerIfStarted => vec![],
    }
}

pub(super) fn notify(recipient: Recipient, kind: NotificationKind, request: &Request) -> Effect {
    let name = &request.name;
    let (title, message) = match kind {
        NotificationKind::Assignment => (
            "New assignment",
            format!("You have been assigned to request '{}'", name),
        ),
        NotificationKind::DesignReview => (
            "Design ready for review",
            format!("A design for '{}' was submitted for review", name),
        ),
        NotificationKind::DesignApproved => (
            "Design approved",
            format!("The design for '{}' is ready for your review", name),
        ),
        NotificationKind::ClientAcceptance => (
            "Design accepted",
            format!("The client accepted the design for '{}'", name),
        ),
        NotificationKind::ProjectCompleted => ("Project completed", format!("'{}' is complete", name)),
        NotificationKind::InstallationStarted => (
            "Installation started",
            format!("Installation for '{}' can begin", name),
        ),
        NotificationKind::InstallationProgress => (
            "Installation progress",
            format!(
                "Installation for '{}' is {}% complete",
                name, request.installation_progress
            ),
        ),
        NotificationKind::InstallationCompleted => (
            "Installation completed",
            format!("Installation for '{}' was reported complete; please verify", name),
        ),
        NotificationKind::InstallationVerified => (
            "Installation verified",
            format!("The client verified the installation for '{}'", name),
        ),
    };

    Effect::Notify {
        recipient,
        request_id: request.id,
        kind,
        title: title.to_string(),
        message,
    }
}
