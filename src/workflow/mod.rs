//! Request lifecycle state machine.
//!
//! `TRANSITIONS` is the single source of truth for which role may perform which
//! action from which status. `evaluate` checks a command against the table and
//! returns the status change, field updates and side effects to perform; it never
//! touches the store. The caller applies the update atomically and runs the
//! effects afterwards.

mod effects;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

use crate::models::*;

pub use effects::{Effect, Recipient};

/// The authenticated user performing an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: i64,
    pub role: Role,
}

/// A user proposed for assignment, with the role loaded from the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assignee {
    pub user_id: i64,
    pub role: Role,
}

impl From<&User> for Assignee {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id,
            role: user.role,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Assign {
        designer: Assignee,
        installer: Option<Assignee>,
    },
    AssignInstaller {
        installer: Assignee,
    },
    GenerateDesign,
    RenderReport,
    SubmitDesign,
    ApproveDesign,
    AcceptDesign,
    UpdateProgress {
        progress: i32,
        notes: Option<String>,
    },
    CompleteInstallation,
    VerifyInstallation,
}

impl Command {
    pub fn action(&self) -> Action {
        match self {
            Command::Assign { .. } => Action::Assign,
            Command::AssignInstaller { .. } => Action::AssignInstaller,
            Command::GenerateDesign => Action::GenerateDesign,
            Command::RenderReport => Action::RenderReport,
            Command::SubmitDesign => Action::SubmitDesign,
            Command::ApproveDesign => Action::ApproveDesign,
            Command::AcceptDesign => Action::AcceptDesign,
            Command::UpdateProgress { .. } => Action::UpdateProgress,
            Command::CompleteInstallation => Action::CompleteInstallation,
            Command::VerifyInstallation => Action::VerifyInstallation,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Assign,
    AssignInstaller,
    GenerateDesign,
    RenderReport,
    SubmitDesign,
    ApproveDesign,
    AcceptDesign,
    UpdateProgress,
    CompleteInstallation,
    VerifyInstallation,
}

impl Action {
    pub const ALL: [Action; 10] = [
        Action::Assign,
        Action::AssignInstaller,
        Action::GenerateDesign,
        Action::RenderReport,
        Action::SubmitDesign,
        Action::ApproveDesign,
        Action::AcceptDesign,
        Action::UpdateProgress,
        Action::CompleteInstallation,
        Action::VerifyInstallation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Assign => "assign",
            Action::AssignInstaller => "assign_installer",
            Action::GenerateDesign => "generate_design",
            Action::RenderReport => "render_report",
            Action::SubmitDesign => "submit_design",
            Action::ApproveDesign => "approve_design",
            Action::AcceptDesign => "accept_design",
            Action::UpdateProgress => "update_progress",
            Action::CompleteInstallation => "complete_installation",
            Action::VerifyInstallation => "verify_installation",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a rule leads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    To(RequestStatus),
    Stay,
    /// completed for design-only requests, installation_in_progress when an
    /// installer is assigned, design_complete while one is still pending
    Acceptance,
    /// design_complete advances to installation_in_progress, other statuses stay
    InstallerAssignment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Guard {
    AssignedDesigner,
    AssignedInstaller,
    RequestClient,
    AssigneeRoles,
    RequiresInstallation,
    NoDesign,
    DesignExists,
    ReportExists,
    NotApproved,
    ProgressInRange,
    InstallerComplete,
    NotInstallerComplete,
}

impl Guard {
    /// Identity guards fail with an authorization error, the rest with a precondition error
    fn is_identity(&self) -> bool {
        matches!(
            self,
            Guard::AssignedDesigner | Guard::AssignedInstaller | Guard::RequestClient
        )
    }
}

/// Side effect declared by a rule, resolved against the updated request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectSpec {
    NotifyAssignees,
    NotifyAdmins(NotificationKind),
    NotifyClient(NotificationKind),
    NotifyInstaller(NotificationKind),
    NotifyClientIfCompleted,
    NotifyInstallerIfStarted,
    RenderReport,
}

#[derive(Debug)]
pub struct Rule {
    pub action: Action,
    pub from: &'static [RequestStatus],
    pub role: Role,
    pub target: Target,
    pub guards: &'static [Guard],
    pub effects: &'static [EffectSpec],
}

use NotificationKind as N;
use RequestStatus as S;

pub static TRANSITIONS: &[Rule] = &[
    Rule {
        action: Action::Assign,
        from: &[S::New],
        role: Role::Admin,
        target: Target::To(S::Assigned),
        guards: &[Guard::AssigneeRoles],
        effects: &[EffectSpec::NotifyAssignees],
    },
    Rule {
        action: Action::AssignInstaller,
        from: &[
            S::Assigned,
            S::DesignInProgress,
            S::DesignSubmitted,
            S::AwaitingClientReview,
            S::DesignComplete,
        ],
        role: Role::Admin,
        target: Target::InstallerAssignment,
        guards: &[Guard::RequiresInstallation, Guard::AssigneeRoles],
        effects: &[EffectSpec::NotifyAssignees, EffectSpec::NotifyInstallerIfStarted],
    },
    Rule {
        action: Action::GenerateDesign,
        from: &[S::Assigned],
        role: Role::Designer,
        target: Target::To(S::DesignInProgress),
        guards: &[Guard::AssignedDesigner, Guard::NoDesign],
        effects: &[EffectSpec::RenderReport],
    },
    Rule {
        action: Action::RenderReport,
        from: &[S::DesignInProgress],
        role: Role::Designer,
        target: Target::Stay,
        guards: &[Guard::AssignedDesigner, Guard::DesignExists],
        effects: &[],
    },
    Rule {
        action: Action::SubmitDesign,
        from: &[S::DesignInProgress],
        role: Role::Designer,
        target: Target::To(S::DesignSubmitted),
        guards: &[Guard::AssignedDesigner, Guard::DesignExists, Guard::ReportExists],
        effects: &[EffectSpec::NotifyAdmins(N::DesignReview)],
    },
    Rule {
        action: Action::ApproveDesign,
        from: &[S::DesignSubmitted],
        role: Role::Admin,
        target: Target::To(S::AwaitingClientReview),
        guards: &[Guard::DesignExists, Guard::ReportExists, Guard::NotApproved],
        effects: &[EffectSpec::NotifyClient(N::DesignApproved)],
    },
    Rule {
        action: Action::AcceptDesign,
        from: &[S::AwaitingClientReview],
        role: Role::Client,
        target: Target::Acceptance,
        guards: &[Guard::RequestClient, Guard::DesignExists, Guard::ReportExists],
        effects: &[
            EffectSpec::NotifyAdmins(N::ClientAcceptance),
            EffectSpec::NotifyClientIfCompleted,
            EffectSpec::NotifyInstallerIfStarted,
        ],
    },
    Rule {
        action: Action::UpdateProgress,
        from: &[S::InstallationInProgress],
        role: Role::Installer,
        target: Target::Stay,
        guards: &[
            Guard::AssignedInstaller,
            Guard::NotInstallerComplete,
            Guard::ProgressInRange,
        ],
        effects: &[EffectSpec::NotifyClient(N::InstallationProgress)],
    },
    Rule {
        action: Action::CompleteInstallation,
        from: &[S::InstallationInProgress],
        role: Role::Installer,
        target: Target::Stay,
        guards: &[Guard::AssignedInstaller, Guard::NotInstallerComplete],
        effects: &[
            EffectSpec::NotifyClient(N::InstallationCompleted),
            EffectSpec::NotifyAdmins(N::InstallationCompleted),
        ],
    },
    Rule {
        action: Action::VerifyInstallation,
        from: &[S::InstallationInProgress],
        role: Role::Client,
        target: Target::To(S::Completed),
        guards: &[Guard::RequestClient, Guard::InstallerComplete],
        effects: &[
            EffectSpec::NotifyInstaller(N::InstallationVerified),
            EffectSpec::NotifyAdmins(N::InstallationVerified),
            EffectSpec::NotifyClientIfCompleted,
        ],
    },
];

pub fn rule_for(action: Action) -> Option<&'static Rule> {
    TRANSITIONS.iter().find(|r| r.action == action)
}

/// Actions a role may attempt from a status (guards aside)
pub fn allowed_actions(status: RequestStatus, role: Role) -> Vec<Action> {
    TRANSITIONS
        .iter()
        .filter(|r| r.role == role && r.from.contains(&status))
        .map(|r| r.action)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorkflowError {
    #[error("not authorized: {0}")]
    Authorization(String),

    #[error("precondition failed: {0}")]
    Precondition(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Approval {
    pub approved_by: i64,
    pub approved_at: DateTime<Utc>,
}

/// Field changes that accompany a status change; `None` leaves a field as is
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestUpdate {
    pub assigned_designer_id: Option<i64>,
    pub assigned_installer_id: Option<i64>,
    pub installation_progress: Option<i32>,
    pub installation_notes: Option<String>,
    pub installer_completed_at: Option<DateTime<Utc>>,
    pub client_verified_at: Option<DateTime<Utc>>,
    pub approval: Option<Approval>,
}

impl RequestUpdate {
    pub fn apply(&self, request: &mut Request) {
        if let Some(id) = self.assigned_designer_id {
            request.assigned_designer_id = Some(id);
        }
        if let Some(id) = self.assigned_installer_id {
            request.assigned_installer_id = Some(id);
        }
        if let Some(p) = self.installation_progress {
            request.installation_progress = p;
        }
        if let Some(notes) = &self.installation_notes {
            request.installation_notes = Some(notes.clone());
        }
        if let Some(at) = self.installer_completed_at {
            request.installer_completed_at = Some(at);
        }
        if let Some(at) = self.client_verified_at {
            request.client_verified_at = Some(at);
        }
    }
}

/// An accepted command: what to write and what to do after the write commits
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub request_id: i64,
    pub action: Option<Action>,
    pub from: RequestStatus,
    pub to: RequestStatus,
    /// Version the request must still have when the update is written
    pub expected_version: i64,
    pub update: RequestUpdate,
    pub effects: Vec<Effect>,
}

/// Check `command` against the transition table.
pub fn evaluate(
    request: &Request,
    design: Option<&Design>,
    actor: &Actor,
    command: &Command,
    now: DateTime<Utc>,
) -> Result<Transition, WorkflowError> {
    let action = command.action();
    let rule = rule_for(action)
        .ok_or_else(|| WorkflowError::Precondition(format!("no transition defined for {}", action)))?;

    if actor.role != rule.role {
        return Err(WorkflowError::Authorization(format!(
            "only a {} may {}",
            rule.role,
            action.as_str().replace('_', " ")
        )));
    }

    for guard in rule.guards.iter().filter(|g| g.is_identity()) {
        check_guard(*guard, request, design, actor, command)?;
    }

    if !rule.from.contains(&request.status) {
        return Err(WorkflowError::Precondition(format!(
            "cannot {} while request is {}",
            action.as_str().replace('_', " "),
            request.status
        )));
    }

    for guard in rule.guards.iter().filter(|g| !g.is_identity()) {
        check_guard(*guard, request, design, actor, command)?;
    }

    let update = update_for(command, actor, now);
    let mut after = request.clone();
    update.apply(&mut after);
    after.status = resolve_target(rule.target, &after);

    let mut effects = Vec::new();
    for spec in rule.effects {
        effects.extend(effects::resolve(*spec, command, request, &after));
    }

    Ok(Transition {
        request_id: request.id,
        action: Some(action),
        from: request.status,
        to: after.status,
        expected_version: request.version,
        update,
        effects,
    })
}

/// Administrative override: set status and/or assignees directly.
/// Assignees must still carry the role they are assigned for.
pub fn evaluate_override(
    request: &Request,
    actor: &Actor,
    status: RequestStatus,
    designer: Option<Assignee>,
    installer: Option<Assignee>,
) -> Result<Transition, WorkflowError> {
    if actor.role != Role::Admin {
        return Err(WorkflowError::Authorization(
            "only an admin may override request status".to_string(),
        ));
    }
    check_assignees(request, designer.as_ref(), installer.as_ref())?;

    let update = RequestUpdate {
        assigned_designer_id: designer.map(|d| d.user_id),
        assigned_installer_id: installer.map(|i| i.user_id),
        ..Default::default()
    };
    let effects = designer
        .iter()
        .chain(installer.iter())
        .map(|a| effects::notify(Recipient::User(a.user_id), N::Assignment, request))
        .collect();

    Ok(Transition {
        request_id: request.id,
        action: None,
        from: request.status,
        to: status,
        expected_version: request.version,
        update,
        effects,
    })
}

fn resolve_target(target: Target, after: &Request) -> RequestStatus {
    match target {
        Target::To(status) => status,
        Target::Stay => after.status,
        Target::Acceptance => {
            if !after.requires_installation {
                S::Completed
            } else if after.assigned_installer_id.is_some() {
                S::InstallationInProgress
            } else {
                S::DesignComplete
            }
        }
        Target::InstallerAssignment => match after.status {
            S::DesignComplete => S::InstallationInProgress,
            other => other,
        },
    }
}

fn update_for(command: &Command, actor: &Actor, now: DateTime<Utc>) -> RequestUpdate {
    match command {
        Command::Assign {
            designer,
            installer,
        } => RequestUpdate {
            assigned_designer_id: Some(designer.user_id),
            assigned_installer_id: installer.map(|i| i.user_id),
            ..Default::default()
        },
        Command::AssignInstaller { installer } => RequestUpdate {
            assigned_installer_id: Some(installer.user_id),
            ..Default::default()
        },
        Command::ApproveDesign => RequestUpdate {
            approval: Some(Approval {
                approved_by: actor.user_id,
                approved_at: now,
            }),
            ..Default::default()
        },
        Command::UpdateProgress { progress, notes } => RequestUpdate {
            installation_progress: Some(*progress),
            installation_notes: notes.clone(),
            ..Default::default()
        },
        Command::CompleteInstallation => RequestUpdate {
            installation_progress: Some(100),
            installer_completed_at: Some(now),
            ..Default::default()
        },
        Command::VerifyInstallation => RequestUpdate {
            client_verified_at: Some(now),
            ..Default::default()
        },
        Command::GenerateDesign
        | Command::RenderReport
        | Command::SubmitDesign
        | Command::AcceptDesign => RequestUpdate::default(),
    }
}

fn check_guard(
    guard: Guard,
    request: &Request,
    design: Option<&Design>,
    actor: &Actor,
    command: &Command,
) -> Result<(), WorkflowError> {
    let deny = |msg: &str| Err(WorkflowError::Authorization(msg.to_string()));
    let unmet = |msg: &str| Err(WorkflowError::Precondition(msg.to_string()));

    match guard {
        Guard::AssignedDesigner if request.assigned_designer_id != Some(actor.user_id) => {
            deny("you are not the assigned designer for this request")
        }
        Guard::AssignedInstaller if request.assigned_installer_id != Some(actor.user_id) => {
            deny("you are not the assigned installer for this request")
        }
        Guard::RequestClient if request.client_id != actor.user_id => {
            deny("only the client who submitted this request may do that")
        }
        Guard::AssigneeRoles => match command {
            Command::Assign {
                designer,
                installer,
            } => check_assignees(request, Some(designer), installer.as_ref()),
            Command::AssignInstaller { installer } => check_assignees(request, None, Some(installer)),
            _ => Ok(()),
        },
        Guard::RequiresInstallation if !request.requires_installation => {
            unmet("request does not require installation")
        }
        Guard::NoDesign if design.is_some() => unmet("a design already exists for this request"),
        Guard::DesignExists if design.is_none() => unmet("no design has been generated for this request"),
        Guard::ReportExists if !design.is_some_and(|d| d.has_report()) => {
            unmet("the design report has not been rendered")
        }
        Guard::NotApproved if design.is_some_and(|d| d.approved) => unmet("design is already approved"),
        Guard::ProgressInRange => match command {
            Command::UpdateProgress { progress, .. } if !(0..100).contains(progress) => {
                unmet("progress must be between 0 and 99; report completion instead")
            }
            _ => Ok(()),
        },
        Guard::InstallerComplete if request.installer_completed_at.is_none() => {
            unmet("the installer has not reported completion")
        }
        Guard::NotInstallerComplete if request.installer_completed_at.is_some() => {
            unmet("installation was already reported complete")
        }
        _ => Ok(()),
    }
}

fn check_assignees(
    request: &Request,
    designer: Option<&Assignee>,
    installer: Option<&Assignee>,
) -> Result<(), WorkflowError> {
    if let Some(d) = designer {
        if d.role != Role::Designer {
            return Err(WorkflowError::Precondition(format!(
                "user {} is a {}, not a designer",
                d.user_id, d.role
            )));
        }
    }
    if let Some(i) = installer {
        if !request.requires_installation {
            return Err(WorkflowError::Precondition(
                "request does not require installation".to_string(),
            ));
        }
        if i.role != Role::Installer {
            return Err(WorkflowError::Precondition(format!(
                "user {} is a {}, not an installer",
                i.user_id, i.role
            )));
        }
    }
    Ok(())
}


#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::fixtures::*;
    use super::*;

    fn possible_targets(target: Target, from: RequestStatus) -> Vec<RequestStatus> {
        match target {
            Target::To(s) => vec![s],
            Target::Stay => vec![from],
            Target::Acceptance => vec![S::Completed, S::InstallationInProgress, S::DesignComplete],
            Target::InstallerAssignment if from == S::DesignComplete => vec![S::InstallationInProgress],
            Target::InstallerAssignment => vec![from],
        }
    }

    #[test]
    fn test_table_has_one_rule_per_action() {
        for action in Action::ALL {
            let count = TRANSITIONS.iter().filter(|r| r.action == action).count();
            assert_eq!(count, 1, "{} has {} rules", action, count);
        }
    }

    #[test]
    fn test_every_status_reachable_and_completed_terminal() {
        let mut reached = HashSet::from([S::New]);
        let mut frontier = vec![S::New];
        while let Some(status) = frontier.pop() {
            for rule in TRANSITIONS.iter().filter(|r| r.from.contains(&status)) {
                for next in possible_targets(rule.target, status) {
                    if reached.insert(next) {
                        frontier.push(next);
                    }
                }
            }
        }
        for status in RequestStatus::ALL {
            assert!(reached.contains(&status), "{} unreachable", status);
        }
        assert!(TRANSITIONS.iter().all(|r| !r.from.contains(&S::Completed)));
    }

    #[test]
    fn test_every_status_and_action_pair_is_decided() {
        // Every (status, action, role) either passes the table checks or is
        // rejected with a typed error; nothing panics or falls through.
        for status in RequestStatus::ALL {
            for actor in [ADMIN, DESIGNER, INSTALLER, CLIENT] {
                for command in [
                    Command::GenerateDesign,
                    Command::SubmitDesign,
                    Command::ApproveDesign,
                    Command::AcceptDesign,
                    Command::CompleteInstallation,
                    Command::VerifyInstallation,
                ] {
                    let req = request(status, true);
                    let allowed = allowed_actions(status, actor.role).contains(&command.action());
                    match evaluate(&req, None, &actor, &command, Utc::now()) {
                        Ok(_) => assert!(allowed),
                        Err(WorkflowError::Authorization(_)) | Err(WorkflowError::Precondition(_)) => {}
                    }
                }
            }
        }
    }

    #[test]
    fn test_assign_requires_matching_roles() {
        let req = request(S::New, true);
        let ok = Command::Assign {
            designer: Assignee { user_id: 2, role: Role::Designer },
            installer: Some(Assignee { user_id: 3, role: Role::Installer }),
        };
        let t = evaluate(&req, None, &ADMIN, &ok, Utc::now()).unwrap();
        assert_eq!(t.to, S::Assigned);
        assert_eq!(t.update.assigned_installer_id, Some(3));
        assert_eq!(t.effects.len(), 2);

        let wrong = Command::Assign {
            designer: Assignee { user_id: 4, role: Role::Client },
            installer: None,
        };
        assert!(matches!(
            evaluate(&req, None, &ADMIN, &wrong, Utc::now()),
            Err(WorkflowError::Precondition(_))
        ));
        assert!(matches!(
            evaluate(&req, None, &DESIGNER, &ok, Utc::now()),
            Err(WorkflowError::Authorization(_))
        ));
    }

    #[test]
    fn test_installer_rejected_for_design_only_request() {
        let req = request(S::New, false);
        let cmd = Command::Assign {
            designer: Assignee { user_id: 2, role: Role::Designer },
            installer: Some(Assignee { user_id: 3, role: Role::Installer }),
        };
        assert!(matches!(
            evaluate(&req, None, &ADMIN, &cmd, Utc::now()),
            Err(WorkflowError::Precondition(_))
        ));
    }

    #[test]
    fn test_generate_is_single_shot() {
        let req = request(S::Assigned, false);
        let t = evaluate(&req, None, &DESIGNER, &Command::GenerateDesign, Utc::now()).unwrap();
        assert_eq!(t.to, S::DesignInProgress);
        assert_eq!(t.effects, vec![Effect::RenderReport { request_id: 7 }]);

        let existing = design(false, false);
        let err = evaluate(&req, Some(&existing), &DESIGNER, &Command::GenerateDesign, Utc::now()).unwrap_err();
        assert_eq!(
            err,
            WorkflowError::Precondition("a design already exists for this request".to_string())
        );
    }

    #[test]
    fn test_submit_by_other_designer_is_unauthorized() {
        let req = request(S::DesignInProgress, false);
        let other = Actor { user_id: 99, role: Role::Designer };
        let d = design(true, false);
        let err = evaluate(&req, Some(&d), &other, &Command::SubmitDesign, Utc::now()).unwrap_err();
        assert!(matches!(err, WorkflowError::Authorization(_)));
    }

    #[test]
    fn test_submit_requires_report_and_notifies_admins() {
        let req = request(S::DesignInProgress, false);
        let without = design(false, false);
        assert!(matches!(
            evaluate(&req, Some(&without), &DESIGNER, &Command::SubmitDesign, Utc::now()),
            Err(WorkflowError::Precondition(_))
        ));

        let with = design(true, false);
        let t = evaluate(&req, Some(&with), &DESIGNER, &Command::SubmitDesign, Utc::now()).unwrap();
        assert_eq!(t.to, S::DesignSubmitted);
        assert!(matches!(
            t.effects.as_slice(),
            [Effect::Notify { recipient: Recipient::Role(Role::Admin), kind: N::DesignReview, .. }]
        ));
    }

    #[test]
    fn test_approve_stamps_approval() {
        let req = request(S::DesignSubmitted, false);
        let now = Utc::now();
        let t = evaluate(&req, Some(&design(true, false)), &ADMIN, &Command::ApproveDesign, now).unwrap();
        assert_eq!(t.to, S::AwaitingClientReview);
        assert_eq!(t.update.approval, Some(Approval { approved_by: ADMIN.user_id, approved_at: now }));
        assert!(matches!(
            t.effects.as_slice(),
            [Effect::Notify { recipient: Recipient::User(4), kind: N::DesignApproved, .. }]
        ));

        let err = evaluate(&req, Some(&design(true, true)), &ADMIN, &Command::ApproveDesign, now).unwrap_err();
        assert_eq!(err, WorkflowError::Precondition("design is already approved".to_string()));
    }

    #[test]
    fn test_acceptance_branches() {
        let d = design(true, true);

        let design_only = request(S::AwaitingClientReview, false);
        let t = evaluate(&design_only, Some(&d), &CLIENT, &Command::AcceptDesign, Utc::now()).unwrap();
        assert_eq!(t.to, S::Completed);
        assert!(t.effects.iter().any(|e| matches!(e, Effect::Notify { kind: N::ProjectCompleted, .. })));

        let pending = request(S::AwaitingClientReview, true);
        let t = evaluate(&pending, Some(&d), &CLIENT, &Command::AcceptDesign, Utc::now()).unwrap();
        assert_eq!(t.to, S::DesignComplete);

        let mut staffed = request(S::AwaitingClientReview, true);
        staffed.assigned_installer_id = Some(INSTALLER.user_id);
        let t = evaluate(&staffed, Some(&d), &CLIENT, &Command::AcceptDesign, Utc::now()).unwrap();
        assert_eq!(t.to, S::InstallationInProgress);
        assert!(t.effects.iter().any(|e| matches!(
            e,
            Effect::Notify { recipient: Recipient::User(3), kind: N::InstallationStarted, .. }
        )));

        let stranger = Actor { user_id: 50, role: Role::Client };
        assert!(matches!(
            evaluate(&staffed, Some(&d), &stranger, &Command::AcceptDesign, Utc::now()),
            Err(WorkflowError::Authorization(_))
        ));
    }

    #[test]
    fn test_assigning_installer_starts_pending_installation() {
        let req = request(S::DesignComplete, true);
        let cmd = Command::AssignInstaller {
            installer: Assignee { user_id: 3, role: Role::Installer },
        };
        let t = evaluate(&req, None, &ADMIN, &cmd, Utc::now()).unwrap();
        assert_eq!(t.to, S::InstallationInProgress);
        let kinds: Vec<_> = t
            .effects
            .iter()
            .filter_map(|e| match e {
                Effect::Notify { kind, .. } => Some(*kind),
                _ => None,
            })
            .collect();
        assert_eq!(kinds, vec![N::Assignment, N::InstallationStarted]);

        let early = request(S::Assigned, true);
        assert_eq!(evaluate(&early, None, &ADMIN, &cmd, Utc::now()).unwrap().to, S::Assigned);
    }

    #[test]
    fn test_installation_completion_then_verification() {
        let mut req = request(S::InstallationInProgress, true);
        req.assigned_installer_id = Some(INSTALLER.user_id);

        assert!(matches!(
            evaluate(&req, None, &CLIENT, &Command::VerifyInstallation, Utc::now()),
            Err(WorkflowError::Precondition(_))
        ));

        let progress = Command::UpdateProgress { progress: 100, notes: None };
        assert!(matches!(
            evaluate(&req, None, &INSTALLER, &progress, Utc::now()),
            Err(WorkflowError::Precondition(_))
        ));

        let now = Utc::now();
        let t = evaluate(&req, None, &INSTALLER, &Command::CompleteInstallation, now).unwrap();
        assert_eq!(t.to, S::InstallationInProgress);
        assert_eq!(t.update.installer_completed_at, Some(now));
        assert_eq!(t.update.installation_progress, Some(100));

        t.update.apply(&mut req);
        assert!(matches!(
            evaluate(&req, None, &INSTALLER, &Command::CompleteInstallation, now),
            Err(WorkflowError::Precondition(_))
        ));
        let t = evaluate(&req, None, &CLIENT, &Command::VerifyInstallation, now).unwrap();
        assert_eq!(t.to, S::Completed);
        assert_eq!(t.update.client_verified_at, Some(now));
    }

    #[test]
    fn test_override_is_admin_only_and_checks_roles() {
        let req = request(S::DesignSubmitted, true);
        assert!(matches!(
            evaluate_override(&req, &DESIGNER, S::Completed, None, None),
            Err(WorkflowError::Authorization(_))
        ));
        let bad = Assignee { user_id: 4, role: Role::Client };
        assert!(matches!(
            evaluate_override(&req, &ADMIN, S::Assigned, Some(bad), None),
            Err(WorkflowError::Precondition(_))
        ));
        let t = evaluate_override(
            &req,
            &ADMIN,
            S::Assigned,
            Some(Assignee { user_id: 9, role: Role::Designer }),
            None,
        )
        .unwrap();
        assert_eq!(t.to, S::Assigned);
        assert_eq!(t.action, None);
        assert_eq!(t.update.assigned_designer_id, Some(9));
    }

    #[test]
    fn test_allowed_actions() {
        assert_eq!(allowed_actions(S::New, Role::Admin), vec![Action::Assign]);
        assert_eq!(
            allowed_actions(S::DesignInProgress, Role::Designer),
            vec![Action::RenderReport, Action::SubmitDesign]
        );
        assert!(allowed_actions(S::Completed, Role::Admin).is_empty());
    }
}
