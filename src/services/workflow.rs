use chrono::Utc;
use std::sync::Arc;

use super::effects::{EffectRunner, Notifier};
use super::reports::ReportRenderer;
use super::ServiceError;
use crate::db::Store;
use crate::models::*;
use crate::planner::{self, FieldIssue, PlanError};
use crate::workflow::{self, Actor, Assignee, Command, Transition, WorkflowError};
use crate::ws::Hub;

/// Caller-facing request operations.
///
/// Every state change goes through the transition table, is written with a
/// compare-and-set on the request version, and only then has its effects run.
pub struct WorkflowService {
    store: Store,
    effects: EffectRunner,
    ws_hub: Option<Arc<Hub>>,
}

impl WorkflowService {
    pub fn new(
        store: Store,
        notifier: Arc<dyn Notifier>,
        renderer: Arc<dyn ReportRenderer>,
        ws_hub: Option<Arc<Hub>>,
    ) -> Self {
        Self {
            effects: EffectRunner::new(store.clone(), notifier, renderer),
            store,
            ws_hub,
        }
    }

    /// Open a new request from a client's facility requirements
    pub async fn submit_requirements(
        &self,
        actor: &Actor,
        req: &SubmitRequirementsRequest,
    ) -> Result<Request, ServiceError> {
        if actor.role != Role::Client {
            return Err(WorkflowError::Authorization("only a client may submit requirements".to_string()).into());
        }

        let mut issues = Vec::new();
        if req.name.trim().is_empty() {
            issues.push(FieldIssue::new("name", "name is required"));
        }
        let departments = match planner::validate_requirements(&req.departments) {
            Ok(departments) => departments,
            Err(PlanError::Validation { issues: more }) => {
                issues.extend(more);
                Vec::new()
            }
            Err(other) => return Err(other.into()),
        };
        if !issues.is_empty() {
            return Err(PlanError::Validation { issues }.into());
        }

        let request = self
            .store
            .create_request(&NewRequest {
                client_id: actor.user_id,
                name: req.name.trim().to_string(),
                site: req.site.as_ref().map(|s| s.trim().to_string()).filter(|s| !s.is_empty()),
                requires_installation: req.requires_installation,
                departments,
            })
            .await?;

        tracing::info!(
            "Request {} '{}' submitted by user {} ({} departments)",
            request.id,
            request.name,
            actor.user_id,
            request.departments.len()
        );
        self.broadcast_request(&request).await;
        Ok(request)
    }

    /// A request and its design, if the actor may see them
    pub async fn get_visible(&self, actor: &Actor, request_id: i64) -> Result<(Request, Option<Design>), ServiceError> {
        let (request, design) = self.load(request_id).await?;
        let visible = match actor.role {
            Role::Admin => true,
            Role::Client => request.client_id == actor.user_id,
            Role::Designer => request.assigned_designer_id == Some(actor.user_id),
            Role::Installer => request.assigned_installer_id == Some(actor.user_id),
        };
        if !visible {
            return Err(WorkflowError::Authorization("you are not a participant in this request".to_string()).into());
        }
        Ok((request, design))
    }

    pub async fn list_visible(&self, actor: &Actor) -> Result<Vec<Request>, ServiceError> {
        Ok(self.store.list_requests_for(actor.role, actor.user_id).await?)
    }

    /// Assign a designer and optionally an installer to a new request
    pub async fn assign(
        &self,
        actor: &Actor,
        request_id: i64,
        req: &AssignRequest,
    ) -> Result<TransitionResponse, ServiceError> {
        let designer = self.assignee(req.designer_id).await?;
        let installer = match req.installer_id {
            Some(id) => Some(self.assignee(id).await?),
            None => None,
        };
        self.execute(actor, request_id, Command::Assign { designer, installer })
            .await
    }

    pub async fn assign_installer(
        &self,
        actor: &Actor,
        request_id: i64,
        req: &AssignInstallerRequest,
    ) -> Result<TransitionResponse, ServiceError> {
        let installer = self.assignee(req.installer_id).await?;
        self.execute(actor, request_id, Command::AssignInstaller { installer })
            .await
    }

    /// Evaluate and apply a command that changes only the request
    pub async fn execute(
        &self,
        actor: &Actor,
        request_id: i64,
        command: Command,
    ) -> Result<TransitionResponse, ServiceError> {
        let (request, design) = self.load(request_id).await?;
        let transition = workflow::evaluate(&request, design.as_ref(), actor, &command, Utc::now())?;
        self.commit(transition).await
    }

    /// Run the planning engine for an assigned request and store the design.
    ///
    /// The report is rendered as an effect afterwards; a rendering failure is
    /// returned as a diagnostic and can be retried with `render_report`.
    pub async fn generate_design(&self, actor: &Actor, request_id: i64) -> Result<DesignResponse, ServiceError> {
        let (request, design) = self.load(request_id).await?;
        let transition = workflow::evaluate(
            &request,
            design.as_ref(),
            actor,
            &Command::GenerateDesign,
            Utc::now(),
        )?;

        let catalog = self.store.list_active_devices().await?;
        let plan = planner::synthesize(&request.departments, &catalog).map_err(|e| {
            tracing::warn!("Design generation for request {} failed: {}", request_id, e);
            e
        })?;

        let design = self
            .store
            .create_design_with_transition(actor.user_id, &plan, &transition)
            .await?;
        tracing::info!(
            "Request {}: generated design {} ({} subnets, estimated cost {:.2})",
            request_id,
            design.id,
            design.subnet_assignments.len(),
            design.total_estimated_cost
        );

        let request = self.reload(request_id).await?;
        self.broadcast_request(&request).await;

        let diagnostics = self.effects.run(&transition.effects).await;
        let design = self.store.get_design(design.id).await?.unwrap_or(design);

        Ok(DesignResponse {
            request,
            design,
            diagnostics,
        })
    }

    /// Render (or re-render) the report for the request's design
    pub async fn render_report(&self, actor: &Actor, request_id: i64) -> Result<DesignResponse, ServiceError> {
        let (request, design) = self.load(request_id).await?;
        workflow::evaluate(
            &request,
            design.as_ref(),
            actor,
            &Command::RenderReport,
            Utc::now(),
        )?;

        let design = self.effects.render_report(request_id).await.map_err(|e| {
            tracing::warn!("Report rendering for request {} failed: {:#}", request_id, e);
            ServiceError::Render(format!("{:#}", e))
        })?;

        Ok(DesignResponse {
            request,
            design,
            diagnostics: Vec::new(),
        })
    }

    /// Administrative override of status and assignees
    pub async fn override_status(
        &self,
        actor: &Actor,
        request_id: i64,
        req: &StatusOverrideRequest,
    ) -> Result<TransitionResponse, ServiceError> {
        let (request, _) = self.load(request_id).await?;
        let designer = match req.designer_id {
            Some(id) => Some(self.assignee(id).await?),
            None => None,
        };
        let installer = match req.installer_id {
            Some(id) => Some(self.assignee(id).await?),
            None => None,
        };

        let transition = workflow::evaluate_override(&request, actor, req.status, designer, installer)?;
        tracing::warn!(
            "Admin {} overriding request {} status {} -> {}",
            actor.user_id,
            request_id,
            request.status,
            req.status
        );
        self.commit(transition).await
    }

    async fn commit(&self, transition: Transition) -> Result<TransitionResponse, ServiceError> {
        let request = self.store.apply_transition(&transition).await?;
        tracing::info!(
            "Request {}: {} {} -> {}",
            transition.request_id,
            transition
                .action
                .map(|a| a.as_str())
                .unwrap_or("override"),
            transition.from,
            transition.to
        );
        self.broadcast_request(&request).await;

        let diagnostics = self.effects.run(&transition.effects).await;
        Ok(TransitionResponse { request, diagnostics })
    }

    async fn load(&self, request_id: i64) -> Result<(Request, Option<Design>), ServiceError> {
        let request = self.reload(request_id).await?;
        let design = self.store.get_design_by_request(request_id).await?;
        Ok((request, design))
    }

    async fn reload(&self, request_id: i64) -> Result<Request, ServiceError> {
        self.store
            .get_request(request_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Request not found: {}", request_id)))
    }

    async fn assignee(&self, user_id: i64) -> Result<Assignee, ServiceError> {
        self.store
            .get_user(user_id)
            .await?
            .map(|u| Assignee::from(&u))
            .ok_or_else(|| ServiceError::NotFound(format!("User not found: {}", user_id)))
    }

    /// Users allowed to see `request`: its participants plus every admin
    async fn audience(&self, request: &Request) -> Vec<i64> {
        let mut users: Vec<i64> = [
            Some(request.client_id),
            request.assigned_designer_id,
            request.assigned_installer_id,
        ]
        .into_iter()
        .flatten()
        .collect();
        match self.store.list_user_ids_by_role(Role::Admin).await {
            Ok(admins) => users.extend(admins),
            Err(e) => tracing::warn!("Failed to list admins for request {}: {}", request.id, e),
        }
        users.sort_unstable();
        users.dedup();
        users
    }

    async fn broadcast_request(&self, request: &Request) {
        if let Some(ref hub) = self.ws_hub {
            let recipients = self.audience(request).await;
            hub.broadcast_request_updated(request, recipients).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::fixtures::{test_store, user};
    use crate::services::{HtmlReportRenderer, StoreNotifier};
    use anyhow::Result;
    use async_trait::async_trait;
    use tokio_test::{assert_err, assert_ok};

    struct FailingRenderer;

    impl ReportRenderer for FailingRenderer {
        fn render(&self, _doc: &crate::services::reports::ReportDocument) -> Result<String> {
            anyhow::bail!("renderer offline")
        }
    }

    struct FailingNotifier;

    #[async_trait]
    impl Notifier for FailingNotifier {
        async fn notify(&self, _: i64, _: i64, _: NotificationKind, _: &str, _: &str) -> Result<()> {
            anyhow::bail!("mail relay down")
        }
    }

    struct Harness {
        store: Store,
        service: WorkflowService,
        admin: Actor,
        designer: Actor,
        installer: Actor,
        client: Actor,
    }

    fn actor(u: &User) -> Actor {
        Actor {
            user_id: u.id,
            role: u.role,
        }
    }

    async fn harness_with(
        notifier: Option<Arc<dyn Notifier>>,
        renderer: Option<Arc<dyn ReportRenderer>>,
    ) -> Harness {
        let store = test_store().await;
        let admin = store.get_user_by_username("admin").await.unwrap().unwrap();
        let designer = user(&store, "dana", Role::Designer).await;
        let installer = user(&store, "ian", Role::Installer).await;
        let client = user(&store, "cleo", Role::Client).await;

        let reports = std::env::temp_dir().join(format!("campus-reports-{}", uuid::Uuid::new_v4()));
        let notifier = notifier.unwrap_or_else(|| Arc::new(StoreNotifier::new(store.clone(), None)));
        let renderer =
            renderer.unwrap_or_else(|| Arc::new(HtmlReportRenderer::new(reports).unwrap()));

        Harness {
            service: WorkflowService::new(store.clone(), notifier, renderer, None),
            store,
            admin: actor(&admin),
            designer: actor(&designer),
            installer: actor(&installer),
            client: actor(&client),
        }
    }

    async fn harness() -> Harness {
        harness_with(None, None).await
    }

    fn submission(requires_installation: bool) -> SubmitRequirementsRequest {
        SubmitRequirementsRequest {
            name: "North Campus".to_string(),
            site: Some("Main St".to_string()),
            requires_installation,
            departments: vec![
                DepartmentInput {
                    name: "Library".to_string(),
                    rooms: vec![RoomInput {
                        name: "Reading Room".to_string(),
                        wired_hosts: Some(5),
                        wireless_hosts: None,
                    }],
                },
                DepartmentInput {
                    name: "Lab".to_string(),
                    rooms: vec![RoomInput {
                        name: "Bench".to_string(),
                        wired_hosts: None,
                        wireless_hosts: Some(40),
                    }],
                },
            ],
        }
    }

    impl Harness {
        async fn assigned(&self, requires_installation: bool, with_installer: bool) -> Request {
            let request = self
                .service
                .submit_requirements(&self.client, &submission(requires_installation))
                .await
                .unwrap();
            self.service
                .assign(
                    &self.admin,
                    request.id,
                    &AssignRequest {
                        designer_id: self.designer.user_id,
                        installer_id: with_installer.then_some(self.installer.user_id),
                    },
                )
                .await
                .unwrap()
                .request
        }

        async fn kinds_for(&self, user_id: i64) -> Vec<NotificationKind> {
            let mut kinds: Vec<_> = self
                .store
                .list_notifications(user_id, false)
                .await
                .unwrap()
                .into_iter()
                .map(|n| n.kind)
                .collect();
            kinds.reverse();
            kinds
        }
    }

    #[tokio::test]
    async fn test_request_audience_excludes_outsiders() {
        let h = harness().await;
        let outsider = user(&h.store, "olga", Role::Client).await;
        let other_designer = user(&h.store, "dirk", Role::Designer).await;
        let request = h.assigned(true, true).await;

        let audience = h.service.audience(&request).await;
        for id in [h.admin.user_id, h.client.user_id, h.designer.user_id, h.installer.user_id] {
            assert!(audience.contains(&id), "user {} missing", id);
        }
        assert!(!audience.contains(&outsider.id));
        assert!(!audience.contains(&other_designer.id));
    }

    #[tokio::test]
    async fn test_full_design_only_lifecycle() {
        let h = harness().await;
        let request = h.assigned(false, false).await;
        assert_eq!(request.status, RequestStatus::Assigned);

        let generated = h.service.generate_design(&h.designer, request.id).await.unwrap();
        assert!(generated.diagnostics.is_empty());
        assert_eq!(generated.request.status, RequestStatus::DesignInProgress);
        assert_eq!(generated.design.report_ref.as_deref(), Some(format!("request-{}.html", request.id).as_str()));
        let blocks: Vec<String> = generated
            .design
            .subnet_assignments
            .iter()
            .map(|s| s.cidr_block.to_string())
            .collect();
        assert_eq!(blocks, vec!["10.1.1.0/24", "10.10.1.0/27", "10.10.2.0/26"]);

        let submitted = h.service.execute(&h.designer, request.id, Command::SubmitDesign).await.unwrap();
        assert_eq!(submitted.request.status, RequestStatus::DesignSubmitted);

        let approved = h.service.execute(&h.admin, request.id, Command::ApproveDesign).await.unwrap();
        assert_eq!(approved.request.status, RequestStatus::AwaitingClientReview);
        let design = h.store.get_design_by_request(request.id).await.unwrap().unwrap();
        assert!(design.approved);
        assert_eq!(design.approved_by, Some(h.admin.user_id));
        assert!(design.approved_at.is_some());

        let accepted = h.service.execute(&h.client, request.id, Command::AcceptDesign).await.unwrap();
        assert_eq!(accepted.request.status, RequestStatus::Completed);

        assert_eq!(h.kinds_for(h.designer.user_id).await, vec![NotificationKind::Assignment]);
        assert_eq!(
            h.kinds_for(h.admin.user_id).await,
            vec![NotificationKind::DesignReview, NotificationKind::ClientAcceptance]
        );
        assert_eq!(
            h.kinds_for(h.client.user_id).await,
            vec![NotificationKind::DesignApproved, NotificationKind::ProjectCompleted]
        );
    }

    #[tokio::test]
    async fn test_installation_lifecycle() {
        let h = harness().await;
        let request = h.assigned(true, false).await;
        h.service.generate_design(&h.designer, request.id).await.unwrap();
        h.service.execute(&h.designer, request.id, Command::SubmitDesign).await.unwrap();
        h.service.execute(&h.admin, request.id, Command::ApproveDesign).await.unwrap();

        let accepted = h.service.execute(&h.client, request.id, Command::AcceptDesign).await.unwrap();
        assert_eq!(accepted.request.status, RequestStatus::DesignComplete);

        let staffed = h
            .service
            .assign_installer(
                &h.admin,
                request.id,
                &AssignInstallerRequest {
                    installer_id: h.installer.user_id,
                },
            )
            .await
            .unwrap();
        assert_eq!(staffed.request.status, RequestStatus::InstallationInProgress);

        let progress = h
            .service
            .execute(
                &h.installer,
                request.id,
                Command::UpdateProgress {
                    progress: 60,
                    notes: Some("core racked".to_string()),
                },
            )
            .await
            .unwrap();
        assert_eq!(progress.request.installation_progress, 60);
        assert_eq!(progress.request.installation_notes.as_deref(), Some("core racked"));

        let early = h.service.execute(&h.client, request.id, Command::VerifyInstallation).await;
        assert!(matches!(early, Err(ServiceError::Workflow(WorkflowError::Precondition(_)))));

        let done = h
            .service
            .execute(&h.installer, request.id, Command::CompleteInstallation)
            .await
            .unwrap();
        assert_eq!(done.request.installation_progress, 100);
        assert!(done.request.installer_completed_at.is_some());
        assert_eq!(done.request.status, RequestStatus::InstallationInProgress);

        let verified = h.service.execute(&h.client, request.id, Command::VerifyInstallation).await.unwrap();
        assert_eq!(verified.request.status, RequestStatus::Completed);
        assert!(verified.request.client_verified_at.is_some());

        assert_eq!(
            h.kinds_for(h.installer.user_id).await,
            vec![
                NotificationKind::Assignment,
                NotificationKind::InstallationStarted,
                NotificationKind::InstallationVerified,
            ]
        );
    }

    #[tokio::test]
    async fn test_render_failure_is_a_diagnostic_and_retryable() {
        let h = harness_with(None, Some(Arc::new(FailingRenderer))).await;
        let request = h.assigned(false, false).await;

        let generated = h.service.generate_design(&h.designer, request.id).await.unwrap();
        assert_eq!(generated.request.status, RequestStatus::DesignInProgress);
        assert!(!generated.design.has_report());
        assert_eq!(generated.diagnostics.len(), 1);
        assert!(generated.diagnostics[0].error.contains("renderer offline"));

        let submit = h.service.execute(&h.designer, request.id, Command::SubmitDesign).await;
        assert!(matches!(submit, Err(ServiceError::Workflow(WorkflowError::Precondition(_)))));

        let retry = h.service.render_report(&h.designer, request.id).await;
        assert!(matches!(retry, Err(ServiceError::Render(_))));
    }

    #[tokio::test]
    async fn test_notification_failure_does_not_undo_transition() {
        let h = harness_with(Some(Arc::new(FailingNotifier)), None).await;
        let request = h.assigned(false, false).await;
        assert_eq!(request.status, RequestStatus::Assigned);

        h.service.generate_design(&h.designer, request.id).await.unwrap();
        let submitted = h.service.execute(&h.designer, request.id, Command::SubmitDesign).await.unwrap();
        assert_eq!(submitted.request.status, RequestStatus::DesignSubmitted);
        assert_eq!(submitted.diagnostics.len(), 1);
        assert!(submitted.diagnostics[0].effect.contains("design_review"));

        let stored = h.store.get_request(request.id).await.unwrap().unwrap();
        assert_eq!(stored.status, RequestStatus::DesignSubmitted);
    }

    #[tokio::test]
    async fn test_generation_failure_leaves_no_design() {
        let h = harness().await;
        let request = h.assigned(false, false).await;
        for device in h.store.list_devices().await.unwrap() {
            if device.device_type == DeviceType::AccessPoint {
                h.store.delete_device(&device.id).await.unwrap();
            }
        }

        let err = h.service.generate_design(&h.designer, request.id).await.unwrap_err();
        match err {
            ServiceError::Plan(PlanError::CatalogIncomplete { issues }) => {
                assert!(issues.iter().any(|i| i.device_type() == Some(DeviceType::AccessPoint)));
            }
            other => panic!("unexpected error {:?}", other),
        }
        let stored = h.store.get_request(request.id).await.unwrap().unwrap();
        assert_eq!(stored.status, RequestStatus::Assigned);
        assert!(h.store.get_design_by_request(request.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_generation_yields_one_design() {
        let h = harness().await;
        let request = h.assigned(false, false).await;

        let (a, b) = tokio::join!(
            h.service.generate_design(&h.designer, request.id),
            h.service.generate_design(&h.designer, request.id)
        );
        let results = [a, b];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(ServiceError::Workflow(WorkflowError::Precondition(_))))));

        let stored = h.store.get_request(request.id).await.unwrap().unwrap();
        assert_eq!(stored.status, RequestStatus::DesignInProgress);
        assert!(h.store.get_design_by_request(request.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_submission_validation_and_roles() {
        let h = harness().await;
        let mut bad = submission(false);
        bad.name = " ".to_string();
        bad.departments[0].rooms[0].wired_hosts = Some(-3);

        match h.service.submit_requirements(&h.client, &bad).await {
            Err(ServiceError::Plan(PlanError::Validation { issues })) => {
                let fields: Vec<_> = issues.iter().map(|i| i.field.as_str()).collect();
                assert_eq!(fields, vec!["name", "departments[0].rooms[0].wired_hosts"]);
            }
            other => panic!("unexpected result {:?}", other),
        }

        assert_err!(h.service.submit_requirements(&h.designer, &submission(false)).await);
        assert!(h.store.list_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_assignee_roles_and_visibility() {
        let h = harness().await;
        let request = h
            .service
            .submit_requirements(&h.client, &submission(false))
            .await
            .unwrap();

        let wrong = h
            .service
            .assign(
                &h.admin,
                request.id,
                &AssignRequest {
                    designer_id: h.installer.user_id,
                    installer_id: None,
                },
            )
            .await;
        assert!(matches!(wrong, Err(ServiceError::Workflow(WorkflowError::Precondition(_)))));

        let missing = h
            .service
            .assign(
                &h.admin,
                request.id,
                &AssignRequest {
                    designer_id: 9999,
                    installer_id: None,
                },
            )
            .await;
        assert!(matches!(missing, Err(ServiceError::NotFound(_))));

        assert!(matches!(
            h.service.get_visible(&h.designer, request.id).await,
            Err(ServiceError::Workflow(WorkflowError::Authorization(_)))
        ));
        assert_ok!(h.service.get_visible(&h.client, request.id).await);
        assert_eq!(h.service.list_visible(&h.designer).await.unwrap().len(), 0);
        assert_eq!(h.service.list_visible(&h.admin).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_override_sets_status_directly() {
        let h = harness().await;
        let request = h.assigned(false, false).await;
        let overridden = h
            .service
            .override_status(
                &h.admin,
                request.id,
                &StatusOverrideRequest {
                    status: RequestStatus::New,
                    designer_id: None,
                    installer_id: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(overridden.request.status, RequestStatus::New);
        assert_eq!(overridden.request.assigned_designer_id, Some(h.designer.user_id));

        let denied = h
            .service
            .override_status(
                &h.designer,
                request.id,
                &StatusOverrideRequest {
                    status: RequestStatus::Completed,
                    designer_id: None,
                    installer_id: None,
                },
            )
            .await;
        assert!(matches!(denied, Err(ServiceError::Workflow(WorkflowError::Authorization(_)))));
    }
}
