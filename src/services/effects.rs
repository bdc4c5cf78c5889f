use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;

use super::reports::{ReportDocument, ReportRenderer};
use crate::db::{NotFoundError, Store};
use crate::models::*;
use crate::workflow::{Effect, Recipient};
use crate::ws::Hub;

/// Delivers a notification to one user
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(
        &self,
        user_id: i64,
        request_id: i64,
        kind: NotificationKind,
        title: &str,
        message: &str,
    ) -> Result<()>;
}

/// Persists notifications to the inbox and pushes them to live sockets
pub struct StoreNotifier {
    store: Store,
    ws_hub: Option<Arc<Hub>>,
}

impl StoreNotifier {
    pub fn new(store: Store, ws_hub: Option<Arc<Hub>>) -> Self {
        Self { store, ws_hub }
    }
}

#[async_trait]
impl Notifier for StoreNotifier {
    async fn notify(
        &self,
        user_id: i64,
        request_id: i64,
        kind: NotificationKind,
        title: &str,
        message: &str,
    ) -> Result<()> {
        let notification = self
            .store
            .create_notification(user_id, request_id, kind, title, message)
            .await?;
        if let Some(ref hub) = self.ws_hub {
            hub.broadcast_notification(&notification).await;
        }
        Ok(())
    }
}

/// Runs transition effects after their state change has committed.
///
/// Each effect is isolated: a failure is logged and reported as a diagnostic,
/// and the remaining effects still run.
pub struct EffectRunner {
    store: Store,
    notifier: Arc<dyn Notifier>,
    renderer: Arc<dyn ReportRenderer>,
}

impl EffectRunner {
    pub fn new(store: Store, notifier: Arc<dyn Notifier>, renderer: Arc<dyn ReportRenderer>) -> Self {
        Self {
            store,
            notifier,
            renderer,
        }
    }

    pub async fn run(&self, effects: &[Effect]) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        for effect in effects {
            if let Err(e) = self.run_one(effect).await {
                tracing::warn!("Effect '{}' failed: {:#}", effect.describe(), e);
                diagnostics.push(Diagnostic {
                    effect: effect.describe(),
                    error: format!("{:#}", e),
                });
            }
        }
        diagnostics
    }

    async fn run_one(&self, effect: &Effect) -> Result<()> {
        match effect {
            Effect::Notify {
                recipient,
                request_id,
                kind,
                title,
                message,
            } => {
                let user_ids = match recipient {
                    Recipient::User(id) => vec![*id],
                    Recipient::Role(role) => self.store.list_user_ids_by_role(*role).await?,
                };

                // Deliver to everyone before reporting the first failure
                let mut first_error = None;
                for user_id in user_ids {
                    if let Err(e) = self
                        .notifier
                        .notify(user_id, *request_id, *kind, title, message)
                        .await
                    {
                        tracing::warn!("Failed to notify user {}: {}", user_id, e);
                        first_error.get_or_insert(e);
                    }
                }
                match first_error {
                    Some(e) => Err(e),
                    None => Ok(()),
                }
            }
            Effect::RenderReport { request_id } => self.render_report(*request_id).await.map(|_| ()),
        }
    }

    /// Render the report for a request's design and record its reference
    pub async fn render_report(&self, request_id: i64) -> Result<Design> {
        let request = self
            .store
            .get_request(request_id)
            .await?
            .ok_or_else(|| NotFoundError::new("Request", &request_id.to_string()))?;
        let design = self
            .store
            .get_design_by_request(request_id)
            .await?
            .ok_or_else(|| NotFoundError::new("Design for request", &request_id.to_string()))?;

        let doc = ReportDocument::new(&request, &design);
        let renderer = self.renderer.clone();
        let reference = tokio::task::spawn_blocking(move || renderer.render(&doc))
            .await
            .context("Report task join error")??;

        tracing::info!("Rendered report for request {}: {}", request_id, reference);
        self.store.set_design_report(request_id, &reference).await
    }
}
