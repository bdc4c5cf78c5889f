use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{Pool, Sqlite, Transaction};

use super::row_helpers::map_request_row;
use super::{ConflictError, NotFoundError};
use crate::models::*;
use crate::workflow::Transition;

/// Request database operations
pub struct RequestRepo;

impl RequestRepo {
    pub async fn list(pool: &Pool<Sqlite>) -> Result<Vec<Request>> {
        let rows = sqlx::query("SELECT * FROM requests ORDER BY id DESC")
            .fetch_all(pool)
            .await?;
        rows.iter().map(map_request_row).collect()
    }

    /// Requests a non-admin user takes part in
    pub async fn list_for_participant(pool: &Pool<Sqlite>, role: Role, user_id: i64) -> Result<Vec<Request>> {
        let column = match role {
            Role::Admin => return Self::list(pool).await,
            Role::Client => "client_id",
            Role::Designer => "assigned_designer_id",
            Role::Installer => "assigned_installer_id",
        };
        let rows = sqlx::query(&format!("SELECT * FROM requests WHERE {} = ? ORDER BY id DESC", column))
            .bind(user_id)
            .fetch_all(pool)
            .await?;
        rows.iter().map(map_request_row).collect()
    }

    pub async fn get(pool: &Pool<Sqlite>, id: i64) -> Result<Option<Request>> {
        let row = sqlx::query("SELECT * FROM requests WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?;
        row.as_ref().map(map_request_row).transpose()
    }

    pub async fn create(pool: &Pool<Sqlite>, req: &NewRequest) -> Result<Request> {
        let now = Utc::now();
        let departments = serde_json::to_string(&req.departments)?;
        let result = sqlx::query(
            r#"
            INSERT INTO requests (client_id, name, site, requires_installation, departments, status, version, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, 1, ?, ?)
            "#,
        )
        .bind(req.client_id)
        .bind(&req.name)
        .bind(&req.site)
        .bind(req.requires_installation)
        .bind(&departments)
        .bind(RequestStatus::New.as_str())
        .bind(now)
        .bind(now)
        .execute(pool)
        .await?;

        Self::get(pool, result.last_insert_rowid())
            .await?
            .context("Request not found after creation")
    }

    /// Apply a workflow transition, approving the design in the same
    /// transaction when the transition carries an approval.
    pub async fn apply_transition(pool: &Pool<Sqlite>, transition: &Transition) -> Result<Request> {
        let now = Utc::now();
        let mut tx = pool.begin().await?;
        Self::apply_in_tx(&mut tx, transition, now).await?;
        tx.commit().await?;

        Self::get(pool, transition.request_id)
            .await?
            .context("Request not found after update")
    }

    /// Compare-and-set update of status and workflow fields inside `tx`.
    ///
    /// Fails with `ConflictError` when the request's version no longer matches
    /// the one the transition was evaluated against.
    pub(super) async fn apply_in_tx(
        tx: &mut Transaction<'_, Sqlite>,
        transition: &Transition,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let update = &transition.update;
        let result = sqlx::query(
            r#"
            UPDATE requests SET
                status = ?,
                assigned_designer_id = COALESCE(?, assigned_designer_id),
                assigned_installer_id = COALESCE(?, assigned_installer_id),
                installation_progress = COALESCE(?, installation_progress),
                installation_notes = COALESCE(?, installation_notes),
                installer_completed_at = COALESCE(?, installer_completed_at),
                client_verified_at = COALESCE(?, client_verified_at),
                version = version + 1,
                updated_at = ?
            WHERE id = ? AND version = ?
            "#,
        )
        .bind(transition.to.as_str())
        .bind(update.assigned_designer_id)
        .bind(update.assigned_installer_id)
        .bind(update.installation_progress)
        .bind(&update.installation_notes)
        .bind(update.installer_completed_at)
        .bind(update.client_verified_at)
        .bind(now)
        .bind(transition.request_id)
        .bind(transition.expected_version)
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 0 {
            let exists: Option<(i64,)> = sqlx::query_as("SELECT id FROM requests WHERE id = ?")
                .bind(transition.request_id)
                .fetch_optional(&mut **tx)
                .await?;
            return Err(match exists {
                None => NotFoundError::new("Request", &transition.request_id.to_string()).into(),
                Some(_) => ConflictError::new("request was modified concurrently; reload and retry").into(),
            });
        }

        if let Some(approval) = update.approval {
            let approved = sqlx::query(
                r#"
                UPDATE designs SET approved = 1, approved_by = ?, approved_at = ?, updated_at = ?
                WHERE request_id = ? AND approved = 0
                "#,
            )
            .bind(approval.approved_by)
            .bind(approval.approved_at)
            .bind(now)
            .bind(transition.request_id)
            .execute(&mut **tx)
            .await?;

            if approved.rows_affected() == 0 {
                return Err(ConflictError::new("design is missing or already approved").into());
            }
        }

        Ok(())
    }
}
