use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::{Pool, Sqlite};

use super::requests::RequestRepo;
use super::row_helpers::map_design_row;
use super::{is_unique_violation, ConflictError, NotFoundError};
use crate::models::*;
use crate::planner::DesignPlan;
use crate::workflow::Transition;

/// Design database operations
pub struct DesignRepo;

impl DesignRepo {
    pub async fn get(pool: &Pool<Sqlite>, id: i64) -> Result<Option<Design>> {
        let row = sqlx::query("SELECT * FROM designs WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?;
        row.as_ref().map(map_design_row).transpose()
    }

    pub async fn get_by_request(pool: &Pool<Sqlite>, request_id: i64) -> Result<Option<Design>> {
        let row = sqlx::query("SELECT * FROM designs WHERE request_id = ?")
            .bind(request_id)
            .fetch_optional(pool)
            .await?;
        row.as_ref().map(map_design_row).transpose()
    }

    /// Persist a generated plan and advance its request in one transaction.
    ///
    /// The UNIQUE constraint on `request_id` and the request version check
    /// together make concurrent generation produce exactly one design.
    pub async fn create_with_transition(
        pool: &Pool<Sqlite>,
        created_by: i64,
        plan: &DesignPlan,
        transition: &Transition,
    ) -> Result<Design> {
        let now = Utc::now();
        let bom = serde_json::to_string(&plan.bill_of_materials)?;
        let subnets = serde_json::to_string(&plan.subnet_assignments)?;
        let topology = serde_json::to_string(&plan.topology)?;

        let mut tx = pool.begin().await?;

        let result = sqlx::query(
            r#"
            INSERT INTO designs (request_id, created_by, bill_of_materials, subnet_assignments, topology,
                total_estimated_cost, approved, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, 0, ?, ?)
            "#,
        )
        .bind(transition.request_id)
        .bind(created_by)
        .bind(&bom)
        .bind(&subnets)
        .bind(&topology)
        .bind(plan.total_estimated_cost)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await;

        let result = match result {
            Err(e) if is_unique_violation(&e) => {
                return Err(ConflictError::new("a design already exists for this request").into())
            }
            other => other?,
        };
        let design_id = result.last_insert_rowid();

        RequestRepo::apply_in_tx(&mut tx, transition, now).await?;
        tx.commit().await?;

        Self::get(pool, design_id)
            .await?
            .context("Design not found after creation")
    }

    pub async fn set_report_ref(pool: &Pool<Sqlite>, request_id: i64, report_ref: &str) -> Result<Design> {
        let result = sqlx::query("UPDATE designs SET report_ref = ?, updated_at = ? WHERE request_id = ?")
            .bind(report_ref)
            .bind(Utc::now())
            .bind(request_id)
            .execute(pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(NotFoundError::new("Design for request", &request_id.to_string()).into());
        }

        Self::get_by_request(pool, request_id)
            .await?
            .context("Design not found after update")
    }
}
