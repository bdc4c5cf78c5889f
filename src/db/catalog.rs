use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::{Pool, Sqlite};

use super::row_helpers::map_device_row;
use super::{is_unique_violation, ConflictError, NotFoundError};
use crate::models::*;

/// Device catalog operations. Catalog order is insertion order.
pub struct CatalogRepo;

impl CatalogRepo {
    pub async fn list(pool: &Pool<Sqlite>) -> Result<Vec<DeviceCatalogEntry>> {
        let rows = sqlx::query("SELECT * FROM devices ORDER BY rowid")
            .fetch_all(pool)
            .await?;
        rows.iter().map(map_device_row).collect()
    }

    pub async fn list_active(pool: &Pool<Sqlite>) -> Result<Vec<DeviceCatalogEntry>> {
        let rows = sqlx::query("SELECT * FROM devices WHERE active = 1 ORDER BY rowid")
            .fetch_all(pool)
            .await?;
        rows.iter().map(map_device_row).collect()
    }

    pub async fn get(pool: &Pool<Sqlite>, id: &str) -> Result<Option<DeviceCatalogEntry>> {
        let row = sqlx::query("SELECT * FROM devices WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?;
        row.as_ref().map(map_device_row).transpose()
    }

    pub async fn count(pool: &Pool<Sqlite>) -> Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM devices")
            .fetch_one(pool)
            .await?;
        Ok(count.0)
    }

    /// Insert a catalog entry; an empty id gets a generated one
    pub async fn create(pool: &Pool<Sqlite>, req: &CreateDeviceRequest) -> Result<DeviceCatalogEntry> {
        let id = if req.id.trim().is_empty() {
            let suffix = uuid::Uuid::new_v4().simple().to_string();
            format!("{}-{}", req.device_type.as_str().replace('_', "-"), &suffix[..8])
        } else {
            req.id.trim().to_string()
        };

        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO devices (id, device_type, model, vendor, port_count, poe_capable, unit_price, active, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(req.device_type.as_str())
        .bind(&req.model)
        .bind(&req.vendor)
        .bind(req.port_count.map(i64::from))
        .bind(req.poe_capable)
        .bind(req.unit_price)
        .bind(req.active)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await;

        match result {
            Err(e) if is_unique_violation(&e) => {
                return Err(ConflictError::new(format!("device '{}' already exists", id)).into())
            }
            other => other?,
        };

        Self::get(pool, &id)
            .await?
            .context("Device not found after creation")
    }

    pub async fn update(pool: &Pool<Sqlite>, id: &str, req: &CreateDeviceRequest) -> Result<DeviceCatalogEntry> {
        let result = sqlx::query(
            r#"
            UPDATE devices SET device_type = ?, model = ?, vendor = ?, port_count = ?, poe_capable = ?,
                unit_price = ?, active = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(req.device_type.as_str())
        .bind(&req.model)
        .bind(&req.vendor)
        .bind(req.port_count.map(i64::from))
        .bind(req.poe_capable)
        .bind(req.unit_price)
        .bind(req.active)
        .bind(Utc::now())
        .bind(id)
        .execute(pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(NotFoundError::new("Device", id).into());
        }

        Self::get(pool, id)
            .await?
            .context("Device not found after update")
    }

    pub async fn delete(pool: &Pool<Sqlite>, id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM devices WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(NotFoundError::new("Device", id).into());
        }
        Ok(())
    }
}
