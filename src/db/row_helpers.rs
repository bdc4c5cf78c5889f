use anyhow::{Context, Result};
use sqlx::{Row, sqlite::SqliteRow};

use crate::models::*;

/// Filter empty strings to None; used when DB stores '' instead of NULL
pub fn none_if_empty(opt: Option<String>) -> Option<String> {
    opt.filter(|s| !s.is_empty())
}

/// Parse a TEXT column holding an enum tag
fn parse_column<T>(row: &SqliteRow, column: &str) -> Result<T>
where
    T: std::str::FromStr<Err = String>,
{
    let raw: String = row.get(column);
    raw.parse::<T>()
        .map_err(|e| anyhow::anyhow!("invalid {} column: {}", column, e))
}

/// Decode a TEXT column holding JSON
fn json_column<T: serde::de::DeserializeOwned>(row: &SqliteRow, column: &str) -> Result<T> {
    let raw: String = row.get(column);
    serde_json::from_str(&raw).with_context(|| format!("invalid JSON in {} column", column))
}

fn bool_column(row: &SqliteRow, column: &str) -> bool {
    let v: i32 = row.get(column);
    v != 0
}

/// Map a SQLite row to a User struct
pub fn map_user_row(row: &SqliteRow) -> Result<User> {
    Ok(User {
        id: row.get("id"),
        username: row.get("username"),
        password_hash: row.get("password_hash"),
        role: parse_column(row, "role")?,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

/// Map a SQLite row to a DeviceCatalogEntry struct
pub fn map_device_row(row: &SqliteRow) -> Result<DeviceCatalogEntry> {
    Ok(DeviceCatalogEntry {
        id: row.get("id"),
        device_type: parse_column(row, "device_type")?,
        model: row.get("model"),
        vendor: row.get("vendor"),
        port_count: row
            .get::<Option<i64>, _>("port_count")
            .and_then(|p| u32::try_from(p).ok()),
        poe_capable: bool_column(row, "poe_capable"),
        unit_price: row.get("unit_price"),
        active: bool_column(row, "active"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

/// Map a SQLite row to a Request struct
pub fn map_request_row(row: &SqliteRow) -> Result<Request> {
    Ok(Request {
        id: row.get("id"),
        client_id: row.get("client_id"),
        name: row.get("name"),
        site: none_if_empty(row.get("site")),
        requires_installation: bool_column(row, "requires_installation"),
        departments: json_column(row, "departments")?,
        status: parse_column(row, "status")?,
        assigned_designer_id: row.get("assigned_designer_id"),
        assigned_installer_id: row.get("assigned_installer_id"),
        installation_progress: row.get("installation_progress"),
        installation_notes: none_if_empty(row.get("installation_notes")),
        installer_completed_at: row.get("installer_completed_at"),
        client_verified_at: row.get("client_verified_at"),
        version: row.get("version"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

/// Map a SQLite row to a Design struct
pub fn map_design_row(row: &SqliteRow) -> Result<Design> {
    Ok(Design {
        id: row.get("id"),
        request_id: row.get("request_id"),
        created_by: row.get("created_by"),
        bill_of_materials: json_column(row, "bill_of_materials")?,
        subnet_assignments: json_column(row, "subnet_assignments")?,
        topology: json_column(row, "topology")?,
        total_estimated_cost: row.get("total_estimated_cost"),
        report_ref: none_if_empty(row.get("report_ref")),
        approved: bool_column(row, "approved"),
        approved_by: row.get("approved_by"),
        approved_at: row.get("approved_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

/// Map a SQLite row to a Notification struct
pub fn map_notification_row(row: &SqliteRow) -> Result<Notification> {
    Ok(Notification {
        id: row.get("id"),
        user_id: row.get("user_id"),
        request_id: row.get("request_id"),
        kind: parse_column(row, "kind")?,
        title: row.get("title"),
        message: row.get("message"),
        read: bool_column(row, "read"),
        created_at: row.get("created_at"),
    })
}
