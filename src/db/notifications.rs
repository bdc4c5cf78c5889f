use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::{Pool, Sqlite};

use super::row_helpers::map_notification_row;
use super::NotFoundError;
use crate::models::*;

/// Notification inbox operations
pub struct NotificationRepo;

impl NotificationRepo {
    pub async fn list_for_user(pool: &Pool<Sqlite>, user_id: i64, unread_only: bool) -> Result<Vec<Notification>> {
        let sql = if unread_only {
            "SELECT * FROM notifications WHERE user_id = ? AND read = 0 ORDER BY id DESC"
        } else {
            "SELECT * FROM notifications WHERE user_id = ? ORDER BY id DESC"
        };
        let rows = sqlx::query(sql).bind(user_id).fetch_all(pool).await?;
        rows.iter().map(map_notification_row).collect()
    }

    pub async fn get(pool: &Pool<Sqlite>, id: i64) -> Result<Option<Notification>> {
        let row = sqlx::query("SELECT * FROM notifications WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?;
        row.as_ref().map(map_notification_row).transpose()
    }

    pub async fn create(
        pool: &Pool<Sqlite>,
        user_id: i64,
        request_id: i64,
        kind: NotificationKind,
        title: &str,
        message: &str,
    ) -> Result<Notification> {
        let result = sqlx::query(
            r#"
            INSERT INTO notifications (user_id, request_id, kind, title, message, read, created_at)
            VALUES (?, ?, ?, ?, ?, 0, ?)
            "#,
        )
        .bind(user_id)
        .bind(request_id)
        .bind(kind.as_str())
        .bind(title)
        .bind(message)
        .bind(Utc::now())
        .execute(pool)
        .await?;

        Self::get(pool, result.last_insert_rowid())
            .await?
            .context("Notification not found after creation")
    }

    /// Mark one of the user's notifications read
    pub async fn mark_read(pool: &Pool<Sqlite>, id: i64, user_id: i64) -> Result<()> {
        let result = sqlx::query("UPDATE notifications SET read = 1 WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(NotFoundError::new("Notification", &id.to_string()).into());
        }
        Ok(())
    }

    pub async fn mark_all_read(pool: &Pool<Sqlite>, user_id: i64) -> Result<u64> {
        let result = sqlx::query("UPDATE notifications SET read = 1 WHERE user_id = ? AND read = 0")
            .bind(user_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn count_unread(pool: &Pool<Sqlite>, user_id: i64) -> Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM notifications WHERE user_id = ? AND read = 0")
            .bind(user_id)
            .fetch_one(pool)
            .await?;
        Ok(count.0)
    }
}
