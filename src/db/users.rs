use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::{Pool, Sqlite};

use super::row_helpers::map_user_row;
use super::{is_unique_violation, ConflictError, NotFoundError};
use crate::models::*;

/// User database operations
pub struct UserRepo;

impl UserRepo {
    pub async fn list(pool: &Pool<Sqlite>) -> Result<Vec<User>> {
        let rows = sqlx::query("SELECT * FROM users ORDER BY username")
            .fetch_all(pool)
            .await?;
        rows.iter().map(map_user_row).collect()
    }

    pub async fn get(pool: &Pool<Sqlite>, id: i64) -> Result<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?;
        row.as_ref().map(map_user_row).transpose()
    }

    pub async fn get_by_username(pool: &Pool<Sqlite>, username: &str) -> Result<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(pool)
            .await?;
        row.as_ref().map(map_user_row).transpose()
    }

    /// IDs of every user holding `role`, used to fan out role notifications
    pub async fn list_ids_by_role(pool: &Pool<Sqlite>, role: Role) -> Result<Vec<i64>> {
        let ids: Vec<(i64,)> = sqlx::query_as("SELECT id FROM users WHERE role = ? ORDER BY id")
            .bind(role.as_str())
            .fetch_all(pool)
            .await?;
        Ok(ids.into_iter().map(|(id,)| id).collect())
    }

    pub async fn count(pool: &Pool<Sqlite>) -> Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(pool)
            .await?;
        Ok(count.0)
    }

    pub async fn create(
        pool: &Pool<Sqlite>,
        username: &str,
        password_hash: &str,
        role: Role,
    ) -> Result<User> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO users (username, password_hash, role, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(username)
        .bind(password_hash)
        .bind(role.as_str())
        .bind(now)
        .bind(now)
        .execute(pool)
        .await;

        let result = match result {
            Err(e) if is_unique_violation(&e) => {
                return Err(ConflictError::new(format!("username '{}' is already taken", username)).into())
            }
            other => other?,
        };

        Self::get(pool, result.last_insert_rowid())
            .await?
            .context("User not found after creation")
    }

    /// Update a user; `password_hash` of `None` keeps the current password
    pub async fn update(
        pool: &Pool<Sqlite>,
        id: i64,
        username: &str,
        password_hash: Option<&str>,
        role: Role,
    ) -> Result<User> {
        let result = sqlx::query(
            r#"
            UPDATE users SET username = ?, password_hash = COALESCE(?, password_hash), role = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(username)
        .bind(password_hash)
        .bind(role.as_str())
        .bind(Utc::now())
        .bind(id)
        .execute(pool)
        .await;

        let result = match result {
            Err(e) if is_unique_violation(&e) => {
                return Err(ConflictError::new(format!("username '{}' is already taken", username)).into())
            }
            other => other?,
        };

        if result.rows_affected() == 0 {
            return Err(NotFoundError::new("User", &id.to_string()).into());
        }

        Self::get(pool, id)
            .await?
            .context("User not found after update")
    }

    pub async fn delete(pool: &Pool<Sqlite>, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await;

        let result = match result {
            Err(e) if super::is_foreign_key_violation(&e) => {
                return Err(ConflictError::new("user is still referenced by requests or designs").into())
            }
            other => other?,
        };

        if result.rows_affected() == 0 {
            return Err(NotFoundError::new("User", &id.to_string()).into());
        }
        Ok(())
    }
}
