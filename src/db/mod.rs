mod catalog;
mod designs;
mod notifications;
mod requests;
pub(crate) mod row_helpers;
pub mod seeds;
mod users;

use anyhow::{Context, Result};
use sqlx::{sqlite::SqlitePoolOptions, Pool, Sqlite};

use crate::models::*;
use crate::planner::DesignPlan;
use crate::workflow::Transition;

/// Typed error for "resource not found", enables reliable downcast
/// in the API error handler instead of fragile string matching.
#[derive(Debug)]
pub struct NotFoundError {
    pub resource: String,
    pub id: String,
}

impl NotFoundError {
    pub fn new(resource: &str, id: &str) -> Self {
        Self {
            resource: resource.to_string(),
            id: id.to_string(),
        }
    }
}

impl std::fmt::Display for NotFoundError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} not found: {}", self.resource, self.id)
    }
}

impl std::error::Error for NotFoundError {}

/// Typed error for writes that lost a race or hit a uniqueness rule
#[derive(Debug)]
pub struct ConflictError {
    pub message: String,
}

impl ConflictError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ConflictError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ConflictError {}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

pub(crate) fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_foreign_key_violation())
}

/// Store handles all database operations, delegating to per-entity repo modules.
#[derive(Clone)]
pub struct Store {
    pool: Pool<Sqlite>,
}

impl Store {
    /// Create a new database store with the default pool size
    pub async fn new(db_path: &str) -> Result<Self> {
        Self::with_pool_size(db_path, 5).await
    }

    /// Create a new database store with a specific pool size
    pub async fn with_pool_size(db_path: &str, max_connections: u32) -> Result<Self> {
        let db_url = format!("sqlite:{}?mode=rwc", db_path);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(&db_url)
            .await
            .context("Failed to connect to database")?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Run database migrations and seed defaults
    async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("Failed to run database migrations")?;

        self.seed_default_user().await?;
        self.seed_default_catalog().await?;
        Ok(())
    }

    async fn seed_default_user(&self) -> Result<()> {
        if users::UserRepo::count(&self.pool).await? == 0 {
            let password_hash = bcrypt::hash("admin", bcrypt::DEFAULT_COST)
                .map_err(|e| anyhow::anyhow!("Failed to hash default password: {}", e))?;

            users::UserRepo::create(&self.pool, "admin", &password_hash, Role::Admin).await?;
            tracing::info!("Created default admin user (username: admin, password: admin)");
        }
        Ok(())
    }

    async fn seed_default_catalog(&self) -> Result<()> {
        if catalog::CatalogRepo::count(&self.pool).await? == 0 {
            for entry in seeds::seed_catalog() {
                catalog::CatalogRepo::create(&self.pool, &entry).await?;
            }
            tracing::info!("Seeded default device catalog");
        }
        Ok(())
    }

    /// Cheap round trip used by the health check
    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    // ========== User Operations ==========

    pub async fn list_users(&self) -> Result<Vec<User>> {
        users::UserRepo::list(&self.pool).await
    }

    pub async fn get_user(&self, id: i64) -> Result<Option<User>> {
        users::UserRepo::get(&self.pool, id).await
    }

    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        users::UserRepo::get_by_username(&self.pool, username).await
    }

    pub async fn list_user_ids_by_role(&self, role: Role) -> Result<Vec<i64>> {
        users::UserRepo::list_ids_by_role(&self.pool, role).await
    }

    pub async fn create_user(&self, username: &str, password_hash: &str, role: Role) -> Result<User> {
        users::UserRepo::create(&self.pool, username, password_hash, role).await
    }

    pub async fn update_user(
        &self,
        id: i64,
        username: &str,
        password_hash: Option<&str>,
        role: Role,
    ) -> Result<User> {
        users::UserRepo::update(&self.pool, id, username, password_hash, role).await
    }

    pub async fn delete_user(&self, id: i64) -> Result<()> {
        users::UserRepo::delete(&self.pool, id).await
    }

    // ========== Catalog Operations ==========

    pub async fn list_devices(&self) -> Result<Vec<DeviceCatalogEntry>> {
        catalog::CatalogRepo::list(&self.pool).await
    }

    pub async fn list_active_devices(&self) -> Result<Vec<DeviceCatalogEntry>> {
        catalog::CatalogRepo::list_active(&self.pool).await
    }

    pub async fn get_device(&self, id: &str) -> Result<Option<DeviceCatalogEntry>> {
        catalog::CatalogRepo::get(&self.pool, id).await
    }

    pub async fn create_device(&self, req: &CreateDeviceRequest) -> Result<DeviceCatalogEntry> {
        catalog::CatalogRepo::create(&self.pool, req).await
    }

    pub async fn update_device(&self, id: &str, req: &CreateDeviceRequest) -> Result<DeviceCatalogEntry> {
        catalog::CatalogRepo::update(&self.pool, id, req).await
    }

    pub async fn delete_device(&self, id: &str) -> Result<()> {
        catalog::CatalogRepo::delete(&self.pool, id).await
    }

    // ========== Request Operations ==========

    pub async fn list_requests(&self) -> Result<Vec<Request>> {
        requests::RequestRepo::list(&self.pool).await
    }

    pub async fn list_requests_for(&self, role: Role, user_id: i64) -> Result<Vec<Request>> {
        requests::RequestRepo::list_for_participant(&self.pool, role, user_id).await
    }

    pub async fn get_request(&self, id: i64) -> Result<Option<Request>> {
        requests::RequestRepo::get(&self.pool, id).await
    }

    pub async fn create_request(&self, req: &NewRequest) -> Result<Request> {
        requests::RequestRepo::create(&self.pool, req).await
    }

    pub async fn apply_transition(&self, transition: &Transition) -> Result<Request> {
        requests::RequestRepo::apply_transition(&self.pool, transition).await
    }

    // ========== Design Operations ==========

    pub async fn get_design(&self, id: i64) -> Result<Option<Design>> {
        designs::DesignRepo::get(&self.pool, id).await
    }

    pub async fn get_design_by_request(&self, request_id: i64) -> Result<Option<Design>> {
        designs::DesignRepo::get_by_request(&self.pool, request_id).await
    }

    pub async fn create_design_with_transition(
        &self,
        created_by: i64,
        plan: &DesignPlan,
        transition: &Transition,
    ) -> Result<Design> {
        designs::DesignRepo::create_with_transition(&self.pool, created_by, plan, transition).await
    }

    pub async fn set_design_report(&self, request_id: i64, report_ref: &str) -> Result<Design> {
        designs::DesignRepo::set_report_ref(&self.pool, request_id, report_ref).await
    }

    // ========== Notification Operations ==========

    pub async fn list_notifications(&self, user_id: i64, unread_only: bool) -> Result<Vec<Notification>> {
        notifications::NotificationRepo::list_for_user(&self.pool, user_id, unread_only).await
    }

    pub async fn create_notification(
        &self,
        user_id: i64,
        request_id: i64,
        kind: NotificationKind,
        title: &str,
        message: &str,
    ) -> Result<Notification> {
        notifications::NotificationRepo::create(&self.pool, user_id, request_id, kind, title, message).await
    }

    pub async fn mark_notification_read(&self, id: i64, user_id: i64) -> Result<()> {
        notifications::NotificationRepo::mark_read(&self.pool, id, user_id).await
    }

    pub async fn mark_all_notifications_read(&self, user_id: i64) -> Result<u64> {
        notifications::NotificationRepo::mark_all_read(&self.pool, user_id).await
    }

    pub async fn count_unread_notifications(&self, user_id: i64) -> Result<i64> {
        notifications::NotificationRepo::count_unread(&self.pool, user_id).await
    }
}
