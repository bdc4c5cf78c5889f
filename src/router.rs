use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::AppState;

/// Build the application router with all routes
pub fn build(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(handlers::healthcheck))
        // Auth routes
        .route("/api/auth/login", post(handlers::auth::login))
        .route("/api/auth/me", get(handlers::auth::me))
        // User routes
        .route("/api/users", get(handlers::users::list_users).post(handlers::users::create_user))
        .route(
            "/api/users/:id",
            get(handlers::users::get_user)
                .put(handlers::users::update_user)
                .delete(handlers::users::delete_user),
        )
        // Catalog routes
        .route("/api/catalog", get(handlers::catalog::list_devices).post(handlers::catalog::create_device))
        .route(
            "/api/catalog/:id",
            get(handlers::catalog::get_device)
                .put(handlers::catalog::update_device)
                .delete(handlers::catalog::delete_device),
        )
        // Request routes
        .route("/api/requests", get(handlers::requests::list_requests))
        .route("/api/requests", post(handlers::requests::submit_requirements))
        .route("/api/requests/:id", get(handlers::requests::get_request))
        .route("/api/requests/:id/assign", post(handlers::requests::assign))
        .route("/api/requests/:id/installer", post(handlers::requests::assign_installer))
        .route("/api/requests/:id/status", put(handlers::requests::override_status))
        // Design routes
        .route("/api/requests/:id/design", get(handlers::designs::get_design))
        .route("/api/requests/:id/design", post(handlers::designs::generate_design))
        .route("/api/requests/:id/design/topology.dot", get(handlers::designs::get_topology_dot))
        .route(
            "/api/requests/:id/design/report",
            get(handlers::designs::get_report).post(handlers::designs::render_report),
        )
        .route("/api/requests/:id/design/submit", post(handlers::designs::submit_design))
        .route("/api/requests/:id/design/approve", post(handlers::designs::approve_design))
        .route("/api/requests/:id/design/accept", post(handlers::designs::accept_design))
        // Installation routes
        .route("/api/requests/:id/installation/progress", post(handlers::installation::update_progress))
        .route("/api/requests/:id/installation/complete", post(handlers::installation::complete_installation))
        .route("/api/requests/:id/installation/verify", post(handlers::installation::verify_installation))
        // Notification routes
        .route("/api/notifications", get(handlers::notifications::list_notifications))
        .route("/api/notifications/unread-count", get(handlers::notifications::unread_count))
        .route("/api/notifications/read-all", post(handlers::notifications::mark_all_read))
        .route("/api/notifications/:id/read", post(handlers::notifications::mark_read))
        // WebSocket route
        .route("/api/ws", get(crate::ws_upgrade_handler))
        // Add state and middleware
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}
