mod auth;
mod config;
mod db;
mod handlers;
mod models;
mod planner;
mod router;
mod services;
mod workflow;
mod ws;

use std::sync::Arc;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::Config;
use db::Store;
use services::{HtmlReportRenderer, StoreNotifier, WorkflowService};
use ws::Hub;

/// Application state shared across handlers
pub struct AppState {
    pub store: Store,
    pub config: Config,
    pub workflow: Arc<WorkflowService>,
    pub ws_hub: Option<Arc<Hub>>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "campus_planner=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let mut cfg = Config::load();
    if cfg.jwt_secret.is_empty() {
        tracing::warn!("JWT_SECRET not set - generating random secret (tokens will be invalidated on restart)");
        cfg.jwt_secret = uuid::Uuid::new_v4().to_string();
    }
    tracing::info!("Starting Campus Planner");
    tracing::info!("Database: {}", cfg.db_path);
    tracing::info!("Reports Dir: {}", cfg.reports_dir);
    tracing::info!("Listen: {}", cfg.listen_addr);

    // Initialize database
    let store = Store::with_pool_size(&cfg.db_path, cfg.db_max_connections).await?;
    tracing::info!("Database initialized (pool_size={})", cfg.db_max_connections);

    tokio::fs::create_dir_all(&cfg.reports_dir).await?;

    // Initialize WebSocket hub
    let ws_hub = Arc::new(Hub::new());

    let notifier = Arc::new(StoreNotifier::new(store.clone(), Some(ws_hub.clone())));
    let renderer = Arc::new(HtmlReportRenderer::new(&cfg.reports_dir)?);
    let workflow = Arc::new(WorkflowService::new(
        store.clone(),
        notifier,
        renderer,
        Some(ws_hub.clone()),
    ));

    // Create app state
    let state = Arc::new(AppState {
        store,
        config: cfg.clone(),
        workflow,
        ws_hub: Some(ws_hub),
    });

    // Build router
    let app = router::build(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&cfg.listen_addr).await?;
    tracing::info!("Campus Planner listening on {}", cfg.listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Campus Planner shutting down");
    Ok(())
}

/// WebSocket upgrade handler; each socket only receives its user's events
pub async fn ws_upgrade_handler(
    auth: auth::AuthUser,
    ws: axum::extract::ws::WebSocketUpgrade,
    axum::extract::State(state): axum::extract::State<Arc<AppState>>,
) -> axum::response::Response {
    use axum::response::IntoResponse;

    if let Some(hub) = &state.ws_hub {
        ws::ws_handler(ws, hub.clone(), auth.actor.user_id)
    } else {
        axum::http::StatusCode::SERVICE_UNAVAILABLE.into_response()
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => { sig.recv().await; }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
