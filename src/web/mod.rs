use axum::{
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    trace::{DefaultMakeSpan, TraceLayer},
};
use tracing::Level;

use crate::config::AppConfig;
use crate::render::PageRenderer;
use crate::scheduler::CheckScheduler;
use crate::store::Store;

pub mod handlers;
pub mod responses;

pub use handlers::{
    create_watcher, delete_watcher, detect_selector, get_watcher, list_watchers, run_checks,
    test_check, update_watcher,
};
pub use responses::*;

#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub scheduler: Arc<CheckScheduler>,
    pub renderer: Arc<dyn PageRenderer>,
    pub config: AppConfig,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health_check))
        // API routes
        .nest("/api", api_routes())
        // Add middleware
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                        .on_response(
                            tower_http::trace::DefaultOnResponse::new().level(Level::INFO),
                        ),
                )
                .layer(CompressionLayer::new())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        // Watcher management
        .route("/watchers", get(list_watchers).post(create_watcher))
        .route(
            "/watchers/:id",
            get(get_watcher).put(update_watcher).delete(delete_watcher),
        )
        // Extraction tooling
        .route("/detect-selector", post(detect_selector))
        .route("/test-check", post(test_check))
        // Job control
        .route("/jobs/run-checks", post(run_checks))
}

// Health check endpoint
async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now(),
        "version": env!("CARGO_PKG_VERSION"),
        "service": "pricewatch"
    }))
}

pub async fn serve(config: AppConfig, state: AppState) -> anyhow::Result<()> {
    let app = create_router(state);

    let listener =
        tokio::net::TcpListener::bind(format!("{}:{}", config.server.host, config.server.port))
            .await?;

    tracing::info!(
        "Server starting on {}:{}",
        config.server.host,
        config.server.port
    );

    axum::serve(listener, app).await?;

    Ok(())
}
