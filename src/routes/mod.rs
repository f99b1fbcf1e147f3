use axum::{
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::services::{CatalogConnector, Curator};

pub mod recommendations;
pub mod subscriptions;
pub mod user;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub curator: Arc<Curator>,
    pub catalogs: Arc<dyn CatalogConnector>,
}

impl AppState {
    pub fn new(curator: Curator, catalogs: Arc<dyn CatalogConnector>) -> Self {
        Self {
            curator: Arc::new(curator),
            catalogs,
        }
    }
}

/// Creates the application router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_routes())
        .with_state(state)
}

/// API routes under /api, all acting for a [`crate::middleware::Viewer`]
fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/subscriptions", get(subscriptions::recent))
        .route("/recommended", get(recommendations::recommended))
        .route("/recommended/refresh", post(recommendations::refresh))
        .route("/video/:id/reject", post(recommendations::reject))
        .route("/user/settings", get(user::get_settings).put(user::update_settings))
        .route("/user/stats", get(user::stats))
        .route("/user/rejections", get(user::rejections))
}

async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}
