pub mod data;
pub mod health;
pub mod history;

use crate::store::SnapshotStore;
use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<SnapshotStore>,
}

impl AppState {
    pub fn new(store: Arc<SnapshotStore>) -> Self {
        Self { store }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/data/:file", get(data::get_file))
        .route("/v1/history/:company", get(history::get_history))
        .route("/v1/trend/:company", get(history::get_trend))
        .layer(cors)
        .with_state(state)
}
