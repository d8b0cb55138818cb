use axum::{extract::DefaultBodyLimit, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod routes;
pub mod services;

use services::dataset_store::DatasetStore;

// Application state
pub struct AppState {
    pub config: config::Config,
    pub datasets: DatasetStore,
}

impl AppState {
    pub fn new(config: config::Config) -> Self {
        let datasets = DatasetStore::new(config.cache_capacity);
        Self { config, datasets }
    }
}

pub fn app(state: Arc<AppState>) -> Router {
    let body_limit = state.config.max_file_size;
    Router::new()
        .merge(routes::health_routes())
        .merge(routes::datasets::routes())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
