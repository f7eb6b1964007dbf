use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};

use medical_history_cell::router::medical_history_routes;
use scheduling_cell::router::scheduling_routes;
use shared_config::AppConfig;

pub fn create_router(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(|| async { "Polyclinic API is running!" }))
        .nest("/appointments", scheduling_routes(state.clone()))
        .nest("/patients", medical_history_routes(state.clone()))
}
