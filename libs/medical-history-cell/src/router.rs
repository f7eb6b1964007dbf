// libs/medical-history-cell/src/router.rs
use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};

use shared_config::AppConfig;

use crate::handlers;

pub fn medical_history_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/{patient_id}/timeline", get(handlers::get_patient_timeline))
        .with_state(state)
}
