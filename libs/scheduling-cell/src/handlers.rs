// libs/scheduling-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use serde::Deserialize;
use serde_json::{json, Value};
use chrono::NaiveDate;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::error::AppError;

use crate::models::SchedulingError;
use crate::services::availability::AvailabilityCheckService;

#[derive(Debug, Deserialize)]
pub struct AvailabilityQueryParams {
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub time: String,
    pub duration_minutes: i32,
    pub exclude_appointment_id: Option<Uuid>,
}

/// Advisory availability check used by the booking flow before submission.
/// A failed check must block the submission on the caller's side; it is
/// never equivalent to "available".
#[axum::debug_handler]
pub async fn check_doctor_availability(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Query(params): Query<AvailabilityQueryParams>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    let service = AvailabilityCheckService::new(&state);

    let check = service.check_availability(
        params.doctor_id,
        params.date,
        &params.time,
        params.duration_minutes,
        params.exclude_appointment_id,
        token,
    ).await.map_err(|e| match e {
        SchedulingError::DoctorNotFound => {
            AppError::NotFound("Doctor not found".to_string())
        },
        SchedulingError::ValidationError(msg) => {
            AppError::ValidationError(msg)
        },
        SchedulingError::DatabaseError(msg) => {
            AppError::Database(msg)
        },
    })?;

    let message = if check.available {
        "The doctor is available at the requested time"
    } else {
        "The requested slot overlaps an existing appointment"
    };

    Ok(Json(json!({
        "available": check.available,
        "conflicting_appointment_id": check.conflicting_appointment_id,
        "message": message
    })))
}
