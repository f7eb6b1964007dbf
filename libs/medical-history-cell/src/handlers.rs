// libs/medical-history-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
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

use crate::models::{MedicalHistoryError, TimelineFilter, TimelineKindFilter};
use crate::services::timeline::{MedicalHistoryService, filter_timeline};

#[derive(Debug, Deserialize)]
pub struct TimelineQueryParams {
    pub kind: Option<TimelineKindFilter>,
    pub search: Option<String>,
    pub date_start: Option<NaiveDate>,
    pub date_end: Option<NaiveDate>,
}

/// Full medical history of a patient as a filterable, date-sorted list of
/// timeline entries.
#[axum::debug_handler]
pub async fn get_patient_timeline(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(patient_id): Path<Uuid>,
    Query(params): Query<TimelineQueryParams>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    let service = MedicalHistoryService::new(&state);

    let entries = service.build_timeline(patient_id, token).await
        .map_err(|e| match e {
            MedicalHistoryError::PatientNotFound => {
                AppError::NotFound("Patient not found".to_string())
            },
            MedicalHistoryError::DatabaseError(msg) => {
                AppError::Database(msg)
            },
        })?;

    let filter = TimelineFilter {
        kind: params.kind,
        search: params.search,
        date_start: params.date_start,
        date_end: params.date_end,
    };
    let entries = filter_timeline(entries, &filter);

    Ok(Json(json!({
        "patient_id": patient_id,
        "total": entries.len(),
        "entries": entries
    })))
}
