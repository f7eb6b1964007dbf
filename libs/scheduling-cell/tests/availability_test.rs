// libs/scheduling-cell/tests/availability_test.rs
use assert_matches::assert_matches;
use chrono::NaiveDate;
use serde_json::json;
use uuid::Uuid;
use wiremock::{Mock, MockServer, ResponseTemplate, matchers::{method, path, query_param}};

use scheduling_cell::models::SchedulingError;
use scheduling_cell::services::availability::{
    AvailabilityCheckService, intervals_overlap, minutes_since_midnight,
};
use shared_config::AppConfig;

// ==============================================================================
// TEST FIXTURES AND UTILITIES
// ==============================================================================

fn test_config(base_url: &str) -> AppConfig {
    AppConfig {
        supabase_url: base_url.to_string(),
        supabase_anon_key: "test-anon-key".to_string(),
    }
}

fn june_first() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
}

fn appointment_row(id: Uuid, doctor_id: Uuid, time: &str, duration_minutes: i32, status: &str) -> serde_json::Value {
    json!({
        "id": id,
        "patient_id": Uuid::new_v4(),
        "doctor_id": doctor_id,
        "date": "2024-06-01",
        "time": time,
        "duration_minutes": duration_minutes,
        "status": status,
        "reason": "Routine follow-up",
        "created_at": "2024-05-20T10:00:00Z",
        "updated_at": "2024-05-20T10:00:00Z"
    })
}

async fn mount_doctor(server: &MockServer, doctor_id: Uuid) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .and(query_param("id", format!("eq.{}", doctor_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": doctor_id,
            "first_name": "Leila",
            "last_name": "Mansouri",
            "specialty": "Cardiology"
        }])))
        .mount(server)
        .await;
}

async fn mount_appointments(server: &MockServer, rows: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(rows))
        .mount(server)
        .await;
}

// ==============================================================================
// CONFLICT DETECTION
// ==============================================================================

#[tokio::test]
async fn doctor_with_no_appointments_is_available() {
    let server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();

    mount_doctor(&server, doctor_id).await;
    mount_appointments(&server, json!([])).await;

    let service = AvailabilityCheckService::new(&test_config(&server.uri()));
    let check = service
        .check_availability(doctor_id, june_first(), "09:00", 30, None, "test-token")
        .await
        .unwrap();

    assert!(check.available);
    assert_eq!(check.conflicting_appointment_id, None);
}

#[tokio::test]
async fn overlapping_appointment_is_reported() {
    let server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();
    let busy_id = Uuid::new_v4();

    mount_doctor(&server, doctor_id).await;
    mount_appointments(&server, json!([
        appointment_row(busy_id, doctor_id, "09:00", 30, "scheduled")
    ])).await;

    let service = AvailabilityCheckService::new(&test_config(&server.uri()));
    let check = service
        .check_availability(doctor_id, june_first(), "09:15", 30, None, "test-token")
        .await
        .unwrap();

    assert!(!check.available);
    assert_eq!(check.conflicting_appointment_id, Some(busy_id));
}

#[tokio::test]
async fn adjacent_appointments_do_not_conflict() {
    let server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();

    mount_doctor(&server, doctor_id).await;
    mount_appointments(&server, json!([
        appointment_row(Uuid::new_v4(), doctor_id, "09:00", 30, "scheduled")
    ])).await;

    let service = AvailabilityCheckService::new(&test_config(&server.uri()));

    // 09:00-09:30 booked; 09:30-10:00 touches but does not overlap
    let check = service
        .check_availability(doctor_id, june_first(), "09:30", 30, None, "test-token")
        .await
        .unwrap();

    assert!(check.available);
}

#[tokio::test]
async fn cancelled_appointments_never_conflict() {
    let server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();

    mount_doctor(&server, doctor_id).await;
    mount_appointments(&server, json!([
        appointment_row(Uuid::new_v4(), doctor_id, "09:00", 60, "cancelled")
    ])).await;

    let service = AvailabilityCheckService::new(&test_config(&server.uri()));
    let check = service
        .check_availability(doctor_id, june_first(), "09:15", 30, None, "test-token")
        .await
        .unwrap();

    assert!(check.available);
}

#[tokio::test]
async fn completed_appointments_still_block_the_slot() {
    let server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();
    let busy_id = Uuid::new_v4();

    mount_doctor(&server, doctor_id).await;
    mount_appointments(&server, json!([
        appointment_row(busy_id, doctor_id, "14:00", 45, "completed")
    ])).await;

    let service = AvailabilityCheckService::new(&test_config(&server.uri()));
    let check = service
        .check_availability(doctor_id, june_first(), "14:30", 30, None, "test-token")
        .await
        .unwrap();

    assert!(!check.available);
    assert_eq!(check.conflicting_appointment_id, Some(busy_id));
}

#[tokio::test]
async fn excluded_appointment_does_not_conflict_with_itself() {
    let server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();
    let own_id = Uuid::new_v4();

    mount_doctor(&server, doctor_id).await;

    // Only matches when the service asks persistence to exclude the row;
    // any request without the id=neq filter falls through and fails.
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("neq.{}", own_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let service = AvailabilityCheckService::new(&test_config(&server.uri()));
    let check = service
        .check_availability(doctor_id, june_first(), "09:00", 30, Some(own_id), "test-token")
        .await
        .unwrap();

    assert!(check.available);
}

#[tokio::test]
async fn first_conflicting_appointment_is_surfaced() {
    let server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();
    let first_id = Uuid::new_v4();
    let second_id = Uuid::new_v4();

    mount_doctor(&server, doctor_id).await;
    mount_appointments(&server, json!([
        appointment_row(first_id, doctor_id, "09:00", 60, "scheduled"),
        appointment_row(second_id, doctor_id, "09:30", 60, "scheduled"),
    ])).await;

    let service = AvailabilityCheckService::new(&test_config(&server.uri()));
    let check = service
        .check_availability(doctor_id, june_first(), "09:45", 30, None, "test-token")
        .await
        .unwrap();

    assert!(!check.available);
    assert_eq!(check.conflicting_appointment_id, Some(first_id));
}

// ==============================================================================
// VALIDATION AND FAILURE SEMANTICS
// ==============================================================================

#[tokio::test]
async fn non_positive_duration_is_rejected_before_any_lookup() {
    // No mock server: validation must fail before persistence is touched
    let service = AvailabilityCheckService::new(&test_config("http://127.0.0.1:1"));

    let err = service
        .check_availability(Uuid::new_v4(), june_first(), "09:00", 0, None, "test-token")
        .await
        .unwrap_err();
    assert_matches!(err, SchedulingError::ValidationError(_));

    let err = service
        .check_availability(Uuid::new_v4(), june_first(), "09:00", -15, None, "test-token")
        .await
        .unwrap_err();
    assert_matches!(err, SchedulingError::ValidationError(_));
}

#[tokio::test]
async fn malformed_time_is_rejected_before_any_lookup() {
    let service = AvailabilityCheckService::new(&test_config("http://127.0.0.1:1"));

    for bad_time in ["quarter past nine", "25:00", "09h30", ""] {
        let err = service
            .check_availability(Uuid::new_v4(), june_first(), bad_time, 30, None, "test-token")
            .await
            .unwrap_err();
        assert_matches!(err, SchedulingError::ValidationError(_));
    }
}

#[tokio::test]
async fn unknown_doctor_is_an_error_not_an_open_calendar() {
    let server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let service = AvailabilityCheckService::new(&test_config(&server.uri()));
    let err = service
        .check_availability(doctor_id, june_first(), "09:00", 30, None, "test-token")
        .await
        .unwrap_err();

    assert_matches!(err, SchedulingError::DoctorNotFound);
}

#[tokio::test]
async fn persistence_failure_is_surfaced_not_treated_as_available() {
    let server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();

    mount_doctor(&server, doctor_id).await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(500).set_body_string("database unavailable"))
        .mount(&server)
        .await;

    let service = AvailabilityCheckService::new(&test_config(&server.uri()));
    let err = service
        .check_availability(doctor_id, june_first(), "09:00", 30, None, "test-token")
        .await
        .unwrap_err();

    assert_matches!(err, SchedulingError::DatabaseError(_));
}

// ==============================================================================
// INTERVAL ARITHMETIC
// ==============================================================================

#[test]
fn overlap_rule_is_half_open() {
    // [540, 570) vs [555, 585): overlapping
    assert!(intervals_overlap(540, 570, 555, 585));
    // Touching end-to-start never conflicts
    assert!(!intervals_overlap(540, 570, 570, 600));
    assert!(!intervals_overlap(570, 600, 540, 570));
    // Containment
    assert!(intervals_overlap(540, 600, 555, 565));
    // Disjoint
    assert!(!intervals_overlap(540, 570, 600, 630));
}

#[test]
fn minutes_since_midnight_parses_24h_times() {
    assert_eq!(minutes_since_midnight("00:00"), Some(0));
    assert_eq!(minutes_since_midnight("09:15"), Some(555));
    assert_eq!(minutes_since_midnight("23:59"), Some(1439));

    assert_eq!(minutes_since_midnight("24:00"), None);
    assert_eq!(minutes_since_midnight("9h30"), None);
    assert_eq!(minutes_since_midnight(""), None);
}
