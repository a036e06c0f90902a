use assert_matches::assert_matches;
use chrono::{NaiveDate, TimeZone, Utc};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use appointment_cell::models::{Appointment, AppointmentError, AppointmentStatus, StatusChange};
use appointment_cell::services::{
    AppointmentRepository, AvailabilityIndex, SlotCatalog, SupabaseAppointmentRepository,
};
use shared_utils::test_utils::{MockSupabaseResponses, TestConfig};

async fn repository(mock_server: &MockServer) -> SupabaseAppointmentRepository {
    let config = TestConfig::with_supabase_url(mock_server.uri()).to_app_config();
    SupabaseAppointmentRepository::new(&config)
}

#[tokio::test]
async fn test_insert_maps_unique_violation_to_conflict() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .and(header("prefer", "return=representation"))
        .and(body_partial_json(json!({ "status": "scheduled" })))
        .respond_with(ResponseTemplate::new(409).set_body_json(MockSupabaseResponses::error_response(
            "duplicate key value violates unique constraint \"appointments_active_slot\"",
            "23505",
        )))
        .mount(&mock_server)
        .await;

    let repo = repository(&mock_server).await;
    let appointment = Appointment::new_scheduled(
        Uuid::new_v4(),
        Uuid::new_v4(),
        Utc.with_ymd_and_hms(2024, 3, 15, 9, 0, 0).unwrap(),
    );

    assert_eq!(
        repo.insert_if_slot_free(appointment).await,
        Err(AppointmentError::ConflictDetected)
    );
}

#[tokio::test]
async fn test_insert_returns_stored_row() {
    let mock_server = MockServer::start().await;
    let appointment = Appointment::new_scheduled(
        Uuid::new_v4(),
        Uuid::new_v4(),
        Utc.with_ymd_and_hms(2024, 3, 15, 9, 0, 0).unwrap(),
    );

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .and(header("authorization", "Bearer test-service-key"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([MockSupabaseResponses::appointment_row(
            appointment.id,
            appointment.doctor_id,
            appointment.patient_id,
            "2024-03-15T09:00:00Z",
            "scheduled",
        )])))
        .mount(&mock_server)
        .await;

    let stored = repository(&mock_server).await.insert_if_slot_free(appointment.clone()).await.unwrap();
    assert_eq!(stored.id, appointment.id);
    assert_eq!(stored.status, AppointmentStatus::Scheduled);
}

#[tokio::test]
async fn test_lost_transition_race_reports_current_status() {
    let mock_server = MockServer::start().await;
    let id = Uuid::new_v4();

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", id)))
        .and(query_param("status", "eq.scheduled"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([MockSupabaseResponses::appointment_row(
            id,
            Uuid::new_v4(),
            Uuid::new_v4(),
            "2024-03-15T09:00:00Z",
            "cancelled",
        )])))
        .mount(&mock_server)
        .await;

    let result = repository(&mock_server)
        .await
        .transition(id, AppointmentStatus::Scheduled, StatusChange::Cancel)
        .await;

    assert_eq!(
        result,
        Err(AppointmentError::InvalidStatusTransition(AppointmentStatus::Cancelled))
    );
}

#[tokio::test]
async fn test_transition_on_missing_row_is_not_found() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let result = repository(&mock_server)
        .await
        .transition(Uuid::new_v4(), AppointmentStatus::Scheduled, StatusChange::Cancel)
        .await;

    assert_eq!(result, Err(AppointmentError::NotFound));
}

#[tokio::test]
async fn test_remove_missing_row_is_not_found() {
    let mock_server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    assert_matches!(
        repository(&mock_server).await.remove(Uuid::new_v4()).await,
        Err(AppointmentError::NotFound)
    );
}

#[tokio::test]
async fn test_availability_ignores_cancelled_rows() {
    let mock_server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("doctor_id", format!("eq.{}", doctor_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::appointment_row(Uuid::new_v4(), doctor_id, Uuid::new_v4(), "2024-03-15T09:00:00Z", "scheduled"),
            MockSupabaseResponses::appointment_row(Uuid::new_v4(), doctor_id, Uuid::new_v4(), "2024-03-15T10:00:00Z", "cancelled"),
            MockSupabaseResponses::appointment_row(Uuid::new_v4(), doctor_id, Uuid::new_v4(), "2024-03-15T11:00:00Z", "completed"),
        ])))
        .mount(&mock_server)
        .await;

    let index = AvailabilityIndex::new(
        std::sync::Arc::new(repository(&mock_server).await),
        SlotCatalog::default(),
    );
    let day = index
        .day_availability(doctor_id, NaiveDate::from_ymd_opt(2024, 3, 15).unwrap())
        .await;

    assert!(day.is_busy("09:00"));
    assert!(!day.is_busy("10:00"));
    assert!(day.is_busy("11:00"));
}

#[tokio::test]
async fn test_availability_degrades_to_all_free_on_failure() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
        .mount(&mock_server)
        .await;

    let index = AvailabilityIndex::new(
        std::sync::Arc::new(repository(&mock_server).await),
        SlotCatalog::default(),
    );
    let day = index
        .day_availability(Uuid::new_v4(), NaiveDate::from_ymd_opt(2024, 3, 15).unwrap())
        .await;

    assert_eq!(day.slots.len(), 18);
    assert!(day.busy.is_empty());
}
