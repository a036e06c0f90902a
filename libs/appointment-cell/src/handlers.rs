// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;
use uuid::Uuid;

use doctor_cell::services::DoctorDirectory;
use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::extractor::actor_from_user;

use crate::models::{
    AppointmentError, BookAppointmentRequest, CompleteAppointmentRequest, UpdatePrescriptionRequest,
};
use crate::services::{
    AppointmentBookingService, AppointmentRepository, AvailabilityIndex, CalendarAggregator, SlotCatalog,
};

/// Shared state for the appointment routes.
pub struct AppointmentState {
    pub config: Arc<AppConfig>,
    pub catalog: SlotCatalog,
    pub booking: AppointmentBookingService,
    pub availability: AvailabilityIndex,
    pub calendar: CalendarAggregator,
}

impl AppointmentState {
    pub fn new(
        config: Arc<AppConfig>,
        repository: Arc<dyn AppointmentRepository>,
        directory: Arc<dyn DoctorDirectory>,
    ) -> Arc<Self> {
        let catalog = SlotCatalog::new(config.clinic.clone());

        Arc::new(Self {
            booking: AppointmentBookingService::new(repository.clone(), directory, catalog.clone()),
            availability: AvailabilityIndex::new(repository, catalog.clone()),
            calendar: CalendarAggregator::new(catalog.clone()),
            catalog,
            config,
        })
    }
}

impl From<AppointmentError> for AppError {
    fn from(e: AppointmentError) -> Self {
        match e {
            AppointmentError::NotFound
            | AppointmentError::DoctorNotFound
            | AppointmentError::PrescriptionNotFound => AppError::NotFound(e.to_string()),
            AppointmentError::ConflictDetected => AppError::Conflict(e.to_string()),
            AppointmentError::Forbidden(msg) => AppError::Forbidden(msg),
            AppointmentError::InvalidStatusTransition(_) | AppointmentError::InvalidPrescriptionTransition(_) => {
                AppError::InvalidState(e.to_string())
            }
            AppointmentError::ValidationError(msg) => AppError::ValidationError(msg),
            AppointmentError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}

// ==============================================================================
// QUERY PARAMETER STRUCTS
// ==============================================================================

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub date: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct CalendarQuery {
    pub year: i32,
    pub month: u32,
    pub selected: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteQuery {
    #[serde(default)]
    pub confirm: bool,
}

// ==============================================================================
// SLOT & AVAILABILITY HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_slots(State(state): State<Arc<AppointmentState>>) -> Json<Value> {
    Json(json!({
        "slots": state.catalog.generate_slots(),
        "slot_minutes": state.config.clinic.slot_minutes
    }))
}

#[axum::debug_handler]
pub async fn get_availability(
    State(state): State<Arc<AppointmentState>>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<AvailabilityQuery>,
) -> Json<Value> {
    let availability = state.availability.day_availability(doctor_id, query.date).await;
    Json(json!(availability))
}

// ==============================================================================
// APPOINTMENT HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_appointments(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let actor = actor_from_user(&user)?;
    let appointments = state.booking.list_for(&actor).await;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<User>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let actor = actor_from_user(&user)?;
    let appointment = state.booking.book(&actor, request).await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment booked successfully"
    })))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppointmentState>>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let actor = actor_from_user(&user)?;
    let appointment = state.booking.get(appointment_id, &actor).await?;
    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn complete_appointment(
    State(state): State<Arc<AppointmentState>>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Json(request): Json<CompleteAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let actor = actor_from_user(&user)?;
    let appointment = state.booking.complete_with(appointment_id, &actor, &request).await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Consultation recorded"
    })))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<Arc<AppointmentState>>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let actor = actor_from_user(&user)?;
    let appointment = state.booking.cancel(appointment_id, &actor).await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment cancelled successfully"
    })))
}

/// Irreversible; the caller must pass `?confirm=true`.
#[axum::debug_handler]
pub async fn delete_appointment(
    State(state): State<Arc<AppointmentState>>,
    Path(appointment_id): Path<Uuid>,
    Query(query): Query<DeleteQuery>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let actor = actor_from_user(&user)?;

    if !query.confirm {
        return Err(AppError::BadRequest(
            "Deleting an appointment is permanent; repeat with confirm=true".to_string(),
        ));
    }

    state.booking.delete(appointment_id, &actor).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Appointment deleted"
    })))
}

// ==============================================================================
// CALENDAR HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn month_calendar(
    State(state): State<Arc<AppointmentState>>,
    Query(query): Query<CalendarQuery>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let actor = actor_from_user(&user)?;
    let appointments = state.booking.list_for(&actor).await;
    let today = state.catalog.local_date(Utc::now());

    let grid = state
        .calendar
        .month_grid(&appointments, query.year, query.month, today, query.selected)?;

    // A selection carried over from a longer month must not hide the grid
    let selected_appointments = match query.selected {
        Some(day) if grid.days.iter().any(|d| d.day == day) => state
            .calendar
            .day_appointments(&appointments, query.year, query.month, day)?,
        Some(day) => {
            warn!("Selected day {} is outside {}-{:02}; ignoring", day, query.year, query.month);
            Vec::new()
        }
        None => Vec::new(),
    };

    Ok(Json(json!({
        "grid": grid,
        "selected_appointments": selected_appointments
    })))
}

#[axum::debug_handler]
pub async fn day_calendar(
    State(state): State<Arc<AppointmentState>>,
    Path((year, month, day)): Path<(i32, u32, u32)>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let actor = actor_from_user(&user)?;
    let appointments = state.booking.list_for(&actor).await;
    let day_appointments = state.calendar.day_appointments(&appointments, year, month, day)?;

    Ok(Json(json!({
        "date": format!("{}-{:02}-{:02}", year, month, day),
        "appointments": day_appointments,
        "total": day_appointments.len()
    })))
}

// ==============================================================================
// PRESCRIPTION & HISTORY HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_prescriptions(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let actor = actor_from_user(&user)?;
    let prescriptions = state.booking.prescriptions_for(&actor).await;

    Ok(Json(json!({
        "prescriptions": prescriptions,
        "total": prescriptions.len()
    })))
}

#[axum::debug_handler]
pub async fn update_prescription(
    State(state): State<Arc<AppointmentState>>,
    Path(prescription_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdatePrescriptionRequest>,
) -> Result<Json<Value>, AppError> {
    let actor = actor_from_user(&user)?;
    let prescription = state
        .booking
        .update_prescription_status(prescription_id, &actor, request.status)
        .await?;

    Ok(Json(json!({
        "success": true,
        "prescription": prescription,
        "message": "Prescription updated"
    })))
}

#[axum::debug_handler]
pub async fn list_patients(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let actor = actor_from_user(&user)?;
    let patients = state.booking.patients_for(&actor).await?;

    Ok(Json(json!({
        "patients": patients,
        "total": patients.len()
    })))
}

#[axum::debug_handler]
pub async fn patient_history(
    State(state): State<Arc<AppointmentState>>,
    Path(patient_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let actor = actor_from_user(&user)?;
    let history = state.booking.patient_history(patient_id, &actor).await.map_err(|e| {
        if matches!(e, AppointmentError::Forbidden(_)) {
            warn!("User {} denied history of patient {}", actor.id, patient_id);
        }
        e
    })?;

    Ok(Json(json!(history)))
}
