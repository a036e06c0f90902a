// libs/appointment-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, put},
    Router,
};

use shared_utils::extractor::auth_middleware;

use crate::handlers::{self, AppointmentState};

pub fn appointment_routes(state: Arc<AppointmentState>) -> Router {
    Router::new()
        .route("/", get(handlers::list_appointments).post(handlers::book_appointment))
        .route("/slots", get(handlers::list_slots))
        .route("/availability/{doctor_id}", get(handlers::get_availability))
        // Calendar views
        .route("/calendar", get(handlers::month_calendar))
        .route("/calendar/{year}/{month}/{day}", get(handlers::day_calendar))
        // Prescriptions and clinical history
        .route("/prescriptions", get(handlers::list_prescriptions))
        .route("/prescriptions/{prescription_id}", put(handlers::update_prescription))
        .route("/patients", get(handlers::list_patients))
        .route("/patients/{patient_id}/history", get(handlers::patient_history))
        // Single appointment lifecycle
        .route(
            "/{appointment_id}",
            get(handlers::get_appointment).delete(handlers::delete_appointment),
        )
        .route("/{appointment_id}/complete", put(handlers::complete_appointment))
        .route("/{appointment_id}/cancel", put(handlers::cancel_appointment))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware))
        .with_state(state)
}
