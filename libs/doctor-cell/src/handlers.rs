use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    Json,
};
use serde_json::{json, Value};
use tracing::warn;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::extractor::actor_from_user;

use crate::models::{DepartmentRequest, DirectoryError, RegisterDoctorRequest};
use crate::services::doctor::DoctorService;

/// Shared state for the doctor routes.
pub struct DoctorState {
    pub config: Arc<AppConfig>,
    pub doctors: DoctorService,
}

impl DoctorState {
    pub fn new(config: Arc<AppConfig>, doctors: DoctorService) -> Arc<Self> {
        Arc::new(Self { config, doctors })
    }
}

impl From<DirectoryError> for AppError {
    fn from(e: DirectoryError) -> Self {
        match e {
            DirectoryError::DoctorNotFound => AppError::NotFound("Doctor not found".to_string()),
            DirectoryError::DepartmentNotFound => AppError::NotFound("Department not found".to_string()),
            DirectoryError::Conflict(msg) => AppError::Conflict(msg),
            DirectoryError::ValidationError(msg) => AppError::ValidationError(msg),
            DirectoryError::Forbidden => AppError::Forbidden(e.to_string()),
            DirectoryError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}

// ==============================================================================
// DOCTOR HANDLERS
// ==============================================================================

/// Lists doctors for the booking form. Falls back to an empty list so the
/// form still renders when the directory is unreachable.
#[axum::debug_handler]
pub async fn list_doctors(State(state): State<Arc<DoctorState>>) -> Json<Value> {
    let doctors = state.doctors.list_doctors().await.unwrap_or_else(|e| {
        warn!("Doctor listing degraded to empty result: {}", e);
        Vec::new()
    });

    Json(json!({
        "doctors": doctors,
        "total": doctors.len()
    }))
}

#[axum::debug_handler]
pub async fn get_doctor(
    State(state): State<Arc<DoctorState>>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let doctor = state.doctors.get_doctor(doctor_id).await?;
    Ok(Json(json!(doctor)))
}

#[axum::debug_handler]
pub async fn register_doctor(
    State(state): State<Arc<DoctorState>>,
    Extension(user): Extension<User>,
    Json(request): Json<RegisterDoctorRequest>,
) -> Result<Json<Value>, AppError> {
    let actor = actor_from_user(&user)?;
    let doctor = state.doctors.register_doctor(&actor, request).await?;

    Ok(Json(json!({
        "success": true,
        "doctor": doctor,
        "message": "Doctor registered successfully"
    })))
}

// ==============================================================================
// DEPARTMENT HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_departments(State(state): State<Arc<DoctorState>>) -> Json<Value> {
    let departments = state.doctors.list_departments().await.unwrap_or_else(|e| {
        warn!("Department listing degraded to empty result: {}", e);
        Vec::new()
    });

    Json(json!(departments))
}

#[axum::debug_handler]
pub async fn create_department(
    State(state): State<Arc<DoctorState>>,
    Extension(user): Extension<User>,
    Json(request): Json<DepartmentRequest>,
) -> Result<Json<Value>, AppError> {
    let actor = actor_from_user(&user)?;
    let department = state.doctors.create_department(&actor, request).await?;

    Ok(Json(json!({
        "success": true,
        "department": department,
        "message": "Department created"
    })))
}

#[axum::debug_handler]
pub async fn update_department(
    State(state): State<Arc<DoctorState>>,
    Path(department_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Json(request): Json<DepartmentRequest>,
) -> Result<Json<Value>, AppError> {
    let actor = actor_from_user(&user)?;
    let department = state.doctors.update_department(&actor, department_id, request).await?;

    Ok(Json(json!({
        "success": true,
        "department": department,
        "message": "Department updated"
    })))
}

#[axum::debug_handler]
pub async fn delete_department(
    State(state): State<Arc<DoctorState>>,
    Path(department_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let actor = actor_from_user(&user)?;
    state.doctors.delete_department(&actor, department_id).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Department deleted"
    })))
}
