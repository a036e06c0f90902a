// libs/doctor-cell/src/services/doctor.rs
use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_models::auth::Actor;

use crate::models::{
    Department, DepartmentRequest, DirectoryError, Doctor, DoctorProfile, RegisterDoctorRequest,
};
use crate::services::directory::DoctorDirectory;

/// Directory operations with the permission and validation rules applied.
pub struct DoctorService {
    directory: Arc<dyn DoctorDirectory>,
}

impl DoctorService {
    pub fn new(directory: Arc<dyn DoctorDirectory>) -> Self {
        Self { directory }
    }

    pub fn directory(&self) -> Arc<dyn DoctorDirectory> {
        Arc::clone(&self.directory)
    }

    /// All doctors with their department attached, ordered by name.
    pub async fn list_doctors(&self) -> Result<Vec<DoctorProfile>, DirectoryError> {
        let doctors = self.directory.list_doctors().await?;
        let departments: HashMap<Uuid, Department> = self
            .directory
            .list_departments()
            .await?
            .into_iter()
            .map(|d| (d.id, d))
            .collect();

        debug!("Listing {} doctors across {} departments", doctors.len(), departments.len());

        Ok(doctors
            .into_iter()
            .map(|doctor| {
                let department = doctor.department_id.and_then(|id| departments.get(&id).cloned());
                DoctorProfile { doctor, department }
            })
            .collect())
    }

    pub async fn get_doctor(&self, doctor_id: Uuid) -> Result<Doctor, DirectoryError> {
        self.directory
            .get_doctor(doctor_id)
            .await?
            .ok_or(DirectoryError::DoctorNotFound)
    }

    pub async fn register_doctor(
        &self,
        actor: &Actor,
        request: RegisterDoctorRequest,
    ) -> Result<Doctor, DirectoryError> {
        require_admin(actor)?;

        if request.name.trim().is_empty() {
            return Err(DirectoryError::ValidationError("Doctor name is required".to_string()));
        }

        let doctor = self.directory.upsert_doctor(request).await?;
        info!("Registered doctor {} ({})", doctor.id, doctor.name);
        Ok(doctor)
    }

    pub async fn list_departments(&self) -> Result<Vec<Department>, DirectoryError> {
        self.directory.list_departments().await
    }

    pub async fn create_department(
        &self,
        actor: &Actor,
        request: DepartmentRequest,
    ) -> Result<Department, DirectoryError> {
        require_admin(actor)?;
        let request = validate_department(request)?;

        let department = self.directory.create_department(request).await?;
        info!("Created department {} ({})", department.id, department.name);
        Ok(department)
    }

    pub async fn update_department(
        &self,
        actor: &Actor,
        department_id: Uuid,
        request: DepartmentRequest,
    ) -> Result<Department, DirectoryError> {
        require_admin(actor)?;
        let request = validate_department(request)?;

        self.directory.update_department(department_id, request).await
    }

    pub async fn delete_department(&self, actor: &Actor, department_id: Uuid) -> Result<(), DirectoryError> {
        require_admin(actor)?;

        self.directory.delete_department(department_id).await?;
        info!("Deleted department {}", department_id);
        Ok(())
    }
}

fn require_admin(actor: &Actor) -> Result<(), DirectoryError> {
    if !actor.is_admin() {
        warn!("Non-admin {} attempted a directory change", actor.id);
        return Err(DirectoryError::Forbidden);
    }
    Ok(())
}

fn validate_department(request: DepartmentRequest) -> Result<DepartmentRequest, DirectoryError> {
    let name = request.name.trim().to_string();
    if name.is_empty() {
        return Err(DirectoryError::ValidationError("Department name is required".to_string()));
    }

    Ok(DepartmentRequest {
        name,
        description: request.description.filter(|d| !d.trim().is_empty()),
    })
}
