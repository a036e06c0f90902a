// libs/doctor-cell/src/services/directory.rs
use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::models::{Department, DepartmentRequest, DirectoryError, Doctor, RegisterDoctorRequest};

/// Storage seam for the doctor/department directory.
#[async_trait]
pub trait DoctorDirectory: Send + Sync {
    async fn list_doctors(&self) -> Result<Vec<Doctor>, DirectoryError>;

    async fn get_doctor(&self, doctor_id: Uuid) -> Result<Option<Doctor>, DirectoryError>;

    async fn upsert_doctor(&self, request: RegisterDoctorRequest) -> Result<Doctor, DirectoryError>;

    async fn list_departments(&self) -> Result<Vec<Department>, DirectoryError>;

    async fn create_department(&self, request: DepartmentRequest) -> Result<Department, DirectoryError>;

    async fn update_department(
        &self,
        department_id: Uuid,
        request: DepartmentRequest,
    ) -> Result<Department, DirectoryError>;

    async fn delete_department(&self, department_id: Uuid) -> Result<(), DirectoryError>;
}

#[derive(Default)]
struct DirectoryState {
    doctors: HashMap<Uuid, Doctor>,
    departments: HashMap<Uuid, Department>,
}

/// Process-local directory used when no database is configured and in tests.
#[derive(Default)]
pub struct InMemoryDoctorDirectory {
    state: RwLock<DirectoryState>,
}

impl InMemoryDoctorDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries(departments: Vec<Department>, doctors: Vec<Doctor>) -> Self {
        let state = DirectoryState {
            doctors: doctors.into_iter().map(|d| (d.id, d)).collect(),
            departments: departments.into_iter().map(|d| (d.id, d)).collect(),
        };
        Self { state: RwLock::new(state) }
    }
}

#[async_trait]
impl DoctorDirectory for InMemoryDoctorDirectory {
    async fn list_doctors(&self) -> Result<Vec<Doctor>, DirectoryError> {
        let state = self.state.read().await;
        let mut doctors: Vec<Doctor> = state.doctors.values().cloned().collect();
        doctors.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(doctors)
    }

    async fn get_doctor(&self, doctor_id: Uuid) -> Result<Option<Doctor>, DirectoryError> {
        Ok(self.state.read().await.doctors.get(&doctor_id).cloned())
    }

    async fn upsert_doctor(&self, request: RegisterDoctorRequest) -> Result<Doctor, DirectoryError> {
        let mut state = self.state.write().await;

        if let Some(department_id) = request.department_id {
            if !state.departments.contains_key(&department_id) {
                return Err(DirectoryError::DepartmentNotFound);
            }
        }

        let doctor = Doctor {
            id: request.id,
            name: request.name,
            email: request.email,
            department_id: request.department_id,
            specialization: request.specialization,
        };
        state.doctors.insert(doctor.id, doctor.clone());
        debug!("Directory now holds {} doctors", state.doctors.len());

        Ok(doctor)
    }

    async fn list_departments(&self) -> Result<Vec<Department>, DirectoryError> {
        let state = self.state.read().await;
        let mut departments: Vec<Department> = state.departments.values().cloned().collect();
        departments.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(departments)
    }

    async fn create_department(&self, request: DepartmentRequest) -> Result<Department, DirectoryError> {
        let mut state = self.state.write().await;

        if state.departments.values().any(|d| d.name.eq_ignore_ascii_case(&request.name)) {
            return Err(DirectoryError::Conflict(format!("Department '{}' already exists", request.name)));
        }

        let department = Department {
            id: Uuid::new_v4(),
            name: request.name,
            description: request.description,
        };
        state.departments.insert(department.id, department.clone());

        Ok(department)
    }

    async fn update_department(
        &self,
        department_id: Uuid,
        request: DepartmentRequest,
    ) -> Result<Department, DirectoryError> {
        let mut state = self.state.write().await;

        if state
            .departments
            .values()
            .any(|d| d.id != department_id && d.name.eq_ignore_ascii_case(&request.name))
        {
            return Err(DirectoryError::Conflict(format!("Department '{}' already exists", request.name)));
        }

        let department = state
            .departments
            .get_mut(&department_id)
            .ok_or(DirectoryError::DepartmentNotFound)?;
        department.name = request.name;
        department.description = request.description;

        Ok(department.clone())
    }

    async fn delete_department(&self, department_id: Uuid) -> Result<(), DirectoryError> {
        let mut state = self.state.write().await;

        state
            .departments
            .remove(&department_id)
            .ok_or(DirectoryError::DepartmentNotFound)?;

        // Doctors keep working without a department
        for doctor in state.doctors.values_mut() {
            if doctor.department_id == Some(department_id) {
                doctor.department_id = None;
            }
        }

        Ok(())
    }
}
