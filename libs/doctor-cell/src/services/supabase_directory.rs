// libs/doctor-cell/src/services/supabase_directory.rs
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::{supabase_error, SupabaseClient};

use crate::models::{Department, DepartmentRequest, DirectoryError, Doctor, RegisterDoctorRequest};
use crate::services::directory::DoctorDirectory;

/// Directory backed by the `doctors` and `departments` tables.
pub struct SupabaseDoctorDirectory {
    supabase: Arc<SupabaseClient>,
    service_key: String,
}

impl SupabaseDoctorDirectory {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
            service_key: config.supabase_service_key.clone(),
        }
    }

    async fn fetch<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>, DirectoryError> {
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, path, Some(&self.service_key), None)
            .await
            .map_err(map_database_error)?;

        parse_rows(rows)
    }

    async fn write<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Vec<T>, DirectoryError> {
        self.write_with_headers(method, path, body, SupabaseClient::return_representation())
            .await
    }

    async fn write_with_headers<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        headers: HeaderMap,
    ) -> Result<Vec<T>, DirectoryError> {
        let rows: Vec<Value> = self
            .supabase
            .request_with_headers(method, path, Some(&self.service_key), body, Some(headers))
            .await
            .map_err(map_database_error)?;

        parse_rows(rows)
    }
}

fn parse_rows<T: DeserializeOwned>(rows: Vec<Value>) -> Result<Vec<T>, DirectoryError> {
    rows.into_iter()
        .map(serde_json::from_value)
        .collect::<Result<Vec<T>, _>>()
        .map_err(|e| DirectoryError::DatabaseError(format!("Failed to parse directory rows: {}", e)))
}

fn map_database_error(err: anyhow::Error) -> DirectoryError {
    match supabase_error(&err) {
        Some(e) if e.is_conflict() => DirectoryError::Conflict(e.message.clone()),
        _ => DirectoryError::DatabaseError(err.to_string()),
    }
}

#[async_trait]
impl DoctorDirectory for SupabaseDoctorDirectory {
    async fn list_doctors(&self) -> Result<Vec<Doctor>, DirectoryError> {
        debug!("Listing doctors");
        self.fetch("/rest/v1/doctors?order=name.asc").await
    }

    async fn get_doctor(&self, doctor_id: Uuid) -> Result<Option<Doctor>, DirectoryError> {
        let path = format!("/rest/v1/doctors?id=eq.{}", doctor_id);
        Ok(self.fetch::<Doctor>(&path).await?.into_iter().next())
    }

    async fn upsert_doctor(&self, request: RegisterDoctorRequest) -> Result<Doctor, DirectoryError> {
        let body = json!({
            "id": request.id,
            "name": request.name,
            "email": request.email,
            "department_id": request.department_id,
            "specialization": request.specialization,
        });

        let mut headers = SupabaseClient::return_representation();
        headers.insert(
            "Prefer",
            HeaderValue::from_static("return=representation,resolution=merge-duplicates"),
        );

        self.write_with_headers::<Doctor>(Method::POST, "/rest/v1/doctors?on_conflict=id", Some(body), headers)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| DirectoryError::DatabaseError("Doctor registration returned no row".to_string()))
    }

    async fn list_departments(&self) -> Result<Vec<Department>, DirectoryError> {
        self.fetch("/rest/v1/departments?order=name.asc").await
    }

    async fn create_department(&self, request: DepartmentRequest) -> Result<Department, DirectoryError> {
        let body = json!({
            "id": Uuid::new_v4(),
            "name": request.name,
            "description": request.description,
        });

        self.write::<Department>(Method::POST, "/rest/v1/departments", Some(body))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| DirectoryError::DatabaseError("Department insert returned no row".to_string()))
    }

    async fn update_department(
        &self,
        department_id: Uuid,
        request: DepartmentRequest,
    ) -> Result<Department, DirectoryError> {
        let path = format!("/rest/v1/departments?id=eq.{}", department_id);
        let body = json!({
            "name": request.name,
            "description": request.description,
        });

        self.write::<Department>(Method::PATCH, &path, Some(body))
            .await?
            .into_iter()
            .next()
            .ok_or(DirectoryError::DepartmentNotFound)
    }

    async fn delete_department(&self, department_id: Uuid) -> Result<(), DirectoryError> {
        let path = format!("/rest/v1/departments?id=eq.{}", department_id);

        let removed = self.write::<Department>(Method::DELETE, &path, None).await?;
        if removed.is_empty() {
            return Err(DirectoryError::DepartmentNotFound);
        }

        Ok(())
    }
}
