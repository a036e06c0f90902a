// libs/appointment-cell/src/services/supabase_store.rs
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::{supabase_error, SupabaseClient};

use crate::models::{
    Appointment, AppointmentError, AppointmentStatus, PrescriptionStatus, StatusChange,
};
use crate::services::store::AppointmentRepository;

/// Appointment store backed by the `appointments` table.
///
/// The table carries a partial unique index on `(doctor_id, appointment_date)`
/// for rows whose status is not `cancelled`, so a double booking surfaces as
/// a 409 from the insert itself. Status changes are PATCHes filtered on the
/// expected status, so a lost race matches zero rows.
pub struct SupabaseAppointmentRepository {
    supabase: Arc<SupabaseClient>,
    service_key: String,
}

impl SupabaseAppointmentRepository {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
            service_key: config.supabase_service_key.clone(),
        }
    }

    async fn fetch(&self, path: &str) -> Result<Vec<Appointment>, AppointmentError> {
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, path, Some(&self.service_key), None)
            .await
            .map_err(map_database_error)?;

        parse_appointments(rows)
    }

    async fn write(&self, method: Method, path: &str, body: Option<Value>) -> Result<Vec<Appointment>, AppointmentError> {
        let rows: Vec<Value> = self
            .supabase
            .request_with_headers(
                method,
                path,
                Some(&self.service_key),
                body,
                Some(SupabaseClient::return_representation()),
            )
            .await
            .map_err(map_database_error)?;

        parse_appointments(rows)
    }
}

fn parse_appointments(rows: Vec<Value>) -> Result<Vec<Appointment>, AppointmentError> {
    rows.into_iter()
        .map(serde_json::from_value)
        .collect::<Result<Vec<Appointment>, _>>()
        .map_err(|e| AppointmentError::DatabaseError(format!("Failed to parse appointments: {}", e)))
}

fn map_database_error(err: anyhow::Error) -> AppointmentError {
    match supabase_error(&err) {
        Some(e) if e.is_conflict() => AppointmentError::ConflictDetected,
        _ => AppointmentError::DatabaseError(err.to_string()),
    }
}

fn encode_instant(instant: DateTime<Utc>) -> String {
    urlencoding::encode(&instant.to_rfc3339_opts(SecondsFormat::Micros, true)).into_owned()
}

#[async_trait]
impl AppointmentRepository for SupabaseAppointmentRepository {
    async fn insert_if_slot_free(&self, appointment: Appointment) -> Result<Appointment, AppointmentError> {
        debug!(
            "Inserting appointment for doctor {} at {}",
            appointment.doctor_id, appointment.appointment_date
        );

        let body = serde_json::to_value(&appointment)
            .map_err(|e| AppointmentError::DatabaseError(format!("Failed to encode appointment: {}", e)))?;

        self.write(Method::POST, "/rest/v1/appointments", Some(body))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppointmentError::DatabaseError("Insert returned no row".to_string()))
    }

    async fn get(&self, appointment_id: Uuid) -> Result<Option<Appointment>, AppointmentError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        Ok(self.fetch(&path).await?.into_iter().next())
    }

    async fn transition(
        &self,
        appointment_id: Uuid,
        expected: AppointmentStatus,
        change: StatusChange,
    ) -> Result<Appointment, AppointmentError> {
        let mut body = json!({
            "status": change.target_status(),
            "updated_at": Utc::now(),
        });
        if let StatusChange::Complete(consultation) = &change {
            body["consultation"] = json!(consultation);
        }

        let path = format!(
            "/rest/v1/appointments?id=eq.{}&status=eq.{}",
            appointment_id, expected
        );

        if let Some(updated) = self.write(Method::PATCH, &path, Some(body)).await?.into_iter().next() {
            return Ok(updated);
        }

        // Zero rows matched: either gone or no longer in `expected`
        match self.get(appointment_id).await? {
            None => Err(AppointmentError::NotFound),
            Some(current) => Err(AppointmentError::InvalidStatusTransition(current.status)),
        }
    }

    async fn remove(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        self.write(Method::DELETE, &path, None)
            .await?
            .into_iter()
            .next()
            .ok_or(AppointmentError::NotFound)
    }

    async fn list_all(&self) -> Result<Vec<Appointment>, AppointmentError> {
        self.fetch("/rest/v1/appointments?order=appointment_date.desc").await
    }

    async fn list_for_doctor_between(
        &self,
        doctor_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let path = format!(
            "/rest/v1/appointments?doctor_id=eq.{}&appointment_date=gte.{}&appointment_date=lt.{}&order=appointment_date.asc",
            doctor_id,
            encode_instant(from),
            encode_instant(to)
        );
        self.fetch(&path).await
    }

    async fn find_by_prescription(&self, prescription_id: Uuid) -> Result<Option<Appointment>, AppointmentError> {
        let containment = json!({ "prescriptions": [{ "id": prescription_id }] }).to_string();
        let path = format!(
            "/rest/v1/appointments?consultation=cs.{}",
            urlencoding::encode(&containment)
        );
        Ok(self.fetch(&path).await?.into_iter().next())
    }

    async fn set_prescription_status(
        &self,
        prescription_id: Uuid,
        expected: PrescriptionStatus,
        next: PrescriptionStatus,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self
            .find_by_prescription(prescription_id)
            .await?
            .ok_or(AppointmentError::PrescriptionNotFound)?;

        let mut consultation = appointment
            .consultation
            .clone()
            .ok_or(AppointmentError::PrescriptionNotFound)?;

        let prescription = consultation
            .prescriptions
            .iter_mut()
            .find(|p| p.id == prescription_id)
            .ok_or(AppointmentError::PrescriptionNotFound)?;

        if prescription.status != expected {
            return Err(AppointmentError::InvalidPrescriptionTransition(prescription.status));
        }
        prescription.status = next;

        // Guard on the row version we read so a concurrent dispense is not overwritten
        let path = format!(
            "/rest/v1/appointments?id=eq.{}&updated_at=eq.{}",
            appointment.id,
            encode_instant(appointment.updated_at)
        );
        let body = json!({
            "consultation": consultation,
            "updated_at": Utc::now(),
        });

        match self.write(Method::PATCH, &path, Some(body)).await?.into_iter().next() {
            Some(updated) => Ok(updated),
            None => {
                warn!("Prescription {} changed concurrently", prescription_id);
                let current = self
                    .find_by_prescription(prescription_id)
                    .await?
                    .and_then(|a| a.prescriptions().iter().find(|p| p.id == prescription_id).map(|p| p.status));
                match current {
                    Some(status) if status != expected => Err(AppointmentError::InvalidPrescriptionTransition(status)),
                    Some(_) => Err(AppointmentError::DatabaseError(
                        "Prescription was modified concurrently, retry".to_string(),
                    )),
                    None => Err(AppointmentError::PrescriptionNotFound),
                }
            }
        }
    }
}
