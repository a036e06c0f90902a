// libs/appointment-cell/src/services/booking.rs
use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use doctor_cell::services::DoctorDirectory;
use shared_models::auth::Actor;

use crate::models::{
    Appointment, AppointmentError, AppointmentStatus, AppointmentView, BookAppointmentRequest,
    CompleteAppointmentRequest, MedicationEntry, PatientHistory, PatientSummary, PrescriptionStatus, PrescriptionView,
    StatusChange,
};
use crate::services::lifecycle::AppointmentLifecycleService;
use crate::services::projection;
use crate::services::slots::SlotCatalog;
use crate::services::store::AppointmentRepository;

/// Appointment store operations: booking, status transitions, deletion
/// and the role-scoped reads built on top of them.
pub struct AppointmentBookingService {
    repository: Arc<dyn AppointmentRepository>,
    directory: Arc<dyn DoctorDirectory>,
    catalog: SlotCatalog,
    lifecycle: AppointmentLifecycleService,
}

impl AppointmentBookingService {
    pub fn new(
        repository: Arc<dyn AppointmentRepository>,
        directory: Arc<dyn DoctorDirectory>,
        catalog: SlotCatalog,
    ) -> Self {
        Self {
            repository,
            directory,
            catalog,
            lifecycle: AppointmentLifecycleService::new(),
        }
    }

    pub fn repository(&self) -> Arc<dyn AppointmentRepository> {
        Arc::clone(&self.repository)
    }

    // ==========================================================================
    // WRITES
    // ==========================================================================

    /// Books `instant` with `doctor_id`. The slot check and the insert run as
    /// one unit in the repository, so concurrent callers racing for one slot
    /// see exactly one success.
    pub async fn create(
        &self,
        doctor_id: Uuid,
        patient_id: Uuid,
        instant: DateTime<Utc>,
    ) -> Result<Appointment, AppointmentError> {
        if !self.catalog.is_on_grid(instant) {
            return Err(AppointmentError::ValidationError(format!(
                "{} is not a bookable slot start",
                instant
            )));
        }

        let doctor = self
            .directory
            .get_doctor(doctor_id)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;
        if doctor.is_none() {
            return Err(AppointmentError::DoctorNotFound);
        }

        let appointment = self
            .repository
            .insert_if_slot_free(Appointment::new_scheduled(doctor_id, patient_id, instant))
            .await
            .map_err(|e| {
                if e == AppointmentError::ConflictDetected {
                    warn!("Slot {} for doctor {} already taken", instant, doctor_id);
                }
                e
            })?;

        info!(
            "Appointment {} booked for patient {} with doctor {} at {}",
            appointment.id, patient_id, doctor_id, instant
        );
        Ok(appointment)
    }

    /// Actor-aware entry point for a booking submission.
    pub async fn book(&self, actor: &Actor, request: BookAppointmentRequest) -> Result<Appointment, AppointmentError> {
        let patient_id = self.lifecycle.resolve_booking_patient(actor, request.patient_id)?;
        let instant = self.catalog.parse_instant(&request.scheduled_at)?;
        self.create(request.doctor_id, patient_id, instant).await
    }

    /// Checks run in order: existence, permission, status, then payload.
    pub async fn complete(
        &self,
        appointment_id: Uuid,
        actor: &Actor,
        diagnosis: &str,
        notes: &str,
        medications: &[MedicationEntry],
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.load(appointment_id).await?;
        self.lifecycle.authorize_completion(&appointment, actor)?;
        self.lifecycle
            .validate_status_transition(appointment.status, AppointmentStatus::Completed)?;

        let consultation = self
            .lifecycle
            .build_consultation(diagnosis, notes, medications, Utc::now())?;

        let completed = self
            .repository
            .transition(appointment_id, AppointmentStatus::Scheduled, StatusChange::Complete(consultation))
            .await?;

        info!(
            "Appointment {} completed by doctor {} with {} prescriptions",
            appointment_id,
            actor.id,
            completed.prescriptions().len()
        );
        Ok(completed)
    }

    pub async fn complete_with(
        &self,
        appointment_id: Uuid,
        actor: &Actor,
        request: &CompleteAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        self.complete(
            appointment_id,
            actor,
            &request.diagnosis,
            &request.notes,
            &request.medications,
        )
        .await
    }

    pub async fn cancel(&self, appointment_id: Uuid, actor: &Actor) -> Result<Appointment, AppointmentError> {
        let appointment = self.load(appointment_id).await?;
        self.lifecycle.authorize_cancellation(&appointment, actor)?;
        self.lifecycle
            .validate_status_transition(appointment.status, AppointmentStatus::Cancelled)?;

        let cancelled = self
            .repository
            .transition(appointment_id, AppointmentStatus::Scheduled, StatusChange::Cancel)
            .await?;

        info!("Appointment {} cancelled by {} {}", appointment_id, actor.role, actor.id);
        Ok(cancelled)
    }

    /// Hard delete, admin only, regardless of status.
    pub async fn delete(&self, appointment_id: Uuid, actor: &Actor) -> Result<(), AppointmentError> {
        self.lifecycle.authorize_deletion(actor)?;
        let removed = self.repository.remove(appointment_id).await?;

        info!(
            "Appointment {} ({}) deleted by admin {}",
            removed.id, removed.status, actor.id
        );
        Ok(())
    }

    pub async fn update_prescription_status(
        &self,
        prescription_id: Uuid,
        actor: &Actor,
        next: PrescriptionStatus,
    ) -> Result<PrescriptionView, AppointmentError> {
        let appointment = self
            .repository
            .find_by_prescription(prescription_id)
            .await?
            .ok_or(AppointmentError::PrescriptionNotFound)?;
        self.lifecycle.authorize_prescription_update(&appointment, actor)?;

        let current = appointment
            .prescriptions()
            .iter()
            .find(|p| p.id == prescription_id)
            .map(|p| p.status)
            .ok_or(AppointmentError::PrescriptionNotFound)?;
        self.lifecycle.validate_prescription_transition(current, next)?;

        let updated = self
            .repository
            .set_prescription_status(prescription_id, current, next)
            .await?;

        info!("Prescription {} marked {} by {}", prescription_id, next, actor.id);

        projection::prescription_views(&updated)
            .into_iter()
            .find(|p| p.id == prescription_id)
            .ok_or(AppointmentError::PrescriptionNotFound)
    }

    // ==========================================================================
    // READS
    // ==========================================================================

    pub async fn get(&self, appointment_id: Uuid, actor: &Actor) -> Result<AppointmentView, AppointmentError> {
        let appointment = self.load(appointment_id).await?;
        projection::project(std::slice::from_ref(&appointment), actor)
            .into_iter()
            .next()
            .ok_or_else(|| AppointmentError::Forbidden("Not authorized to view this appointment".to_string()))
    }

    /// Unfiltered listing; callers outside this crate go through `list_for`.
    pub async fn list_all(&self) -> Result<Vec<Appointment>, AppointmentError> {
        self.repository.list_all().await
    }

    /// Role-projected listing. Store failures degrade to an empty list.
    pub async fn list_for(&self, actor: &Actor) -> Vec<AppointmentView> {
        match self.list_all().await {
            Ok(appointments) => projection::project(&appointments, actor),
            Err(e) => {
                warn!("Appointment listing for {} degraded to empty result: {}", actor.id, e);
                Vec::new()
            }
        }
    }

    pub async fn prescriptions_for(&self, actor: &Actor) -> Vec<PrescriptionView> {
        match self.list_all().await {
            Ok(appointments) => projection::project_prescriptions(&appointments, actor),
            Err(e) => {
                warn!("Prescription listing for {} degraded to empty result: {}", actor.id, e);
                Vec::new()
            }
        }
    }

    /// Patients on record for clinic staff, most recently seen first.
    pub async fn patients_for(&self, actor: &Actor) -> Result<Vec<PatientSummary>, AppointmentError> {
        self.lifecycle.authorize_patient_listing(actor)?;

        let appointments = self.list_all().await.unwrap_or_else(|e| {
            warn!("Patient listing degraded to empty result: {}", e);
            Vec::new()
        });

        let mut patients: HashMap<Uuid, PatientSummary> = HashMap::new();
        for appointment in &appointments {
            patients
                .entry(appointment.patient_id)
                .and_modify(|p| {
                    p.appointment_count += 1;
                    p.last_appointment_at = p.last_appointment_at.max(appointment.appointment_date);
                })
                .or_insert(PatientSummary {
                    patient_id: appointment.patient_id,
                    appointment_count: 1,
                    last_appointment_at: appointment.appointment_date,
                });
        }

        let mut patients: Vec<PatientSummary> = patients.into_values().collect();
        patients.sort_by(|a, b| {
            b.last_appointment_at
                .cmp(&a.last_appointment_at)
                .then(a.patient_id.cmp(&b.patient_id))
        });

        debug!("Listing {} patients for {}", patients.len(), actor.id);
        Ok(patients)
    }

    pub async fn patient_history(&self, patient_id: Uuid, actor: &Actor) -> Result<PatientHistory, AppointmentError> {
        self.lifecycle.authorize_history_access(patient_id, actor)?;

        let appointments: Vec<Appointment> = self
            .list_all()
            .await
            .unwrap_or_else(|e| {
                warn!("History for patient {} degraded to empty result: {}", patient_id, e);
                Vec::new()
            })
            .into_iter()
            .filter(|a| a.patient_id == patient_id)
            .collect();

        debug!("Patient {} has {} appointments on record", patient_id, appointments.len());

        Ok(PatientHistory {
            patient_id,
            prescriptions: appointments.iter().flat_map(projection::prescription_views).collect(),
            appointments: appointments.iter().map(projection::full_view).collect(),
        })
    }

    async fn load(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        self.repository
            .get(appointment_id)
            .await?
            .ok_or(AppointmentError::NotFound)
    }
}
