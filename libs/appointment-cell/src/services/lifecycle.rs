// libs/appointment-cell/src/services/lifecycle.rs
use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use shared_models::auth::{Actor, Role};

use crate::models::{
    Appointment, AppointmentError, AppointmentStatus, Consultation, MedicationEntry, Prescription,
    PrescriptionStatus,
};

/// Status machine and permission rules for appointments.
///
/// `Scheduled` is the only non-terminal state. Deletion is an admin-only
/// hard delete and is not a transition.
#[derive(Debug, Clone, Copy, Default)]
pub struct AppointmentLifecycleService;

impl AppointmentLifecycleService {
    pub fn new() -> Self {
        Self
    }

    /// Validate that a status transition is allowed
    pub fn validate_status_transition(
        &self,
        current_status: AppointmentStatus,
        new_status: AppointmentStatus,
    ) -> Result<(), AppointmentError> {
        debug!("Validating status transition from {} to {}", current_status, new_status);

        if !self.get_valid_transitions(current_status).contains(&new_status) {
            warn!("Invalid status transition attempted: {} -> {}", current_status, new_status);
            return Err(AppointmentError::InvalidStatusTransition(current_status));
        }

        Ok(())
    }

    pub fn get_valid_transitions(&self, current_status: AppointmentStatus) -> Vec<AppointmentStatus> {
        match current_status {
            AppointmentStatus::Scheduled => vec![AppointmentStatus::Completed, AppointmentStatus::Cancelled],
            AppointmentStatus::Completed | AppointmentStatus::Cancelled => vec![],
        }
    }

    /// Only the appointment's own doctor may record a consultation.
    pub fn authorize_completion(&self, appointment: &Appointment, actor: &Actor) -> Result<(), AppointmentError> {
        if actor.role == Role::Doctor && actor.id == appointment.doctor_id {
            Ok(())
        } else {
            Err(AppointmentError::Forbidden(
                "Only the assigned doctor can complete this appointment".to_string(),
            ))
        }
    }

    /// The patient, the doctor, or an admin may cancel.
    pub fn authorize_cancellation(&self, appointment: &Appointment, actor: &Actor) -> Result<(), AppointmentError> {
        let allowed = match actor.role {
            Role::Admin => true,
            Role::Patient => actor.id == appointment.patient_id,
            Role::Doctor => actor.id == appointment.doctor_id,
        };

        if allowed {
            Ok(())
        } else {
            Err(AppointmentError::Forbidden(
                "Not authorized to cancel this appointment".to_string(),
            ))
        }
    }

    pub fn authorize_deletion(&self, actor: &Actor) -> Result<(), AppointmentError> {
        if actor.is_admin() {
            Ok(())
        } else {
            Err(AppointmentError::Forbidden("Only admins can delete appointments".to_string()))
        }
    }

    /// Patients book for themselves; admins may book for anyone.
    pub fn resolve_booking_patient(&self, actor: &Actor, requested: Option<Uuid>) -> Result<Uuid, AppointmentError> {
        match actor.role {
            Role::Admin => requested.ok_or_else(|| {
                AppointmentError::ValidationError("patient_id is required when booking as admin".to_string())
            }),
            Role::Patient => match requested {
                Some(patient_id) if patient_id != actor.id => Err(AppointmentError::Forbidden(
                    "Patients can only book appointments for themselves".to_string(),
                )),
                _ => Ok(actor.id),
            },
            Role::Doctor => Err(AppointmentError::Forbidden(
                "Doctors cannot book appointments".to_string(),
            )),
        }
    }

    /// Builds the consultation record, issuing one prescription per entry.
    pub fn build_consultation(
        &self,
        diagnosis: &str,
        notes: &str,
        medications: &[MedicationEntry],
        completed_at: DateTime<Utc>,
    ) -> Result<Consultation, AppointmentError> {
        let diagnosis = diagnosis.trim();
        let notes = notes.trim();
        if diagnosis.is_empty() {
            return Err(AppointmentError::ValidationError("Diagnosis is required".to_string()));
        }
        if notes.is_empty() {
            return Err(AppointmentError::ValidationError("Consultation notes are required".to_string()));
        }

        let prescriptions = medications
            .iter()
            .map(|entry| {
                let medication = entry.medication.trim();
                let dosage = entry.dosage.trim();
                if medication.is_empty() || dosage.is_empty() {
                    return Err(AppointmentError::ValidationError(
                        "Each medication needs a name and a dosage".to_string(),
                    ));
                }
                Ok(Prescription {
                    id: Uuid::new_v4(),
                    medication: medication.to_string(),
                    dosage: dosage.to_string(),
                    status: PrescriptionStatus::Issued,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Consultation {
            diagnosis: diagnosis.to_string(),
            notes: notes.to_string(),
            prescriptions,
            completed_at,
        })
    }

    /// Issued -> Dispensed is the only prescription transition.
    pub fn validate_prescription_transition(
        &self,
        current: PrescriptionStatus,
        next: PrescriptionStatus,
    ) -> Result<(), AppointmentError> {
        match (current, next) {
            (PrescriptionStatus::Issued, PrescriptionStatus::Dispensed) => Ok(()),
            _ => Err(AppointmentError::InvalidPrescriptionTransition(current)),
        }
    }

    /// The issuing doctor or an admin may dispense.
    pub fn authorize_prescription_update(&self, appointment: &Appointment, actor: &Actor) -> Result<(), AppointmentError> {
        if actor.is_admin() || (actor.role == Role::Doctor && actor.id == appointment.doctor_id) {
            Ok(())
        } else {
            Err(AppointmentError::Forbidden(
                "Only the issuing doctor or an admin can update prescriptions".to_string(),
            ))
        }
    }

    /// The patient themself, any doctor, or an admin.
    pub fn authorize_history_access(&self, patient_id: Uuid, actor: &Actor) -> Result<(), AppointmentError> {
        match actor.role {
            Role::Admin | Role::Doctor => Ok(()),
            Role::Patient if actor.id == patient_id => Ok(()),
            Role::Patient => Err(AppointmentError::Forbidden(
                "Patients can only view their own history".to_string(),
            )),
        }
    }

    pub fn authorize_patient_listing(&self, actor: &Actor) -> Result<(), AppointmentError> {
        match actor.role {
            Role::Admin | Role::Doctor => Ok(()),
            Role::Patient => Err(AppointmentError::Forbidden(
                "Only clinic staff can list patients".to_string(),
            )),
        }
    }
}
