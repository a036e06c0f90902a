// libs/appointment-cell/src/services/store.rs
use std::cmp::Reverse;
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::models::{
    Appointment, AppointmentError, AppointmentStatus, PrescriptionStatus, StatusChange,
};

/// Storage seam for appointments.
///
/// Every write is a single atomic unit on the backing store: the slot check
/// and the insert happen together, and transitions only apply when the
/// record is still in the expected status.
#[async_trait]
pub trait AppointmentRepository: Send + Sync {
    /// Fails with `ConflictDetected` when a non-cancelled appointment already
    /// holds the same (doctor, instant).
    async fn insert_if_slot_free(&self, appointment: Appointment) -> Result<Appointment, AppointmentError>;

    async fn get(&self, appointment_id: Uuid) -> Result<Option<Appointment>, AppointmentError>;

    /// Fails with `InvalidStatusTransition(current)` when the record has
    /// left `expected`.
    async fn transition(
        &self,
        appointment_id: Uuid,
        expected: AppointmentStatus,
        change: StatusChange,
    ) -> Result<Appointment, AppointmentError>;

    async fn remove(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError>;

    /// Newest first.
    async fn list_all(&self) -> Result<Vec<Appointment>, AppointmentError>;

    /// Appointments of one doctor with `from <= appointment_date < to`, any status.
    async fn list_for_doctor_between(
        &self,
        doctor_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, AppointmentError>;

    async fn find_by_prescription(&self, prescription_id: Uuid) -> Result<Option<Appointment>, AppointmentError>;

    /// Compare-and-set on one prescription inside a completed consultation.
    async fn set_prescription_status(
        &self,
        prescription_id: Uuid,
        expected: PrescriptionStatus,
        next: PrescriptionStatus,
    ) -> Result<Appointment, AppointmentError>;
}

#[derive(Default)]
struct StoreState {
    appointments: HashMap<Uuid, Appointment>,
    /// (doctor, instant) -> id of the appointment holding that slot.
    active_slots: HashMap<(Uuid, DateTime<Utc>), Uuid>,
}

/// Process-local store. One write lock guards both maps so the slot check
/// and every mutation see a consistent view.
#[derive(Default)]
pub struct InMemoryAppointmentRepository {
    state: RwLock<StoreState>,
}

impl InMemoryAppointmentRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AppointmentRepository for InMemoryAppointmentRepository {
    async fn insert_if_slot_free(&self, appointment: Appointment) -> Result<Appointment, AppointmentError> {
        let mut state = self.state.write().await;
        let slot = (appointment.doctor_id, appointment.appointment_date);

        if state.active_slots.contains_key(&slot) {
            debug!("Slot {} for doctor {} already held", slot.1, slot.0);
            return Err(AppointmentError::ConflictDetected);
        }

        if appointment.occupies_slot() {
            state.active_slots.insert(slot, appointment.id);
        }
        state.appointments.insert(appointment.id, appointment.clone());

        Ok(appointment)
    }

    async fn get(&self, appointment_id: Uuid) -> Result<Option<Appointment>, AppointmentError> {
        Ok(self.state.read().await.appointments.get(&appointment_id).cloned())
    }

    async fn transition(
        &self,
        appointment_id: Uuid,
        expected: AppointmentStatus,
        change: StatusChange,
    ) -> Result<Appointment, AppointmentError> {
        let mut guard = self.state.write().await;
        let state = &mut *guard;

        let appointment = state
            .appointments
            .get_mut(&appointment_id)
            .ok_or(AppointmentError::NotFound)?;

        if appointment.status != expected {
            return Err(AppointmentError::InvalidStatusTransition(appointment.status));
        }

        appointment.status = change.target_status();
        appointment.updated_at = Utc::now();

        match change {
            StatusChange::Complete(consultation) => appointment.consultation = Some(consultation),
            StatusChange::Cancel => {
                let slot = (appointment.doctor_id, appointment.appointment_date);
                if state.active_slots.get(&slot) == Some(&appointment.id) {
                    state.active_slots.remove(&slot);
                }
            }
        }

        Ok(appointment.clone())
    }

    async fn remove(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        let mut state = self.state.write().await;

        let removed = state
            .appointments
            .remove(&appointment_id)
            .ok_or(AppointmentError::NotFound)?;

        let slot = (removed.doctor_id, removed.appointment_date);
        if state.active_slots.get(&slot) == Some(&removed.id) {
            state.active_slots.remove(&slot);
        }

        Ok(removed)
    }

    async fn list_all(&self) -> Result<Vec<Appointment>, AppointmentError> {
        let state = self.state.read().await;
        let mut appointments: Vec<Appointment> = state.appointments.values().cloned().collect();
        appointments.sort_by_key(|a| (Reverse(a.appointment_date), a.id));
        Ok(appointments)
    }

    async fn list_for_doctor_between(
        &self,
        doctor_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let state = self.state.read().await;
        let mut appointments: Vec<Appointment> = state
            .appointments
            .values()
            .filter(|a| a.doctor_id == doctor_id && a.appointment_date >= from && a.appointment_date < to)
            .cloned()
            .collect();
        appointments.sort_by_key(|a| a.appointment_date);
        Ok(appointments)
    }

    async fn find_by_prescription(&self, prescription_id: Uuid) -> Result<Option<Appointment>, AppointmentError> {
        let state = self.state.read().await;
        Ok(state
            .appointments
            .values()
            .find(|a| a.prescriptions().iter().any(|p| p.id == prescription_id))
            .cloned())
    }

    async fn set_prescription_status(
        &self,
        prescription_id: Uuid,
        expected: PrescriptionStatus,
        next: PrescriptionStatus,
    ) -> Result<Appointment, AppointmentError> {
        let mut state = self.state.write().await;

        for appointment in state.appointments.values_mut() {
            let Some(consultation) = appointment.consultation.as_mut() else {
                continue;
            };
            let Some(prescription) = consultation.prescriptions.iter_mut().find(|p| p.id == prescription_id) else {
                continue;
            };

            if prescription.status != expected {
                return Err(AppointmentError::InvalidPrescriptionTransition(prescription.status));
            }
            prescription.status = next;
            appointment.updated_at = Utc::now();
            return Ok(appointment.clone());
        }

        Err(AppointmentError::PrescriptionNotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, hour, minute, 0).unwrap()
    }

    #[tokio::test]
    async fn test_cancel_releases_slot_for_rebooking() {
        let repo = InMemoryAppointmentRepository::new();
        let doctor = Uuid::new_v4();

        let first = repo
            .insert_if_slot_free(Appointment::new_scheduled(doctor, Uuid::new_v4(), at(10, 0)))
            .await
            .unwrap();

        let clash = repo
            .insert_if_slot_free(Appointment::new_scheduled(doctor, Uuid::new_v4(), at(10, 0)))
            .await;
        assert_eq!(clash, Err(AppointmentError::ConflictDetected));

        repo.transition(first.id, AppointmentStatus::Scheduled, StatusChange::Cancel)
            .await
            .unwrap();

        assert!(repo
            .insert_if_slot_free(Appointment::new_scheduled(doctor, Uuid::new_v4(), at(10, 0)))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_transition_is_compare_and_set() {
        let repo = InMemoryAppointmentRepository::new();
        let appointment = repo
            .insert_if_slot_free(Appointment::new_scheduled(Uuid::new_v4(), Uuid::new_v4(), at(9, 0)))
            .await
            .unwrap();

        repo.transition(appointment.id, AppointmentStatus::Scheduled, StatusChange::Cancel)
            .await
            .unwrap();

        let again = repo
            .transition(appointment.id, AppointmentStatus::Scheduled, StatusChange::Cancel)
            .await;
        assert_eq!(
            again,
            Err(AppointmentError::InvalidStatusTransition(AppointmentStatus::Cancelled))
        );
        assert_eq!(
            repo.transition(Uuid::new_v4(), AppointmentStatus::Scheduled, StatusChange::Cancel)
                .await,
            Err(AppointmentError::NotFound)
        );
    }

    #[tokio::test]
    async fn test_list_all_is_newest_first() {
        let repo = InMemoryAppointmentRepository::new();
        let doctor = Uuid::new_v4();
        for hour in [9, 11, 10] {
            repo.insert_if_slot_free(Appointment::new_scheduled(doctor, Uuid::new_v4(), at(hour, 0)))
                .await
                .unwrap();
        }

        let dates: Vec<_> = repo.list_all().await.unwrap().iter().map(|a| a.appointment_date).collect();
        assert_eq!(dates, vec![at(11, 0), at(10, 0), at(9, 0)]);
    }
}
