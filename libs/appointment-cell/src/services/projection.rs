// libs/appointment-cell/src/services/projection.rs
use shared_models::auth::{Actor, Role};

use crate::models::{Appointment, AppointmentView, PrescriptionView};

/// Whether `actor` may see this appointment at all.
pub fn is_visible_to(appointment: &Appointment, actor: &Actor) -> bool {
    match actor.role {
        Role::Patient => appointment.patient_id == actor.id,
        Role::Doctor => appointment.doctor_id == actor.id,
        Role::Admin => true,
    }
}

/// Filters and reshapes store rows for one caller. Input order is kept.
pub fn project(appointments: &[Appointment], actor: &Actor) -> Vec<AppointmentView> {
    appointments
        .iter()
        .filter(|a| is_visible_to(a, actor))
        .map(|a| shape(a, actor.role))
        .collect()
}

/// View carrying both identities, for admins and clinical history.
pub fn full_view(appointment: &Appointment) -> AppointmentView {
    shape(appointment, Role::Admin)
}

fn shape(appointment: &Appointment, role: Role) -> AppointmentView {
    let (doctor_id, patient_id) = match role {
        Role::Patient => (Some(appointment.doctor_id), None),
        Role::Doctor => (None, Some(appointment.patient_id)),
        Role::Admin => (Some(appointment.doctor_id), Some(appointment.patient_id)),
    };

    AppointmentView {
        id: appointment.id,
        scheduled_at: appointment.appointment_date,
        status: appointment.status,
        doctor_id,
        patient_id,
        consultation: appointment.consultation.clone(),
    }
}

/// Prescriptions from every completed appointment visible to `actor`.
pub fn project_prescriptions(appointments: &[Appointment], actor: &Actor) -> Vec<PrescriptionView> {
    appointments
        .iter()
        .filter(|a| is_visible_to(a, actor))
        .flat_map(prescription_views)
        .collect()
}

pub fn prescription_views(appointment: &Appointment) -> Vec<PrescriptionView> {
    let Some(consultation) = appointment.consultation.as_ref() else {
        return Vec::new();
    };

    consultation
        .prescriptions
        .iter()
        .map(|p| PrescriptionView {
            id: p.id,
            appointment_id: appointment.id,
            medication: p.medication.clone(),
            dosage: p.dosage.clone(),
            status: p.status,
            issued_at: consultation.completed_at,
            doctor_id: appointment.doctor_id,
            patient_id: appointment.patient_id,
        })
        .collect()
}
