// libs/appointment-cell/src/models.rs
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    pub appointment_date: DateTime<Utc>,
    pub status: AppointmentStatus,
    /// Present if and only if `status` is `Completed`.
    pub consultation: Option<Consultation>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    pub fn new_scheduled(doctor_id: Uuid, patient_id: Uuid, appointment_date: DateTime<Utc>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            doctor_id,
            patient_id,
            appointment_date,
            status: AppointmentStatus::Scheduled,
            consultation: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether this record holds its (doctor, instant) slot.
    pub fn occupies_slot(&self) -> bool {
        self.status != AppointmentStatus::Cancelled
    }

    pub fn prescriptions(&self) -> &[Prescription] {
        self.consultation
            .as_ref()
            .map(|c| c.prescriptions.as_slice())
            .unwrap_or(&[])
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    Completed,
    Cancelled,
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Scheduled => write!(f, "scheduled"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Consultation {
    pub diagnosis: String,
    pub notes: String,
    pub prescriptions: Vec<Prescription>,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Prescription {
    pub id: Uuid,
    pub medication: String,
    pub dosage: String,
    pub status: PrescriptionStatus,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PrescriptionStatus {
    Issued,
    Dispensed,
}

impl fmt::Display for PrescriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrescriptionStatus::Issued => write!(f, "issued"),
            PrescriptionStatus::Dispensed => write!(f, "dispensed"),
        }
    }
}

/// One line of a consultation's medication list as submitted by the doctor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MedicationEntry {
    pub medication: String,
    pub dosage: String,
}

impl MedicationEntry {
    pub fn new(medication: &str, dosage: &str) -> Self {
        Self {
            medication: medication.to_string(),
            dosage: dosage.to_string(),
        }
    }
}

/// Transition applied by the store as one compare-and-set unit.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusChange {
    Complete(Consultation),
    Cancel,
}

impl StatusChange {
    pub fn target_status(&self) -> AppointmentStatus {
        match self {
            StatusChange::Complete(_) => AppointmentStatus::Completed,
            StatusChange::Cancel => AppointmentStatus::Cancelled,
        }
    }
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookAppointmentRequest {
    pub doctor_id: Uuid,
    /// Only admins may book on behalf of someone else.
    pub patient_id: Option<Uuid>,
    /// RFC 3339, or clinic-local `YYYY-MM-DDTHH:MM`.
    pub scheduled_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteAppointmentRequest {
    pub diagnosis: String,
    pub notes: String,
    #[serde(default)]
    pub medications: Vec<MedicationEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdatePrescriptionRequest {
    pub status: PrescriptionStatus,
}

// ==============================================================================
// ROLE-PROJECTED VIEWS
// ==============================================================================

/// An appointment as one caller is allowed to see it. Patients see the
/// doctor, doctors see the patient, admins see both.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppointmentView {
    pub id: Uuid,
    pub scheduled_at: DateTime<Utc>,
    pub status: AppointmentStatus,
    pub doctor_id: Option<Uuid>,
    pub patient_id: Option<Uuid>,
    pub consultation: Option<Consultation>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PrescriptionView {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub medication: String,
    pub dosage: String,
    pub status: PrescriptionStatus,
    pub issued_at: DateTime<Utc>,
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
}

/// One patient on record, derived from their appointments.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatientSummary {
    pub patient_id: Uuid,
    pub appointment_count: usize,
    pub last_appointment_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientHistory {
    pub patient_id: Uuid,
    pub appointments: Vec<AppointmentView>,
    pub prescriptions: Vec<PrescriptionView>,
}

// ==============================================================================
// AVAILABILITY MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SlotAvailability {
    pub label: String,
    pub instant: DateTime<Utc>,
    pub busy: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayAvailability {
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub slots: Vec<SlotAvailability>,
    pub busy: Vec<DateTime<Utc>>,
}

impl DayAvailability {
    pub fn is_busy(&self, label: &str) -> bool {
        self.slots.iter().any(|s| s.label == label && s.busy)
    }

    pub fn available_labels(&self) -> Vec<&str> {
        self.slots
            .iter()
            .filter(|s| !s.busy)
            .map(|s| s.label.as_str())
            .collect()
    }
}

// ==============================================================================
// CALENDAR MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CalendarDay {
    pub day: u32,
    pub has_event: bool,
    pub appointment_count: usize,
    pub is_today: bool,
    pub is_selected: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MonthGrid {
    pub year: i32,
    pub month: u32,
    /// Blank cells before day 1 in a Sunday-first week.
    pub leading_blanks: u32,
    /// Previous month's trailing day numbers that fill the blank cells.
    pub leading_days: Vec<u32>,
    pub days: Vec<CalendarDay>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AppointmentError {
    #[error("Appointment not found")]
    NotFound,

    #[error("Doctor not found")]
    DoctorNotFound,

    #[error("Prescription not found")]
    PrescriptionNotFound,

    #[error("Appointment slot already booked")]
    ConflictDetected,

    #[error("{0}")]
    Forbidden(String),

    #[error("Appointment cannot be modified in current status: {0}")]
    InvalidStatusTransition(AppointmentStatus),

    #[error("Prescription cannot be modified in current status: {0}")]
    InvalidPrescriptionTransition(PrescriptionStatus),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}
