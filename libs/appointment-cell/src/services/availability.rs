// libs/appointment-cell/src/services/availability.rs
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::{AppointmentError, DayAvailability, SlotAvailability};
use crate::services::slots::SlotCatalog;
use crate::services::store::AppointmentRepository;

/// Answers "which slots of this doctor's day are taken".
pub struct AvailabilityIndex {
    repository: Arc<dyn AppointmentRepository>,
    catalog: SlotCatalog,
}

impl AvailabilityIndex {
    pub fn new(repository: Arc<dyn AppointmentRepository>, catalog: SlotCatalog) -> Self {
        Self { repository, catalog }
    }

    /// Exact instants held by non-cancelled appointments on a clinic-local day.
    pub async fn busy_slots(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<BTreeSet<DateTime<Utc>>, AppointmentError> {
        let (from, to) = self
            .catalog
            .day_bounds(date)
            .ok_or_else(|| AppointmentError::ValidationError(format!("Invalid date {}", date)))?;

        let busy: BTreeSet<DateTime<Utc>> = self
            .repository
            .list_for_doctor_between(doctor_id, from, to)
            .await?
            .into_iter()
            .filter(|a| a.occupies_slot())
            .map(|a| a.appointment_date)
            .collect();

        debug!("Doctor {} has {} busy slots on {}", doctor_id, busy.len(), date);
        Ok(busy)
    }

    /// The full slot grid for a day, each marked busy or free. A failed
    /// lookup yields an all-free grid so the picker still renders; the
    /// store's atomic insert still rejects a taken slot.
    pub async fn day_availability(&self, doctor_id: Uuid, date: NaiveDate) -> DayAvailability {
        let busy = self.busy_slots(doctor_id, date).await.unwrap_or_else(|e| {
            warn!("Availability lookup for doctor {} on {} degraded: {}", doctor_id, date, e);
            BTreeSet::new()
        });

        let slots = self
            .catalog
            .day_instants(date)
            .into_iter()
            .map(|(label, instant)| SlotAvailability {
                busy: busy.contains(&instant),
                label,
                instant,
            })
            .collect();

        DayAvailability {
            doctor_id,
            date,
            slots,
            busy: busy.into_iter().collect(),
        }
    }

    /// Runs a lookup on behalf of a selection and drops the answer if the
    /// selection has moved on by the time it arrives.
    pub async fn query_for_selection(
        &self,
        selection: &AvailabilitySelection,
        ticket: AvailabilityTicket,
    ) -> Option<DayAvailability> {
        let result = self.day_availability(ticket.doctor_id, ticket.date).await;
        selection.accept(&ticket, result)
    }
}

/// Handle for one issued availability lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AvailabilityTicket {
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    generation: u64,
}

/// Last-request-wins guard for the current (doctor, date) selection.
/// Each `select` supersedes every ticket issued before it.
#[derive(Debug, Default)]
pub struct AvailabilitySelection {
    latest: AtomicU64,
}

impl AvailabilitySelection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select(&self, doctor_id: Uuid, date: NaiveDate) -> AvailabilityTicket {
        let generation = self.latest.fetch_add(1, Ordering::AcqRel) + 1;
        AvailabilityTicket {
            doctor_id,
            date,
            generation,
        }
    }

    pub fn is_current(&self, ticket: &AvailabilityTicket) -> bool {
        self.latest.load(Ordering::Acquire) == ticket.generation
    }

    pub fn accept<T>(&self, ticket: &AvailabilityTicket, result: T) -> Option<T> {
        if self.is_current(ticket) {
            Some(result)
        } else {
            debug!(
                "Discarding stale availability for doctor {} on {}",
                ticket.doctor_id, ticket.date
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_newer_selection_supersedes_older() {
        let selection = AvailabilitySelection::new();
        let date = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();

        let first = selection.select(Uuid::new_v4(), date);
        let second = selection.select(Uuid::new_v4(), date);

        assert!(!selection.is_current(&first));
        assert!(selection.is_current(&second));
        assert_eq!(selection.accept(&first, "stale"), None);
        assert_eq!(selection.accept(&second, "fresh"), Some("fresh"));
    }
}
