// libs/appointment-cell/src/services/slots.rs
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc};

use shared_config::ClinicHours;

use crate::models::AppointmentError;

const LOCAL_INPUT_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M", "%Y-%m-%dT%H:%M:%S"];

/// Fixed daily grid of bookable start times in clinic-local wall time.
#[derive(Debug, Clone, Default)]
pub struct SlotCatalog {
    clinic: ClinicHours,
}

impl SlotCatalog {
    pub fn new(clinic: ClinicHours) -> Self {
        Self { clinic }
    }

    pub fn clinic(&self) -> &ClinicHours {
        &self.clinic
    }

    /// Start times from opening (inclusive) to closing (exclusive).
    pub fn slot_times(&self) -> Vec<NaiveTime> {
        if self.clinic.slot_minutes == 0 {
            return Vec::new();
        }

        let mut times = Vec::with_capacity(self.clinic.slots_per_day() as usize);
        let close = self.clinic.close_hour * 60;
        let mut minute = self.clinic.open_hour * 60;

        while minute < close {
            if let Some(time) = NaiveTime::from_hms_opt(minute / 60, minute % 60, 0) {
                times.push(time);
            }
            minute += self.clinic.slot_minutes;
        }

        times
    }

    /// Slot labels as `HH:MM`, ascending.
    pub fn generate_slots(&self) -> Vec<String> {
        self.slot_times().iter().map(|t| label(*t)).collect()
    }

    /// Absolute instant of a clinic-local wall time.
    pub fn instant_for(&self, date: NaiveDate, time: NaiveTime) -> Option<DateTime<Utc>> {
        self.clinic
            .offset()
            .from_local_datetime(&date.and_time(time))
            .single()
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// Every slot of `date` with its label.
    pub fn day_instants(&self, date: NaiveDate) -> Vec<(String, DateTime<Utc>)> {
        self.slot_times()
            .into_iter()
            .filter_map(|t| self.instant_for(date, t).map(|instant| (label(t), instant)))
            .collect()
    }

    /// Clinic-local calendar day an instant falls on.
    pub fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.clinic.offset()).date_naive()
    }

    /// `[start, end)` of a clinic-local day in UTC.
    pub fn day_bounds(&self, date: NaiveDate) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let start = self.instant_for(date, NaiveTime::from_hms_opt(0, 0, 0)?)?;
        Some((start, start + Duration::days(1)))
    }

    pub fn is_on_grid(&self, instant: DateTime<Utc>) -> bool {
        let local = instant.with_timezone(&self.clinic.offset()).time();
        local.nanosecond() == 0 && self.slot_times().contains(&local)
    }

    /// Accepts RFC 3339 or a clinic-local `YYYY-MM-DDTHH:MM[:SS]`.
    pub fn parse_instant(&self, raw: &str) -> Result<DateTime<Utc>, AppointmentError> {
        let raw = raw.trim();

        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Ok(dt.with_timezone(&Utc));
        }

        LOCAL_INPUT_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
            .and_then(|naive| self.instant_for(naive.date(), naive.time()))
            .ok_or_else(|| AppointmentError::ValidationError(format!("Invalid appointment time: '{}'", raw)))
    }
}

fn label(time: NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_default_grid_has_eighteen_half_hour_slots() {
        let slots = SlotCatalog::default().generate_slots();

        assert_eq!(slots.len(), 18);
        assert_eq!(slots.first().map(String::as_str), Some("09:00"));
        assert_eq!(slots.last().map(String::as_str), Some("17:30"));
        assert!(!slots.iter().any(|s| s == "18:00"));
        assert!(slots.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_grid_follows_configured_hours() {
        let catalog = SlotCatalog::new(ClinicHours {
            open_hour: 8,
            close_hour: 10,
            slot_minutes: 20,
            utc_offset_minutes: 0,
        });

        assert_eq!(
            catalog.generate_slots(),
            vec!["08:00", "08:20", "08:40", "09:00", "09:20", "09:40"]
        );
    }

    #[test]
    fn test_zero_minute_slots_yield_empty_grid() {
        let catalog = SlotCatalog::new(ClinicHours {
            slot_minutes: 0,
            ..ClinicHours::default()
        });
        assert!(catalog.generate_slots().is_empty());
    }

    #[test]
    fn test_local_times_respect_clinic_offset() {
        let catalog = SlotCatalog::new(ClinicHours {
            utc_offset_minutes: 120,
            ..ClinicHours::default()
        });

        let instant = catalog.parse_instant("2024-03-15T10:00").unwrap();
        assert_eq!(instant, Utc.with_ymd_and_hms(2024, 3, 15, 8, 0, 0).unwrap());
        assert!(catalog.is_on_grid(instant));
        assert_eq!(catalog.local_date(Utc.with_ymd_and_hms(2024, 3, 14, 23, 0, 0).unwrap()), date(2024, 3, 15));
    }

    #[test]
    fn test_off_grid_instants_are_detected() {
        let catalog = SlotCatalog::default();

        assert!(catalog.is_on_grid(Utc.with_ymd_and_hms(2024, 3, 15, 9, 30, 0).unwrap()));
        assert!(!catalog.is_on_grid(Utc.with_ymd_and_hms(2024, 3, 15, 9, 15, 0).unwrap()));
        assert!(!catalog.is_on_grid(Utc.with_ymd_and_hms(2024, 3, 15, 18, 0, 0).unwrap()));
        assert!(!catalog.is_on_grid(Utc.with_ymd_and_hms(2024, 3, 15, 9, 0, 1).unwrap()));
    }

    #[test]
    fn test_parse_instant_rejects_garbage() {
        let catalog = SlotCatalog::default();

        assert!(matches!(
            catalog.parse_instant("tomorrow at ten"),
            Err(AppointmentError::ValidationError(_))
        ));
        assert_eq!(
            catalog.parse_instant("2024-03-15T10:00:00Z").unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 15, 10, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_day_bounds_span_one_local_day() {
        let catalog = SlotCatalog::default();
        let (start, end) = catalog.day_bounds(date(2024, 3, 15)).unwrap();

        assert_eq!(start, Utc.with_ymd_and_hms(2024, 3, 15, 0, 0, 0).unwrap());
        assert_eq!(end - start, Duration::days(1));
        assert_eq!(catalog.day_instants(date(2024, 3, 15)).len(), 18);
    }
}
