// libs/appointment-cell/src/services/calendar.rs
use std::collections::BTreeMap;

use chrono::{Datelike, Duration, NaiveDate};

use crate::models::{AppointmentError, AppointmentView, CalendarDay, MonthGrid};
use crate::services::slots::SlotCatalog;

/// Groups role-projected appointments by clinic-local calendar day.
/// Stateless: every call recomputes from its inputs.
#[derive(Debug, Clone, Default)]
pub struct CalendarAggregator {
    catalog: SlotCatalog,
}

impl CalendarAggregator {
    pub fn new(catalog: SlotCatalog) -> Self {
        Self { catalog }
    }

    /// Day-of-month -> appointments on that day, each bucket in time order.
    pub fn aggregate_by_day(
        &self,
        appointments: &[AppointmentView],
        year: i32,
        month: u32,
    ) -> Result<BTreeMap<u32, Vec<AppointmentView>>, AppointmentError> {
        first_of_month(year, month)?;

        let mut buckets: BTreeMap<u32, Vec<AppointmentView>> = BTreeMap::new();
        for appointment in appointments {
            let local = self.catalog.local_date(appointment.scheduled_at);
            if local.year() == year && local.month() == month {
                buckets.entry(local.day()).or_default().push(appointment.clone());
            }
        }

        for bucket in buckets.values_mut() {
            bucket.sort_by_key(|a| (a.scheduled_at, a.id));
        }

        Ok(buckets)
    }

    pub fn month_grid(
        &self,
        appointments: &[AppointmentView],
        year: i32,
        month: u32,
        today: NaiveDate,
        selected: Option<u32>,
    ) -> Result<MonthGrid, AppointmentError> {
        let first = first_of_month(year, month)?;
        let buckets = self.aggregate_by_day(appointments, year, month)?;

        let leading_blanks = first.weekday().num_days_from_sunday();
        let previous_last = (first - Duration::days(1)).day();
        let leading_days = (previous_last + 1 - leading_blanks..=previous_last).collect();

        let days = (1..=days_in_month(first))
            .map(|day| {
                let appointment_count = buckets.get(&day).map_or(0, Vec::len);
                CalendarDay {
                    day,
                    has_event: appointment_count > 0,
                    appointment_count,
                    is_today: today.year() == year && today.month() == month && today.day() == day,
                    is_selected: selected == Some(day),
                }
            })
            .collect();

        Ok(MonthGrid {
            year,
            month,
            leading_blanks,
            leading_days,
            days,
        })
    }

    /// Drill-down for one day.
    pub fn day_appointments(
        &self,
        appointments: &[AppointmentView],
        year: i32,
        month: u32,
        day: u32,
    ) -> Result<Vec<AppointmentView>, AppointmentError> {
        let first = first_of_month(year, month)?;
        if day == 0 || day > days_in_month(first) {
            return Err(AppointmentError::ValidationError(format!(
                "Day {} is outside {}-{:02}",
                day, year, month
            )));
        }

        Ok(self
            .aggregate_by_day(appointments, year, month)?
            .remove(&day)
            .unwrap_or_default())
    }
}

fn first_of_month(year: i32, month: u32) -> Result<NaiveDate, AppointmentError> {
    NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| AppointmentError::ValidationError(format!("Invalid month {}-{}", year, month)))
}

fn days_in_month(first: NaiveDate) -> u32 {
    let next = if first.month() == 12 {
        NaiveDate::from_ymd_opt(first.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(first.year(), first.month() + 1, 1)
    };

    next.map_or(31, |n| (n - Duration::days(1)).day())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_days_in_month_handles_leap_years_and_december() {
        let d = |y, m| days_in_month(NaiveDate::from_ymd_opt(y, m, 1).unwrap());

        assert_eq!(d(2024, 2), 29);
        assert_eq!(d(2023, 2), 28);
        assert_eq!(d(2024, 12), 31);
        assert_eq!(d(2024, 4), 30);
    }

    #[test]
    fn test_month_starting_on_sunday_has_no_blanks() {
        let grid = CalendarAggregator::default()
            .month_grid(&[], 2024, 9, NaiveDate::from_ymd_opt(2024, 9, 1).unwrap(), None)
            .unwrap();

        assert_eq!(grid.leading_blanks, 0);
        assert!(grid.leading_days.is_empty());
        assert!(grid.days[0].is_today);
    }
}
