use assert_matches::assert_matches;
use chrono::{NaiveDate, TimeZone, Utc};
use uuid::Uuid;

use appointment_cell::models::{Appointment, AppointmentError, AppointmentStatus, AppointmentView};
use appointment_cell::services::projection::project;
use appointment_cell::services::{CalendarAggregator, SlotCatalog};
use shared_config::ClinicHours;
use shared_models::auth::Actor;

fn view_at(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> AppointmentView {
    AppointmentView {
        id: Uuid::new_v4(),
        scheduled_at: Utc.with_ymd_and_hms(year, month, day, hour, minute, 0).unwrap(),
        status: AppointmentStatus::Scheduled,
        doctor_id: Some(Uuid::new_v4()),
        patient_id: None,
        consultation: None,
    }
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 20).unwrap()
}

#[test]
fn test_appointment_lands_in_its_day_bucket_only() {
    let calendar = CalendarAggregator::default();
    let appointment = view_at(2024, 3, 15, 9, 0);
    let views = vec![appointment.clone()];

    let march = calendar.aggregate_by_day(&views, 2024, 3).unwrap();
    assert_eq!(march.len(), 1);
    assert_eq!(march.get(&15).map(|b| b[0].id), Some(appointment.id));

    assert!(calendar.aggregate_by_day(&views, 2024, 4).unwrap().is_empty());
    assert!(calendar.aggregate_by_day(&views, 2023, 3).unwrap().is_empty());
}

#[test]
fn test_march_2024_grid_layout() {
    let calendar = CalendarAggregator::default();
    let views = vec![
        view_at(2024, 3, 15, 9, 0),
        view_at(2024, 3, 15, 11, 30),
        view_at(2024, 3, 2, 16, 0),
    ];

    let grid = calendar.month_grid(&views, 2024, 3, today(), Some(15)).unwrap();

    // March 1st 2024 is a Friday
    assert_eq!(grid.leading_blanks, 5);
    assert_eq!(grid.leading_days, vec![25, 26, 27, 28, 29]);
    assert_eq!(grid.days.len(), 31);

    let fifteenth = &grid.days[14];
    assert_eq!(fifteenth.day, 15);
    assert!(fifteenth.has_event);
    assert_eq!(fifteenth.appointment_count, 2);
    assert!(fifteenth.is_selected);
    assert!(!fifteenth.is_today);

    assert!(grid.days[19].is_today);
    assert!(grid.days[1].has_event);
    assert_eq!(grid.days.iter().filter(|d| d.has_event).count(), 2);
}

#[test]
fn test_today_marker_only_in_current_month() {
    let grid = CalendarAggregator::default()
        .month_grid(&[], 2024, 4, today(), None)
        .unwrap();

    assert!(grid.days.iter().all(|d| !d.is_today && !d.is_selected && !d.has_event));
    assert_eq!(grid.days.len(), 30);
}

#[test]
fn test_day_drill_down_is_time_ordered() {
    let calendar = CalendarAggregator::default();
    let late = view_at(2024, 3, 15, 16, 30);
    let early = view_at(2024, 3, 15, 9, 0);
    let views = vec![late.clone(), view_at(2024, 3, 16, 9, 0), early.clone()];

    let day = calendar.day_appointments(&views, 2024, 3, 15).unwrap();
    assert_eq!(day.iter().map(|a| a.id).collect::<Vec<_>>(), vec![early.id, late.id]);

    assert!(calendar.day_appointments(&views, 2024, 3, 17).unwrap().is_empty());
}

#[test]
fn test_aggregation_is_idempotent() {
    let calendar = CalendarAggregator::default();
    let views = vec![view_at(2024, 3, 15, 9, 0), view_at(2024, 3, 1, 10, 0)];

    let first = calendar.month_grid(&views, 2024, 3, today(), None).unwrap();
    let second = calendar.month_grid(&views, 2024, 3, today(), None).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_local_day_follows_clinic_offset() {
    // 23:30 UTC on the 14th is the 15th for a clinic at UTC+2
    let calendar = CalendarAggregator::new(SlotCatalog::new(ClinicHours {
        utc_offset_minutes: 120,
        ..ClinicHours::default()
    }));
    let views = vec![view_at(2024, 3, 14, 23, 30)];

    let buckets = calendar.aggregate_by_day(&views, 2024, 3).unwrap();
    assert!(buckets.contains_key(&15));
    assert!(!buckets.contains_key(&14));
}

#[test]
fn test_invalid_month_and_day_are_rejected() {
    let calendar = CalendarAggregator::default();

    assert_matches!(
        calendar.month_grid(&[], 2024, 13, today(), None),
        Err(AppointmentError::ValidationError(_))
    );
    assert_matches!(
        calendar.day_appointments(&[], 2024, 2, 30),
        Err(AppointmentError::ValidationError(_))
    );
    assert_matches!(
        calendar.day_appointments(&[], 2024, 2, 0),
        Err(AppointmentError::ValidationError(_))
    );
}

#[test]
fn test_calendar_only_sees_projected_rows() {
    let doctor = Uuid::new_v4();
    let mine = Appointment::new_scheduled(doctor, Uuid::new_v4(), Utc.with_ymd_and_hms(2024, 3, 15, 9, 0, 0).unwrap());
    let colleague = Appointment::new_scheduled(
        Uuid::new_v4(),
        Uuid::new_v4(),
        Utc.with_ymd_and_hms(2024, 3, 15, 9, 0, 0).unwrap(),
    );

    let views = project(&[mine, colleague], &Actor::doctor(doctor));
    let grid = CalendarAggregator::default()
        .month_grid(&views, 2024, 3, today(), None)
        .unwrap();

    assert_eq!(grid.days[14].appointment_count, 1);
}
