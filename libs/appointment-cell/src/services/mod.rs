pub mod availability;
pub mod booking;
pub mod calendar;
pub mod lifecycle;
pub mod projection;
pub mod slots;
pub mod store;
pub mod supabase_store;

pub use availability::{AvailabilityIndex, AvailabilitySelection, AvailabilityTicket};
pub use booking::AppointmentBookingService;
pub use calendar::CalendarAggregator;
pub use lifecycle::AppointmentLifecycleService;
pub use slots::SlotCatalog;
pub use store::{AppointmentRepository, InMemoryAppointmentRepository};
pub use supabase_store::SupabaseAppointmentRepository;
