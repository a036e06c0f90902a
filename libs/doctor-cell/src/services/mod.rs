pub mod directory;
pub mod doctor;
pub mod supabase_directory;

pub use directory::{DoctorDirectory, InMemoryDoctorDirectory};
pub use doctor::DoctorService;
pub use supabase_directory::SupabaseDoctorDirectory;
