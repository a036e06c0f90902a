use std::net::SocketAddr;
use std::sync::Arc;
use dotenv::dotenv;
use tokio::net::TcpListener;
use tower_http::cors::{CorsLayer, Any};
use tower_http::trace::{self, TraceLayer};
use tracing::{Level, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod router;

use appointment_cell::handlers::AppointmentState;
use appointment_cell::services::{
    AppointmentRepository, InMemoryAppointmentRepository, SupabaseAppointmentRepository,
};
use doctor_cell::handlers::DoctorState;
use doctor_cell::services::{
    DoctorDirectory, DoctorService, InMemoryDoctorDirectory, SupabaseDoctorDirectory,
};
use shared_config::AppConfig;

#[tokio::main]
async fn main() {
    // Loading Env Vars
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting clinic scheduling API server");

    // Load configuration
    let config = Arc::new(AppConfig::from_env());

    if !config.is_auth_configured() {
        warn!("SUPABASE_JWT_SECRET is empty - every authenticated request will be rejected");
    }

    // Pick storage backends
    let (directory, appointments): (Arc<dyn DoctorDirectory>, Arc<dyn AppointmentRepository>) =
        if config.is_configured() {
            info!("Using Supabase storage at {}", config.supabase_url);
            (
                Arc::new(SupabaseDoctorDirectory::new(&config)),
                Arc::new(SupabaseAppointmentRepository::new(&config)),
            )
        } else {
            info!("Using in-memory storage");
            (
                Arc::new(InMemoryDoctorDirectory::new()),
                Arc::new(InMemoryAppointmentRepository::new()),
            )
        };

    info!(
        "Clinic hours {:02}:00-{:02}:00, {}-minute slots, UTC offset {} minutes",
        config.clinic.open_hour,
        config.clinic.close_hour,
        config.clinic.slot_minutes,
        config.clinic.utc_offset_minutes
    );

    // Set up CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Create shared state
    let doctor_state = DoctorState::new(config.clone(), DoctorService::new(directory.clone()));
    let appointment_state = AppointmentState::new(config.clone(), appointments, directory);

    // Build the application router
    let app = router::create_router(doctor_state, appointment_state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new()
                    .level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new()
                    .level(Level::INFO)),
        )
        .layer(cors);

    // Run the server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Listening on {}", addr);

    let listener = match TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    if let Err(e) = axum::serve(listener, app).await {
        error!("Server error: {}", e);
        std::process::exit(1);
    }
}
