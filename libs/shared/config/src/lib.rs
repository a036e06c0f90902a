use std::env;
use std::str::FromStr;

use chrono::{FixedOffset, Offset, Utc};
use tracing::warn;

/// Clinic operating window and booking granularity.
///
/// Slots are clinic-local wall times; `utc_offset_minutes` ties them to UTC
/// instants and decides which calendar day an appointment lands on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClinicHours {
    pub open_hour: u32,
    pub close_hour: u32,
    pub slot_minutes: u32,
    pub utc_offset_minutes: i32,
}

impl Default for ClinicHours {
    fn default() -> Self {
        Self {
            open_hour: 9,
            close_hour: 18,
            slot_minutes: 30,
            utc_offset_minutes: 0,
        }
    }
}

impl ClinicHours {
    pub fn offset(&self) -> FixedOffset {
        // Out-of-range offsets fall back to UTC
        FixedOffset::east_opt(self.utc_offset_minutes.saturating_mul(60)).unwrap_or(Utc.fix())
    }

    pub fn slots_per_day(&self) -> u32 {
        if self.slot_minutes == 0 {
            return 0;
        }
        self.close_hour.saturating_sub(self.open_hour) * 60 / self.slot_minutes
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_service_key: String,
    pub supabase_jwt_secret: String,
    pub clinic: ClinicHours,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = ClinicHours::default();

        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            supabase_service_key: env::var("SUPABASE_SERVICE_ROLE_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_SERVICE_ROLE_KEY not set, using empty value");
                    String::new()
                }),
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            clinic: ClinicHours {
                open_hour: parse_or("CLINIC_OPEN_HOUR", defaults.open_hour),
                close_hour: parse_or("CLINIC_CLOSE_HOUR", defaults.close_hour),
                slot_minutes: parse_or("CLINIC_SLOT_MINUTES", defaults.slot_minutes),
                utc_offset_minutes: parse_or("CLINIC_UTC_OFFSET_MINUTES", defaults.utc_offset_minutes),
            },
            port: parse_or("PORT", 3000),
        };

        if !config.is_configured() {
            warn!("Database backend not configured - falling back to in-memory storage");
        }

        config
    }

    /// Whether the PostgREST backend can be used for persistence.
    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
            && !self.supabase_service_key.is_empty()
    }

    pub fn is_auth_configured(&self) -> bool {
        !self.supabase_jwt_secret.is_empty()
    }
}

fn parse_or<T>(key: &str, default: T) -> T
where
    T: FromStr + std::fmt::Display + Copy,
{
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("{} has invalid value '{}', using default {}", key, raw, default);
            default
        }),
        Err(_) => {
            warn!("{} not set, using default {}", key, default);
            default
        }
    }
}
