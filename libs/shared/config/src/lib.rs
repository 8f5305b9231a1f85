use std::env;
use std::str::FromStr;

use chrono::{FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    Memory,
    Supabase,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" | "in_memory" => Ok(StorageBackend::Memory),
            "supabase" | "postgrest" => Ok(StorageBackend::Supabase),
            other => Err(format!("unknown storage backend '{}'", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_jwt_secret: String,
    pub storage_backend: StorageBackend,
    pub clinic_utc_offset_minutes: i32,
    pub slot_duration_minutes: u32,
    pub reminder_sweep_interval_secs: u64,
    pub reject_overlapping_windows: bool,
    pub mail_api_url: String,
    pub mail_api_token: String,
    pub mail_from: String,
    /// Upper bound on a single mail delivery.
    pub mail_timeout_secs: u64,
    pub port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            supabase_url: String::new(),
            supabase_anon_key: String::new(),
            supabase_jwt_secret: String::new(),
            storage_backend: StorageBackend::Memory,
            clinic_utc_offset_minutes: 0,
            slot_duration_minutes: 60,
            reminder_sweep_interval_secs: 3600,
            reject_overlapping_windows: true,
            mail_api_url: String::new(),
            mail_api_token: String::new(),
            mail_from: "noreply@clinic.local".to_string(),
            mail_timeout_secs: 10,
            port: 3000,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

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
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            storage_backend: parse_or("STORAGE_BACKEND", defaults.storage_backend),
            clinic_utc_offset_minutes: parse_or("CLINIC_UTC_OFFSET_MINUTES", defaults.clinic_utc_offset_minutes),
            slot_duration_minutes: match parse_or("SLOT_DURATION_MINUTES", defaults.slot_duration_minutes) {
                0 => {
                    warn!("SLOT_DURATION_MINUTES must be positive, using {}", defaults.slot_duration_minutes);
                    defaults.slot_duration_minutes
                }
                minutes => minutes,
            },
            reminder_sweep_interval_secs: parse_or("REMINDER_SWEEP_INTERVAL_SECS", defaults.reminder_sweep_interval_secs),
            reject_overlapping_windows: parse_or("REJECT_OVERLAPPING_WINDOWS", defaults.reject_overlapping_windows),
            mail_api_url: env::var("MAIL_API_URL")
                .unwrap_or_else(|_| {
                    warn!("MAIL_API_URL not set, notifications will only be logged");
                    String::new()
                }),
            mail_api_token: env::var("MAIL_API_TOKEN").unwrap_or_default(),
            mail_from: env::var("MAIL_FROM").unwrap_or(defaults.mail_from),
            mail_timeout_secs: match parse_or("MAIL_TIMEOUT_SECS", defaults.mail_timeout_secs) {
                0 => {
                    warn!("MAIL_TIMEOUT_SECS must be positive, using {}", defaults.mail_timeout_secs);
                    defaults.mail_timeout_secs
                }
                secs => secs,
            },
            port: parse_or("PORT", defaults.port),
        };

        if config.storage_backend == StorageBackend::Supabase && !config.is_configured() {
            warn!("Supabase storage selected but not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
            && !self.supabase_jwt_secret.is_empty()
    }

    pub fn is_mail_configured(&self) -> bool {
        !self.mail_api_url.is_empty()
    }

    /// Fixed offset of the clinic's wall clock.
    pub fn clinic_offset(&self) -> FixedOffset {
        let seconds = self.clinic_utc_offset_minutes.checked_mul(60);
        seconds.and_then(FixedOffset::east_opt).unwrap_or_else(|| {
            warn!(
                "CLINIC_UTC_OFFSET_MINUTES={} is out of range, using UTC",
                self.clinic_utc_offset_minutes
            );
            Utc.fix()
        })
    }
}

fn parse_or<T>(key: &str, default: T) -> T
where
    T: FromStr + std::fmt::Debug,
{
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("{} has invalid value '{}', using default {:?}", key, raw, default);
            default
        }),
        Err(_) => default,
    }
}
