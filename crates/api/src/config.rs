use accessgate_core::release::{DEFAULT_VALIDITY_HOURS, DEFAULT_WORK_SCHEDULE_CODE};
use accessgate_core::scheduling::{DEFAULT_TIMER_SKEW_SECS, DEFAULT_UTC_OFFSET_MINUTES};
use accessgate_core::sync::DEFAULT_EQUIPMENT_TIMEOUT_SECS;

/// A variable was set but could not be parsed.
#[derive(Debug, thiserror::Error)]
#[error("{var} must be a valid {expected}, got '{value}'")]
pub struct ConfigError {
    pub var: &'static str,
    pub expected: &'static str,
    pub value: String,
}

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Grace period for background tasks after the listener stops.
    pub shutdown_timeout_secs: u64,
    /// Base URL of the controller bridge.
    pub equipment_api_url: String,
    /// Bound on every single equipment call.
    pub equipment_timeout_secs: u64,
    pub release_default_validity_hours: i64,
    pub default_work_schedule_code: i32,
    /// Offset defining the local day for the midnight sweep (east positive).
    pub scheduler_utc_offset_minutes: i32,
    pub timer_skew_secs: i64,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                          | Default                  |
    /// |----------------------------------|--------------------------|
    /// | `HOST`                           | `0.0.0.0`                |
    /// | `PORT`                           | `3000`                   |
    /// | `CORS_ORIGINS`                   | `http://localhost:5173`  |
    /// | `REQUEST_TIMEOUT_SECS`           | `30`                     |
    /// | `SHUTDOWN_TIMEOUT_SECS`          | `30`                     |
    /// | `EQUIPMENT_API_URL`              | `http://localhost:8090`  |
    /// | `EQUIPMENT_TIMEOUT_SECS`         | `10`                     |
    /// | `RELEASE_DEFAULT_VALIDITY_HOURS` | `24`                     |
    /// | `DEFAULT_WORK_SCHEDULE_CODE`     | `1`                      |
    /// | `SCHEDULER_UTC_OFFSET_MINUTES`   | `-180`                   |
    /// | `TIMER_SKEW_SECS`                | `1`                      |
    ///
    /// `DATABASE_URL` is read separately by `main`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let equipment_api_url = std::env::var("EQUIPMENT_API_URL")
            .unwrap_or_else(|_| "http://localhost:8090".into());

        Ok(Self {
            host,
            port: parse_var("PORT", 3000, "u16")?,
            cors_origins,
            request_timeout_secs: parse_var("REQUEST_TIMEOUT_SECS", 30, "u64")?,
            shutdown_timeout_secs: parse_var("SHUTDOWN_TIMEOUT_SECS", 30, "u64")?,
            equipment_api_url,
            equipment_timeout_secs: parse_var(
                "EQUIPMENT_TIMEOUT_SECS",
                DEFAULT_EQUIPMENT_TIMEOUT_SECS,
                "u64",
            )?,
            release_default_validity_hours: parse_var(
                "RELEASE_DEFAULT_VALIDITY_HOURS",
                DEFAULT_VALIDITY_HOURS,
                "i64",
            )?,
            default_work_schedule_code: parse_var(
                "DEFAULT_WORK_SCHEDULE_CODE",
                DEFAULT_WORK_SCHEDULE_CODE,
                "i32",
            )?,
            scheduler_utc_offset_minutes: parse_var(
                "SCHEDULER_UTC_OFFSET_MINUTES",
                DEFAULT_UTC_OFFSET_MINUTES,
                "i32",
            )?,
            timer_skew_secs: parse_var("TIMER_SKEW_SECS", DEFAULT_TIMER_SKEW_SECS, "i64")?,
        })
    }
}

fn parse_var<T: std::str::FromStr>(
    var: &'static str,
    default: T,
    expected: &'static str,
) -> Result<T, ConfigError> {
    match std::env::var(var) {
        Ok(value) => value.trim().parse().map_err(|_| ConfigError {
            var,
            expected,
            value,
        }),
        Err(_) => Ok(default),
    }
}
