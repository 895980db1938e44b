//! Process configuration parsed from environment variables.
//!
//! DESIGN
//! ======
//! Everything is read once in `main` and handed down as a typed `AppConfig`.
//! Parsing goes through a lookup closure so tests can feed values without
//! touching the real process environment.

use std::path::PathBuf;

use crate::identity::SERVICE_ACCOUNT_ENV;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_DATA_ROOT: &str = ".";
pub const DEFAULT_NOTIFICATIONS_CRON: &str = "* * * * *";
pub const DEFAULT_DISPATCH_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {var}: {value:?}")]
    Invalid { var: &'static str, value: String },
}

/// Settings for the recurring notification trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationConfig {
    /// Five-field cron expression.
    pub cadence: String,
    /// Endpoint the dispatch routine posts to. `None` disables delivery.
    pub dispatch_url: Option<String>,
    pub dispatch_timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// Parent directory of the working directories.
    pub data_root: PathBuf,
    /// Raw structured credential, if provided.
    pub service_account_json: Option<String>,
    pub notifications: NotificationConfig,
}

impl AppConfig {
    /// Build typed config from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric variable is present but unparseable.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build typed config from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric variable is present but unparseable.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = non_blank(lookup("HOST")).unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = parse_or("PORT", lookup("PORT"), DEFAULT_PORT)?;
        let data_root = non_blank(lookup("DATA_ROOT")).map_or_else(|| PathBuf::from(DEFAULT_DATA_ROOT), PathBuf::from);

        let dispatch_timeout_secs = parse_or(
            "NOTIFICATIONS_DISPATCH_TIMEOUT_SECS",
            lookup("NOTIFICATIONS_DISPATCH_TIMEOUT_SECS"),
            DEFAULT_DISPATCH_TIMEOUT_SECS,
        )?;
        // A zero timeout would fail every dispatch before it is sent.
        if dispatch_timeout_secs == 0 {
            return Err(ConfigError::Invalid { var: "NOTIFICATIONS_DISPATCH_TIMEOUT_SECS", value: "0".into() });
        }

        let notifications = NotificationConfig {
            cadence: non_blank(lookup("NOTIFICATIONS_CRON")).unwrap_or_else(|| DEFAULT_NOTIFICATIONS_CRON.to_string()),
            dispatch_url: non_blank(lookup("NOTIFICATIONS_DISPATCH_URL")),
            dispatch_timeout_secs,
        };

        Ok(Self {
            host,
            port,
            data_root,
            // Kept verbatim: the identity module decides what counts as blank.
            service_account_json: lookup(SERVICE_ACCOUNT_ENV),
            notifications,
        })
    }

    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Load `.env` from the working directory or a parent, if there is one.
/// Returns the loaded file's path; a missing file is `Ok(None)`.
///
/// # Errors
///
/// Returns an error if a `.env` file exists but cannot be read or parsed.
pub fn load_dotenv() -> Result<Option<PathBuf>, dotenvy::Error> {
    missing_is_ok(dotenvy::dotenv())
}

fn missing_is_ok<T>(result: Result<T, dotenvy::Error>) -> Result<Option<T>, dotenvy::Error> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_or<T>(var: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
{
    match non_blank(raw) {
        None => Ok(default),
        Some(value) => value.parse::<T>().map_err(|_| ConfigError::Invalid { var, value }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
