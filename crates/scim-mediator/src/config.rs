//! Immutable runtime configuration.
//!
//! Built once by the caller and handed to each component's constructor; no
//! component performs its own environment lookups.

use std::path::PathBuf;
use std::time::Duration;

use crate::auth::ApiKey;
use crate::retry::RetryPolicy;

/// Default data directory holding mirror, checkpoint and audit files.
pub const DEFAULT_DATA_DIR: &str = "./data";

/// Default per-attempt HTTP timeout.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

/// Default grace period between deactivation and permanent deletion.
pub const DEFAULT_GRACE_PERIOD_DAYS: i64 = 7;

/// Longest accepted grace period (about a century).
pub const MAX_GRACE_PERIOD_DAYS: i64 = 36_500;

const GRACE_PERIOD_VAR: &str = "SCIM_MEDIATOR_GRACE_PERIOD_DAYS";

/// Convert a day count into a grace period, rejecting negative or
/// out-of-range values instead of overflowing.
pub fn grace_period_from_days(days: i64) -> Result<chrono::Duration, ConfigError> {
    if !(0..=MAX_GRACE_PERIOD_DAYS).contains(&days) {
        return Err(ConfigError::InvalidValue(
            GRACE_PERIOD_VAR.into(),
            format!("must be between 0 and {MAX_GRACE_PERIOD_DAYS} days, got {days}"),
        ));
    }
    chrono::Duration::try_days(days).ok_or_else(|| {
        ConfigError::InvalidValue(GRACE_PERIOD_VAR.into(), format!("{days} days is out of range"))
    })
}

/// Configuration shared by the transport, store and processors.
#[derive(Debug, Clone)]
pub struct MediatorConfig {
    /// Base URL of the SCIM directory (e.g. `https://example.com/scim/v2`).
    pub api_url: String,

    /// Bearer token for the directory.
    pub api_key: ApiKey,

    /// Directory holding `users.json`, `groups.json`, `job_queue.json`, `audit.log`.
    pub data_dir: PathBuf,

    /// Timeout applied to each individual HTTP attempt.
    pub request_timeout: Duration,

    /// Retry behaviour of the transport.
    pub retry: RetryPolicy,

    /// How long a deactivated user is retained before cleanup deletes it.
    pub grace_period: chrono::Duration,
}

impl MediatorConfig {
    /// Create a configuration with defaults for everything except the endpoint.
    pub fn new(api_url: impl Into<String>, api_key: ApiKey) -> Result<Self, ConfigError> {
        let config = Self {
            api_url: api_url.into(),
            api_key,
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            retry: RetryPolicy::default(),
            grace_period: chrono::Duration::days(DEFAULT_GRACE_PERIOD_DAYS),
        };
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_reader(|key| std::env::var(key))
    }

    /// Load configuration from a custom variable reader.
    ///
    /// This allows tests to supply variables without mutating process-global
    /// environment state.
    pub fn from_reader<F>(reader: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Result<String, std::env::VarError>,
    {
        let api_url = reader("SCIM_MEDIATOR_API_URL")
            .map_err(|_| ConfigError::MissingVar("SCIM_MEDIATOR_API_URL".into()))?;

        let api_key = reader("SCIM_MEDIATOR_API_KEY")
            .map(ApiKey::new)
            .map_err(|_| ConfigError::MissingVar("SCIM_MEDIATOR_API_KEY".into()))?;

        let data_dir = reader("SCIM_MEDIATOR_DATA_DIR")
            .ok()
            .filter(|d| !d.trim().is_empty())
            .map_or_else(|| PathBuf::from(DEFAULT_DATA_DIR), PathBuf::from);

        let request_timeout_secs = reader("SCIM_MEDIATOR_REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| DEFAULT_REQUEST_TIMEOUT_SECS.to_string())
            .parse::<u64>()
            .map_err(|e| {
                ConfigError::InvalidValue("SCIM_MEDIATOR_REQUEST_TIMEOUT_SECS".into(), e.to_string())
            })?;

        let mut retry = RetryPolicy::default();
        if let Ok(raw) = reader("SCIM_MEDIATOR_MAX_ATTEMPTS") {
            retry.max_attempts = raw.parse::<u32>().map_err(|e| {
                ConfigError::InvalidValue("SCIM_MEDIATOR_MAX_ATTEMPTS".into(), e.to_string())
            })?;
        }

        let grace_days = reader(GRACE_PERIOD_VAR)
            .unwrap_or_else(|_| DEFAULT_GRACE_PERIOD_DAYS.to_string())
            .parse::<i64>()
            .map_err(|e| ConfigError::InvalidValue(GRACE_PERIOD_VAR.into(), e.to_string()))?;

        let config = Self {
            api_url,
            api_key,
            data_dir,
            request_timeout: Duration::from_secs(request_timeout_secs),
            retry,
            grace_period: grace_period_from_days(grace_days)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Override the data directory.
    #[must_use]
    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = data_dir.into();
        self
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.api_url.trim().is_empty() {
            return Err(ConfigError::MissingVar("SCIM_MEDIATOR_API_URL".into()));
        }
        url::Url::parse(&self.api_url).map_err(|e| {
            ConfigError::InvalidValue("SCIM_MEDIATOR_API_URL".into(), e.to_string())
        })?;
        if self.api_key.is_empty() {
            return Err(ConfigError::MissingVar("SCIM_MEDIATOR_API_KEY".into()));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::InvalidValue(
                "SCIM_MEDIATOR_MAX_ATTEMPTS".into(),
                "must be at least 1".into(),
            ));
        }
        if self.grace_period < chrono::Duration::zero()
            || self.grace_period.num_days() > MAX_GRACE_PERIOD_DAYS
        {
            return Err(ConfigError::InvalidValue(
                GRACE_PERIOD_VAR.into(),
                format!("must be between 0 and {MAX_GRACE_PERIOD_DAYS} days"),
            ));
        }
        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingVar(String),

    #[error("invalid value for {0}: {1}")]
    InvalidValue(String, String),
}
