//! Environment configuration for the Lambda binary

use crate::logging::LogLevel;
use anyhow::{Context, Result};
use certval_core::ValidatorConfig;
use std::str::FromStr;

/// Application configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub validator: ValidatorConfig,
    /// Level used when a request carries no `LogLevel` property
    pub log_level: LogLevel,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through `lookup`, which maps a variable name to
    /// its value
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut validator = ValidatorConfig::default();

        read(&lookup, "CERTVAL_POLL_INTERVAL_SECS", &mut validator.poll_interval_secs)?;
        read(&lookup, "CERTVAL_SAFETY_MARGIN_SECS", &mut validator.safety_margin_secs)?;
        read(&lookup, "CERTVAL_MAX_RETRIES", &mut validator.max_retries)?;
        read(&lookup, "CERTVAL_RETRY_DELAY_MS", &mut validator.retry_delay_ms)?;
        read(&lookup, "CERTVAL_MAX_RETRY_DELAY_MS", &mut validator.max_retry_delay_ms)?;
        read(&lookup, "CERTVAL_STATUS_READ_RETRIES", &mut validator.status_read_retries)?;
        read(
            &lookup,
            "CERTVAL_REQUIREMENTS_POLL_INTERVAL_SECS",
            &mut validator.requirements_poll_interval_secs,
        )?;
        read(
            &lookup,
            "CERTVAL_REQUIREMENTS_TIMEOUT_SECS",
            &mut validator.requirements_timeout_secs,
        )?;
        read(&lookup, "CERTVAL_RECORD_TTL", &mut validator.record_ttl)?;

        let log_level = match lookup("CERTVAL_LOG_LEVEL") {
            Some(value) => LogLevel::parse(&value).with_context(|| {
                format!(
                    "CERTVAL_LOG_LEVEL '{value}' is not supported. \
                    Supported levels: DEBUG, INFO, WARNING, ERROR, CRITICAL"
                )
            })?,
            None => LogLevel::default(),
        };

        Ok(Self {
            validator,
            log_level,
        })
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.validator.validate()?;

        // the waiter needs at least one poll after the margin is reserved
        if self.validator.safety_margin_secs >= 900 {
            anyhow::bail!(
                "CERTVAL_SAFETY_MARGIN_SECS ({}) leaves no time inside the 15 minute Lambda limit",
                self.validator.safety_margin_secs
            );
        }

        Ok(())
    }
}

/// Overwrite `target` if `name` is set
fn read<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str, target: &mut T) -> Result<()>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    if let Some(raw) = lookup(name) {
        *target = raw
            .trim()
            .parse()
            .with_context(|| format!("{name} must be a non-negative integer, got '{raw}'"))?;
    }
    Ok(())
}
