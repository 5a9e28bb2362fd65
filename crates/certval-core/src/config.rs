//! Configuration types for the validator
//!
//! All timings are plain integers so the struct round-trips through env
//! variables and JSON without custom (de)serializers.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Validator configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorConfig {
    /// Interval between certificate status polls (in seconds)
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Time reserved at the end of the invocation for sending the response
    /// (in seconds)
    ///
    /// The issuance deadline is the invocation deadline minus this margin.
    #[serde(default = "default_safety_margin_secs")]
    pub safety_margin_secs: u64,

    /// Maximum number of retries for a failed DNS change
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay between DNS change retries (in milliseconds)
    ///
    /// Retry `n` waits `n * retry_delay_ms`, capped at `max_retry_delay_ms`.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Upper bound for a single retry delay (in milliseconds)
    #[serde(default = "default_max_retry_delay_ms")]
    pub max_retry_delay_ms: u64,

    /// Maximum number of consecutive failed status reads tolerated per poll
    #[serde(default = "default_status_read_retries")]
    pub status_read_retries: u32,

    /// Interval between checks for published validation records (in seconds)
    #[serde(default = "default_requirements_poll_interval_secs")]
    pub requirements_poll_interval_secs: u64,

    /// How long to wait for ACM to publish validation records (in seconds)
    #[serde(default = "default_requirements_timeout_secs")]
    pub requirements_timeout_secs: u64,

    /// TTL of the validation CNAME records
    #[serde(default = "default_record_ttl")]
    pub record_ttl: u32,
}

impl ValidatorConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            safety_margin_secs: default_safety_margin_secs(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            max_retry_delay_ms: default_max_retry_delay_ms(),
            status_read_retries: default_status_read_retries(),
            requirements_poll_interval_secs: default_requirements_poll_interval_secs(),
            requirements_timeout_secs: default_requirements_timeout_secs(),
            record_ttl: default_record_ttl(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.poll_interval_secs == 0 {
            return Err(crate::Error::config("Poll interval must be > 0"));
        }
        if self.requirements_poll_interval_secs == 0 {
            return Err(crate::Error::config(
                "Requirements poll interval must be > 0",
            ));
        }
        if self.max_retries > 10 {
            return Err(crate::Error::config(format!(
                "max_retries must be between 0 and 10, got {}",
                self.max_retries
            )));
        }
        if self.retry_delay_ms > self.max_retry_delay_ms {
            return Err(crate::Error::config(format!(
                "retry_delay_ms ({}) cannot exceed max_retry_delay_ms ({})",
                self.retry_delay_ms, self.max_retry_delay_ms
            )));
        }
        if self.record_ttl == 0 {
            return Err(crate::Error::config("Record TTL must be > 0"));
        }
        Ok(())
    }

    /// Poll interval as a [`Duration`]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Safety margin as a [`Duration`]
    pub fn safety_margin(&self) -> Duration {
        Duration::from_secs(self.safety_margin_secs)
    }

    /// Retry policy for DNS submissions
    pub fn submission_retry(&self) -> crate::retry::RetryPolicy {
        crate::retry::RetryPolicy::new(
            self.max_retries,
            Duration::from_millis(self.retry_delay_ms),
            Duration::from_millis(self.max_retry_delay_ms),
        )
    }

    /// Retry policy for certificate status reads
    pub fn status_retry(&self) -> crate::retry::RetryPolicy {
        crate::retry::RetryPolicy::new(
            self.status_read_retries,
            Duration::from_millis(self.retry_delay_ms),
            Duration::from_millis(self.max_retry_delay_ms),
        )
    }
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn default_poll_interval_secs() -> u64 {
    5
}

fn default_safety_margin_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_max_retry_delay_ms() -> u64 {
    5000
}

fn default_status_read_retries() -> u32 {
    3
}

fn default_requirements_poll_interval_secs() -> u64 {
    5
}

fn default_requirements_timeout_secs() -> u64 {
    60
}

fn default_record_ttl() -> u32 {
    300
}
