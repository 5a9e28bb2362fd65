//! Tracing setup for CloudWatch
//!
//! JSON events on stdout, filtered by an [`EnvFilter`] that each invocation
//! can swap through a reload handle. Dependencies log at `warn` unless the
//! request asks for less.

use tracing::level_filters::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry, fmt, reload};

/// Crates whose events follow the requested level
const OWN_CRATES: [&str; 3] = ["certval_core", "certval_provider_aws", "certval_lambda"];

/// Level names accepted in the `LogLevel` resource property
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    /// Case-insensitive parse of DEBUG, INFO, WARNING, ERROR or CRITICAL
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "DEBUG" => Some(Self::Debug),
            "INFO" => Some(Self::Info),
            "WARNING" => Some(Self::Warning),
            "ERROR" => Some(Self::Error),
            "CRITICAL" => Some(Self::Critical),
            _ => None,
        }
    }

    /// tracing has no level above error
    pub fn filter(self) -> LevelFilter {
        match self {
            Self::Debug => LevelFilter::DEBUG,
            Self::Info => LevelFilter::INFO,
            Self::Warning => LevelFilter::WARN,
            Self::Error | Self::Critical => LevelFilter::ERROR,
        }
    }

    fn directives(self) -> String {
        let level = self.filter();
        let base = level.min(LevelFilter::WARN);
        OWN_CRATES
            .iter()
            .fold(base.to_string(), |acc, krate| format!("{acc},{krate}={level}"))
    }
}

/// Handle for changing the level of an installed subscriber
pub struct Logging {
    handle: reload::Handle<EnvFilter, Registry>,
    default_level: LogLevel,
}

impl Logging {
    /// Install the global subscriber
    pub fn init(default_level: LogLevel) -> anyhow::Result<Self> {
        let (filter, handle) = reload::Layer::new(EnvFilter::new(default_level.directives()));

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().flatten_event(true))
            .try_init()?;

        Ok(Self {
            handle,
            default_level,
        })
    }

    /// Apply the request's `LogLevel` property, falling back to the default
    /// for absent or unknown values
    pub fn apply(&self, requested: Option<&str>) {
        let level = match requested {
            None => self.default_level,
            Some(value) => LogLevel::parse(value).unwrap_or_else(|| {
                tracing::warn!(log_level = value, "unknown LogLevel, using default");
                self.default_level
            }),
        };

        if let Err(e) = self.handle.reload(EnvFilter::new(level.directives())) {
            tracing::warn!(error = %e, "failed to change log level");
        }
    }
}
