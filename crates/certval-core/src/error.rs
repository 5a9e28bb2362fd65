//! Error types for certificate validation
//!
//! Every failure a handler can hit ends up here and is eventually rendered
//! into the `Reason` of a FAILED CloudFormation response.

use thiserror::Error;

/// Result type alias for certval operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid resource properties (malformed ARN, missing field)
    #[error("{0}")]
    Schema(String),

    /// Request type is not one of Create, Update, or Delete
    #[error("Unknown RequestType: Must be one of: Create, Update, or Delete.")]
    UnknownRequestType(String),

    /// No hosted zone contains the domain
    #[error("No hosted zone found for domain {domain}")]
    ZoneNotFound {
        /// Domain that could not be resolved
        domain: String,
    },

    /// More than one hosted zone with the same name matched the domain
    #[error("Domain {domain} matches multiple hosted zones named {zone_name}: {zone_ids:?}")]
    AmbiguousZone {
        /// Domain being resolved
        domain: String,
        /// The duplicated zone name
        zone_name: String,
        /// Ids of every zone carrying that name
        zone_ids: Vec<String>,
    },

    /// A record of a different type already exists at the target name
    #[error("Conflicting record at {record_name} in zone {zone_id}: existing {existing_type} record, refusing to write {record_type}")]
    ConflictingRecord {
        /// Hosted zone id
        zone_id: String,
        /// Record name
        record_name: String,
        /// Type this system wanted to write
        record_type: String,
        /// Type already present
        existing_type: String,
    },

    /// A DNS change could not be submitted after all retries
    #[error("Failed to submit record changes to zone {zone_id}: {message}")]
    RecordSubmission {
        /// Hosted zone id
        zone_id: String,
        /// Last underlying error
        message: String,
    },

    /// The certificate reached a terminal non-issued state
    #[error("Certificate {arn} failed validation with status {status}")]
    IssuanceFailed {
        /// Certificate ARN
        arn: String,
        /// Terminal status observed
        status: String,
    },

    /// The deadline passed while the certificate was still pending
    #[error("Timed out after {elapsed_secs}s ({attempts} polls) waiting for certificate {arn} to be issued; last status {last_status}")]
    IssuanceTimedOut {
        /// Certificate ARN
        arn: String,
        /// Number of status polls performed
        attempts: u32,
        /// Seconds spent waiting
        elapsed_secs: u64,
        /// Last status observed, if any
        last_status: String,
    },

    /// The certificate status endpoint kept failing
    #[error("Polling certificate {arn} failed after {attempts} attempts: {message}")]
    Polling {
        /// Certificate ARN
        arn: String,
        /// Attempts made
        attempts: u32,
        /// Last underlying error
        message: String,
    },

    /// ACM did not publish validation records in time
    #[error("Validation records for certificate {arn} not available: {missing:?}")]
    RequirementsUnavailable {
        /// Certificate ARN
        arn: String,
        /// Domains still lacking a resource record
        missing: Vec<String>,
    },

    /// The certificate does not exist
    #[error("Certificate not found: {0}")]
    CertificateNotFound(String),

    /// Certificate provider error (transient unless stated otherwise)
    #[error("Certificate provider error: {0}")]
    CertificateProvider(String),

    /// DNS provider-related errors (transient)
    #[error("DNS provider error: {0}")]
    DnsProvider(String),

    /// The DNS provider refused a change for good
    #[error("DNS provider rejected the change: {0}")]
    DnsRejected(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP errors while delivering the response
    #[error("HTTP error: {0}")]
    Http(String),
}

impl Error {
    /// Create a schema error
    pub fn schema(msg: impl Into<String>) -> Self {
        Self::Schema(msg.into())
    }

    /// Create a zone-not-found error
    pub fn zone_not_found(domain: impl Into<String>) -> Self {
        Self::ZoneNotFound {
            domain: domain.into(),
        }
    }

    /// Create a record submission error
    pub fn record_submission(zone_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RecordSubmission {
            zone_id: zone_id.into(),
            message: message.into(),
        }
    }

    /// Create a certificate provider error
    pub fn certificate_provider(msg: impl Into<String>) -> Self {
        Self::CertificateProvider(msg.into())
    }

    /// Create a DNS provider error
    pub fn dns_provider(msg: impl Into<String>) -> Self {
        Self::DnsProvider(msg.into())
    }

    /// Create a permanent DNS rejection error
    pub fn dns_rejected(msg: impl Into<String>) -> Self {
        Self::DnsRejected(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Whether retrying the same call may succeed
    ///
    /// Conflicts, schema errors and terminal certificate states never change
    /// on retry and are surfaced immediately.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::RecordSubmission { .. }
                | Error::DnsProvider(_)
                | Error::CertificateProvider(_)
                | Error::Http(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(Error::dns_provider("throttled").is_transient());
        assert!(Error::record_submission("Z1", "timeout").is_transient());
        assert!(!Error::zone_not_found("a.com").is_transient());
        assert!(!Error::dns_rejected("InvalidChangeBatch").is_transient());
        assert!(
            !Error::ConflictingRecord {
                zone_id: "Z1".into(),
                record_name: "_x.a.com.".into(),
                record_type: "CNAME".into(),
                existing_type: "TXT".into(),
            }
            .is_transient()
        );
    }

    #[test]
    fn timeout_and_failure_reasons_are_distinguishable() {
        let failed = Error::IssuanceFailed {
            arn: "arn".into(),
            status: "FAILED".into(),
        };
        let timed_out = Error::IssuanceTimedOut {
            arn: "arn".into(),
            attempts: 3,
            elapsed_secs: 15,
            last_status: "PENDING_VALIDATION".into(),
        };
        assert!(failed.to_string().contains("failed validation"));
        assert!(timed_out.to_string().starts_with("Timed out"));
    }
}
