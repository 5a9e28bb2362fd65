//! Domain types shared by the resolver, reconciler and waiter

use serde::{Deserialize, Serialize};
use std::fmt;

/// Normalize a DNS name to lowercase with a single trailing dot
pub fn normalize_name(name: &str) -> String {
    let trimmed = name.trim().trim_end_matches('.');
    let mut normalized = trimmed.to_ascii_lowercase();
    normalized.push('.');
    normalized
}

/// DNS record type of a validation record
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RecordType {
    /// Canonical name record, the only type ACM asks for
    #[serde(rename = "CNAME")]
    Cname,
    /// Anything else, kept verbatim
    #[serde(untagged)]
    Other(String),
}

impl RecordType {
    /// Parse a record type as reported by a provider
    pub fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("CNAME") {
            RecordType::Cname
        } else {
            RecordType::Other(value.to_ascii_uppercase())
        }
    }

    /// Wire representation
    pub fn as_str(&self) -> &str {
        match self {
            RecordType::Cname => "CNAME",
            RecordType::Other(other) => other,
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of a certificate as reported by ACM
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CertificateStatus {
    PendingValidation,
    Issued,
    Inactive,
    Expired,
    ValidationTimedOut,
    Revoked,
    Failed,
    /// A status this crate does not know about; treated as still pending
    Unknown(String),
}

impl CertificateStatus {
    /// Parse the ACM wire representation
    pub fn parse(value: &str) -> Self {
        match value {
            "PENDING_VALIDATION" => Self::PendingValidation,
            "ISSUED" => Self::Issued,
            "INACTIVE" => Self::Inactive,
            "EXPIRED" => Self::Expired,
            "VALIDATION_TIMED_OUT" => Self::ValidationTimedOut,
            "REVOKED" => Self::Revoked,
            "FAILED" => Self::Failed,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// ACM wire representation
    pub fn as_str(&self) -> &str {
        match self {
            Self::PendingValidation => "PENDING_VALIDATION",
            Self::Issued => "ISSUED",
            Self::Inactive => "INACTIVE",
            Self::Expired => "EXPIRED",
            Self::ValidationTimedOut => "VALIDATION_TIMED_OUT",
            Self::Revoked => "REVOKED",
            Self::Failed => "FAILED",
            Self::Unknown(other) => other,
        }
    }

    /// Whether the certificate can no longer become issued
    pub fn is_terminal_failure(&self) -> bool {
        matches!(
            self,
            Self::Failed | Self::Revoked | Self::ValidationTimedOut | Self::Expired | Self::Inactive
        )
    }
}

impl fmt::Display for CertificateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resource record ACM wants published for one domain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRecord {
    pub name: String,
    pub record_type: RecordType,
    pub value: String,
}

/// One domain validation option of a certificate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainValidation {
    /// The validated domain (may be a wildcard)
    pub domain_name: String,
    /// Per-domain validation status, verbatim from the provider
    pub validation_status: Option<String>,
    /// The record to publish; absent until ACM has generated it, and
    /// always absent for non-DNS validation
    pub resource_record: Option<ResourceRecord>,
}

/// Snapshot of a certificate returned by the status provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateDetails {
    pub arn: String,
    pub status: CertificateStatus,
    pub domain_validations: Vec<DomainValidation>,
}

impl CertificateDetails {
    /// Validation requirements for every option that carries a record
    pub fn requirements(&self) -> Vec<ValidationRequirement> {
        self.domain_validations
            .iter()
            .filter_map(|dv| {
                dv.resource_record.as_ref().map(|rr| ValidationRequirement {
                    domain_name: dv.domain_name.clone(),
                    record_name: rr.name.clone(),
                    record_type: rr.record_type.clone(),
                    record_value: rr.value.clone(),
                    validation_status: dv.validation_status.clone(),
                })
            })
            .collect()
    }

    /// Domains whose validation record has not been published yet
    pub fn missing_records(&self) -> Vec<String> {
        self.domain_validations
            .iter()
            .filter(|dv| dv.resource_record.is_none())
            .map(|dv| dv.domain_name.clone())
            .collect()
    }
}

/// A record ACM requires for proving control of one domain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationRequirement {
    pub domain_name: String,
    pub record_name: String,
    pub record_type: RecordType,
    pub record_value: String,
    pub validation_status: Option<String>,
}

impl ValidationRequirement {
    /// Convenience constructor for CNAME requirements
    pub fn cname(
        domain_name: impl Into<String>,
        record_name: impl Into<String>,
        record_value: impl Into<String>,
    ) -> Self {
        Self {
            domain_name: domain_name.into(),
            record_name: record_name.into(),
            record_type: RecordType::Cname,
            record_value: record_value.into(),
            validation_status: None,
        }
    }
}

/// An authoritative DNS zone
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostedZone {
    pub id: String,
    pub dns_name: String,
}

impl HostedZone {
    pub fn new(id: impl Into<String>, dns_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            dns_name: dns_name.into(),
        }
    }
}

/// A requirement paired with the zone that owns its record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneAssignment {
    pub requirement: ValidationRequirement,
    pub zone: HostedZone,
}

/// Identity of a managed record for diffing
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordKey {
    pub hosted_zone_id: String,
    pub record_name: String,
    pub record_type: RecordType,
}

/// A DNS record this system is responsible for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedRecord {
    pub hosted_zone_id: String,
    pub record_name: String,
    pub record_type: RecordType,
    pub record_value: String,
    pub ttl: u32,
}

impl ManagedRecord {
    /// Build the record for an assignment
    pub fn from_assignment(assignment: &ZoneAssignment, ttl: u32) -> Self {
        Self {
            hosted_zone_id: assignment.zone.id.clone(),
            record_name: normalize_name(&assignment.requirement.record_name),
            record_type: assignment.requirement.record_type.clone(),
            record_value: assignment.requirement.record_value.clone(),
            ttl,
        }
    }

    /// Diff identity
    pub fn key(&self) -> RecordKey {
        RecordKey {
            hosted_zone_id: self.hosted_zone_id.clone(),
            record_name: normalize_name(&self.record_name),
            record_type: self.record_type.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_adds_single_trailing_dot() {
        assert_eq!(normalize_name("Example.COM"), "example.com.");
        assert_eq!(normalize_name("example.com."), "example.com.");
        assert_eq!(normalize_name("example.com.."), "example.com.");
    }

    #[test]
    fn terminal_failure_statuses() {
        assert!(CertificateStatus::parse("FAILED").is_terminal_failure());
        assert!(CertificateStatus::parse("REVOKED").is_terminal_failure());
        assert!(CertificateStatus::parse("VALIDATION_TIMED_OUT").is_terminal_failure());
        assert!(!CertificateStatus::parse("PENDING_VALIDATION").is_terminal_failure());
        assert!(!CertificateStatus::parse("ISSUED").is_terminal_failure());
        assert_eq!(
            CertificateStatus::parse("SOMETHING_NEW"),
            CertificateStatus::Unknown("SOMETHING_NEW".into())
        );
    }

    #[test]
    fn requirements_skip_options_without_records() {
        let details = CertificateDetails {
            arn: "arn".into(),
            status: CertificateStatus::PendingValidation,
            domain_validations: vec![
                DomainValidation {
                    domain_name: "a.com".into(),
                    validation_status: Some("PENDING_VALIDATION".into()),
                    resource_record: Some(ResourceRecord {
                        name: "_r1.a.com.".into(),
                        record_type: RecordType::Cname,
                        value: "_v1.acm-validations.aws.".into(),
                    }),
                },
                DomainValidation {
                    domain_name: "www.a.com".into(),
                    validation_status: None,
                    resource_record: None,
                },
            ],
        };

        let requirements = details.requirements();
        assert_eq!(requirements.len(), 1);
        assert_eq!(requirements[0].record_name, "_r1.a.com.");
        assert_eq!(details.missing_records(), vec!["www.a.com".to_string()]);
    }

    #[test]
    fn record_key_ignores_case_and_trailing_dot() {
        let a = ManagedRecord {
            hosted_zone_id: "Z1".into(),
            record_name: "_R1.A.com".into(),
            record_type: RecordType::Cname,
            record_value: "v".into(),
            ttl: 300,
        };
        let b = ManagedRecord {
            record_name: "_r1.a.com.".into(),
            ..a.clone()
        };
        assert_eq!(a.key(), b.key());
    }
}
