//! CloudFormation custom resource request and response documents
//!
//! Field names follow the CloudFormation wire format (PascalCase, with the
//! odd `ResponseURL`).

use crate::error::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::LazyLock;
use tracing::{info, warn};

/// Region used when it cannot be derived from the stack id
pub const DEFAULT_REGION: &str = "us-east-1";

/// Resource type of the certificate handler
pub const CERTIFICATE_RESOURCE_TYPE: &str = "Custom::Certificate";

/// Resource type of the validator handler
pub const VALIDATOR_RESOURCE_TYPE: &str = "Custom::CertificateValidator";

/// Anchored at the start only: anything after a well-formed prefix is left
/// for ACM to reject
static CERTIFICATE_ARN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^arn:aws:acm:[\w+=/,.@-]*:[0-9]+:[\w+=,.@-]+(/[\w+=,.@-]+)*")
        .expect("certificate ARN pattern is valid")
});

/// Whether `arn` looks like an ACM certificate ARN
pub fn is_valid_certificate_arn(arn: &str) -> bool {
    CERTIFICATE_ARN.is_match(arn)
}

/// Return `arn` if it is a valid ACM certificate ARN
///
/// # Errors
///
/// `Error::Schema` with reason `Certificate ARN is invalid.`
pub fn require_certificate_arn(arn: Option<&str>) -> Result<&str> {
    match arn {
        Some(arn) if is_valid_certificate_arn(arn) => Ok(arn),
        _ => Err(Error::schema("Certificate ARN is invalid.")),
    }
}

/// Lifecycle event kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RequestType {
    Create,
    Update,
    Delete,
    /// Anything CloudFormation should never send
    Unknown(String),
}

impl From<String> for RequestType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Create" => Self::Create,
            "Update" => Self::Update,
            "Delete" => Self::Delete,
            _ => Self::Unknown(value),
        }
    }
}

impl From<RequestType> for String {
    fn from(value: RequestType) -> Self {
        value.to_string()
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => f.write_str("Create"),
            Self::Update => f.write_str("Update"),
            Self::Delete => f.write_str("Delete"),
            Self::Unknown(other) => f.write_str(other),
        }
    }
}

/// Properties of a custom resource as declared in the template
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResourceProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_token: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain_name: Option<String>,

    /// Alternative names with null, empty and `-` entries removed
    #[serde(
        default,
        deserialize_with = "clean_list",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub subject_alternative_names: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate_arn: Option<String>,

    /// One of DEBUG, INFO, WARNING, ERROR, CRITICAL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

/// Templates commonly use `-` as a placeholder for "no value" in lists built
/// with `Fn::Split`
fn clean_list<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<Vec<Option<String>>> = Option::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .flatten()
        .filter(|value| !value.is_empty() && value != "-")
        .collect())
}

/// A custom resource request sent by CloudFormation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Request {
    pub request_type: RequestType,

    /// Pre-signed URL the response must be uploaded to
    #[serde(rename = "ResponseURL")]
    pub response_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_token: Option<String>,

    pub stack_id: String,

    pub request_id: String,

    pub resource_type: String,

    pub logical_resource_id: String,

    /// Absent on Create
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub physical_resource_id: Option<String>,

    #[serde(default)]
    pub resource_properties: ResourceProperties,

    /// Present on Update only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_resource_properties: Option<ResourceProperties>,
}

impl Request {
    /// Parse a request from the raw event
    pub fn from_value(event: Value) -> Result<Self> {
        Ok(serde_json::from_value(event)?)
    }

    /// Region of the stack, the fourth field of the stack ARN
    pub fn region(&self) -> String {
        match self.stack_id.split(':').nth(3) {
            Some(region) if !region.is_empty() => {
                info!(region, "determined region from stack id");
                region.to_string()
            }
            _ => {
                warn!(
                    stack_id = %self.stack_id,
                    region = DEFAULT_REGION,
                    "could not parse region from stack id, using default"
                );
                DEFAULT_REGION.to_string()
            }
        }
    }

    /// Physical id from the request, or an empty string
    pub fn physical_resource_id(&self) -> &str {
        self.physical_resource_id.as_deref().unwrap_or_default()
    }
}

/// Outcome reported to CloudFormation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    Success,
    Failed,
}

/// A custom resource response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Response {
    pub status: Status,

    /// Required by CloudFormation when the status is FAILED
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,

    pub physical_resource_id: String,

    pub stack_id: String,

    pub request_id: String,

    pub logical_resource_id: String,

    #[serde(default)]
    pub no_echo: bool,

    /// Attributes readable with `Fn::GetAtt`
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub data: Map<String, Value>,
}

impl Response {
    /// Start a successful response echoing the request's identifiers
    pub fn for_request(request: &Request) -> Self {
        Self {
            status: Status::Success,
            reason: String::new(),
            physical_resource_id: request.physical_resource_id().to_string(),
            stack_id: request.stack_id.clone(),
            request_id: request.request_id.clone(),
            logical_resource_id: request.logical_resource_id.clone(),
            no_echo: false,
            data: Map::new(),
        }
    }

    /// Mark the response successful with an optional reason
    pub fn succeed(&mut self, reason: impl Into<String>) {
        self.status = Status::Success;
        self.reason = reason.into();
    }

    /// Mark the response failed
    pub fn fail(&mut self, reason: impl Into<String>) {
        self.status = Status::Failed;
        self.reason = reason.into();
    }

    /// Add a `Fn::GetAtt` attribute
    pub fn set_data(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.data.insert(key.into(), value.into());
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }
}
