//! ACM implementation of [`CertificateProvider`]
//!
//! ACM clients are regional. The certificate lives in the stack's region,
//! so the Lambda builds one provider per invocation from
//! [`Request::region`](certval_core::Request::region), sharing the
//! credentials loaded at cold start.

use async_trait::async_trait;
use aws_sdk_acm::Client;
use aws_sdk_acm::error::{DisplayErrorContext, SdkError};
use aws_sdk_acm::operation::delete_certificate::DeleteCertificateError;
use aws_sdk_acm::operation::describe_certificate::DescribeCertificateError;
use aws_sdk_acm::types::{self as acm, ValidationMethod};
use certval_core::model::{
    CertificateDetails, CertificateStatus, DomainValidation, RecordType, ResourceRecord,
};
use certval_core::traits::CertificateProvider;
use certval_core::{Error, Result};
use tracing::{debug, info};

/// ACM certificate provider
///
/// # Trust Level: Untrusted
///
/// Single-shot like [`Route53Provider`](crate::Route53Provider). Status read
/// retries belong to the issuance waiter.
#[derive(Debug, Clone)]
pub struct AcmProvider {
    client: Client,
    region: String,
}

impl AcmProvider {
    /// Create a provider for `region` from a shared SDK configuration
    ///
    /// Credentials and retry settings come from `config`; only the region
    /// is overridden.
    pub fn new(config: &aws_config::SdkConfig, region: impl Into<String>) -> Self {
        let region = region.into();
        let config = config
            .to_builder()
            .region(aws_config::Region::new(region.clone()))
            .build();
        Self {
            client: Client::new(&config),
            region,
        }
    }

    pub fn region(&self) -> &str {
        &self.region
    }
}

#[async_trait]
impl CertificateProvider for AcmProvider {
    async fn describe_certificate(&self, arn: &str) -> Result<CertificateDetails> {
        let output = self
            .client
            .describe_certificate()
            .certificate_arn(arn)
            .send()
            .await
            .map_err(|e| describe_error(arn, e))?;

        let detail = output
            .certificate()
            .ok_or_else(|| {
                Error::certificate_provider(format!("DescribeCertificate returned no certificate for {arn}"))
            })?;

        let details = certificate_details(arn, detail);
        debug!(
            arn,
            status = %details.status,
            options = details.domain_validations.len(),
            "described certificate"
        );
        Ok(details)
    }

    async fn request_certificate(
        &self,
        domain_name: &str,
        subject_alternative_names: &[String],
    ) -> Result<String> {
        let sans = (!subject_alternative_names.is_empty()).then(|| subject_alternative_names.to_vec());

        let output = self
            .client
            .request_certificate()
            .domain_name(domain_name)
            .validation_method(ValidationMethod::Dns)
            .set_subject_alternative_names(sans)
            .send()
            .await
            .map_err(|e| {
                Error::certificate_provider(format!(
                    "RequestCertificate failed for {domain_name}: {}",
                    DisplayErrorContext(&e)
                ))
            })?;

        let arn = output
            .certificate_arn()
            .ok_or_else(|| Error::certificate_provider("RequestCertificate returned no ARN"))?
            .to_string();

        info!(%arn, domain_name, region = %self.region, "certificate requested");
        Ok(arn)
    }

    async fn delete_certificate(&self, arn: &str) -> Result<()> {
        self.client
            .delete_certificate()
            .certificate_arn(arn)
            .send()
            .await
            .map_err(|e| delete_error(arn, e))?;

        info!(arn, "certificate deleted");
        Ok(())
    }
}

fn describe_error(arn: &str, err: SdkError<DescribeCertificateError>) -> Error {
    match err.as_service_error() {
        Some(DescribeCertificateError::ResourceNotFoundException(_)) => {
            Error::CertificateNotFound(arn.to_string())
        }
        Some(DescribeCertificateError::InvalidArnException(_)) => {
            Error::schema("Certificate ARN is invalid.")
        }
        _ => Error::certificate_provider(format!(
            "DescribeCertificate failed for {arn}: {}",
            DisplayErrorContext(&err)
        )),
    }
}

fn delete_error(arn: &str, err: SdkError<DeleteCertificateError>) -> Error {
    match err.as_service_error() {
        Some(DeleteCertificateError::ResourceNotFoundException(_)) => {
            Error::CertificateNotFound(arn.to_string())
        }
        Some(DeleteCertificateError::InvalidArnException(_)) => {
            Error::schema("Certificate ARN is invalid.")
        }
        _ => Error::certificate_provider(format!(
            "DeleteCertificate failed for {arn}: {}",
            DisplayErrorContext(&err)
        )),
    }
}

fn certificate_details(arn: &str, detail: &acm::CertificateDetail) -> CertificateDetails {
    let status = detail
        .status()
        .map(|s| CertificateStatus::parse(s.as_str()))
        .unwrap_or_else(|| CertificateStatus::parse("PENDING_VALIDATION"));

    CertificateDetails {
        arn: detail.certificate_arn().unwrap_or(arn).to_string(),
        status,
        domain_validations: detail
            .domain_validation_options()
            .iter()
            .filter_map(domain_validation)
            .collect(),
    }
}

/// Email-validated options never carry a record
fn domain_validation(option: &acm::DomainValidation) -> Option<DomainValidation> {
    if matches!(option.validation_method(), Some(method) if *method != ValidationMethod::Dns) {
        return None;
    }

    Some(DomainValidation {
        domain_name: option.domain_name().to_string(),
        validation_status: option.validation_status().map(|s| s.as_str().to_string()),
        resource_record: option.resource_record().map(|rr| ResourceRecord {
            name: rr.name().to_string(),
            record_type: RecordType::parse(rr.r#type().as_str()),
            value: rr.value().to_string(),
        }),
    })
}
