// # Certificate Provider Trait
//
// Defines the interface to the certificate-issuing service.
//
// The validator only reads (`describe_certificate`); the certificate
// resource additionally requests and deletes certificates.
//
// ## Implementations
//
// - ACM: `certval-provider-aws` crate

use crate::model::CertificateDetails;
use async_trait::async_trait;

/// Trait for certificate service implementations
///
/// # Trust Level: Untrusted
///
/// Same rules as [`DnsProvider`](super::DnsProvider): single-shot calls, no
/// retries, no sleeping.
#[async_trait]
pub trait CertificateProvider: Send + Sync {
    /// Read the certificate's status and domain validation options
    ///
    /// # Errors
    ///
    /// - `Error::CertificateNotFound` if the certificate does not exist
    /// - `Error::CertificateProvider` for transient failures
    async fn describe_certificate(&self, arn: &str) -> Result<CertificateDetails, crate::Error>;

    /// Request a DNS-validated certificate and return its ARN
    async fn request_certificate(
        &self,
        domain_name: &str,
        subject_alternative_names: &[String],
    ) -> Result<String, crate::Error>;

    /// Delete a certificate
    ///
    /// # Errors
    ///
    /// - `Error::CertificateNotFound` if the certificate does not exist
    async fn delete_certificate(&self, arn: &str) -> Result<(), crate::Error>;
}
