//! `Custom::Certificate`: requests a certificate and returns immediately
//!
//! Unlike `AWS::CertificateManager::Certificate` this resource reports
//! success as soon as the request is accepted, leaving validation to a
//! `Custom::CertificateValidator`.

use super::CustomResource;
use crate::cfn::{CERTIFICATE_RESOURCE_TYPE, Request, Response, is_valid_certificate_arn};
use crate::error::{Error, Result};
use crate::traits::CertificateProvider;
use async_trait::async_trait;
use std::time::Instant;
use tracing::info;

/// The `Custom::Certificate` resource
pub struct CertificateResource {
    certificates: Box<dyn CertificateProvider>,
}

impl CertificateResource {
    pub fn new(certificates: Box<dyn CertificateProvider>) -> Self {
        Self { certificates }
    }
}

#[async_trait]
impl CustomResource for CertificateResource {
    async fn create(
        &self,
        request: &Request,
        response: &mut Response,
        _deadline: Instant,
    ) -> Result<()> {
        let properties = &request.resource_properties;
        let domain_name = properties
            .domain_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .ok_or_else(|| Error::schema("DomainName is required."))?;
        let sans = &properties.subject_alternative_names;

        info!(domain_name, sans = %sans.join(", "), "requesting certificate");
        let arn = self
            .certificates
            .request_certificate(domain_name, sans)
            .await?;

        // the certificate ARN doubles as the physical id
        response.physical_resource_id = arn.clone();
        response.set_data("CertificateArn", arn);
        Ok(())
    }

    /// A new certificate means a new physical id; CloudFormation then
    /// deletes the old one
    async fn update(
        &self,
        request: &Request,
        response: &mut Response,
        deadline: Instant,
    ) -> Result<()> {
        self.create(request, response, deadline).await
    }

    async fn delete(
        &self,
        request: &Request,
        response: &mut Response,
        _deadline: Instant,
    ) -> Result<()> {
        let arn = request.physical_resource_id();
        if arn.is_empty() {
            response.succeed("Certificate does not exist.");
            return Ok(());
        }
        if !is_valid_certificate_arn(arn) {
            return Err(Error::schema("Certificate ARN is invalid."));
        }

        match self.certificates.delete_certificate(arn).await {
            Ok(()) => {
                info!(arn, "certificate deleted");
                Ok(())
            }
            Err(Error::CertificateNotFound(_)) => {
                response.succeed("Certificate not found.");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn resource_type(&self) -> &'static str {
        CERTIFICATE_RESOURCE_TYPE
    }
}
