//! Lifecycle orchestrator for `Custom::CertificateValidator`
//!
//! Sequences requirement discovery, record reconciliation and the issuance
//! wait for each CloudFormation event.
//!
//! ## Event Flow
//!
//! 1. Create: wait for ACM to publish records → reconcile against nothing →
//!    wait for issuance
//! 2. Update: same, reconciling against the records of the old certificate
//! 3. Delete: reconcile nothing against the current certificate's records
//!
//! The previous record set is never stored anywhere: it is recomputed from
//! the certificate named in the old properties, which CloudFormation keeps
//! until an Update succeeds.

use super::CustomResource;
use crate::cfn::{Request, Response, VALIDATOR_RESOURCE_TYPE, require_certificate_arn};
use crate::config::ValidatorConfig;
use crate::error::{Error, Result};
use crate::model::ValidationRequirement;
use crate::reconciler::{Reconciliation, RecordReconciler};
use crate::traits::{CertificateProvider, Clock, DnsProvider};
use crate::waiter::IssuanceWaiter;
use async_trait::async_trait;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Prefix of the physical resource id generated on Create
pub const PHYSICAL_ID_PREFIX: &str = "certval-";

/// The `Custom::CertificateValidator` resource
pub struct CertificateValidator {
    certificates: Box<dyn CertificateProvider>,
    dns: Box<dyn DnsProvider>,
    clock: Box<dyn Clock>,
    config: ValidatorConfig,
}

impl CertificateValidator {
    /// Create a new validator
    pub fn new(
        certificates: Box<dyn CertificateProvider>,
        dns: Box<dyn DnsProvider>,
        clock: Box<dyn Clock>,
        config: ValidatorConfig,
    ) -> Self {
        Self {
            certificates,
            dns,
            clock,
            config,
        }
    }

    fn reconciler(&self) -> RecordReconciler<'_> {
        RecordReconciler::new(
            self.dns.as_ref(),
            self.clock.as_ref(),
            self.config.submission_retry(),
            self.config.record_ttl,
        )
    }

    fn waiter(&self) -> IssuanceWaiter<'_> {
        IssuanceWaiter::new(
            self.certificates.as_ref(),
            self.clock.as_ref(),
            self.config.poll_interval(),
            self.config.status_retry(),
        )
    }

    /// Requirements of a certificate this resource managed before
    ///
    /// A certificate that no longer exists has no records left to manage.
    async fn tracked_requirements(
        &self,
        arn: &str,
        deadline: Instant,
    ) -> Result<Vec<ValidationRequirement>> {
        match self.waiter().describe(arn, deadline).await {
            Ok(details) => Ok(details.requirements()),
            Err(Error::CertificateNotFound(_)) => {
                warn!(arn, "previous certificate no longer exists, nothing to clean up");
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }

    /// Publish the records for `arn`, retire `previous`, wait for issuance
    async fn provision(
        &self,
        arn: &str,
        previous: &[ValidationRequirement],
        deadline: Instant,
    ) -> Result<Reconciliation> {
        let waiter = self.waiter();

        let details = waiter
            .wait_for_requirements(
                arn,
                Duration::from_secs(self.config.requirements_poll_interval_secs),
                Duration::from_secs(self.config.requirements_timeout_secs),
                deadline,
            )
            .await?;
        let current = details.requirements();
        info!(
            arn,
            current = current.len(),
            previous = previous.len(),
            "reconciling validation records"
        );

        let reconciliation = self
            .reconciler()
            .reconcile(&current, previous, Some(deadline))
            .await?;

        waiter.wait(arn, deadline).await?;
        Ok(reconciliation)
    }
}

#[async_trait]
impl CustomResource for CertificateValidator {
    async fn create(
        &self,
        request: &Request,
        response: &mut Response,
        deadline: Instant,
    ) -> Result<()> {
        response.physical_resource_id = format!("{PHYSICAL_ID_PREFIX}{}", request.request_id);

        let arn = require_certificate_arn(request.resource_properties.certificate_arn.as_deref())?;
        let reconciliation = self.provision(arn, &[], deadline).await?;

        info!(
            arn,
            records = reconciliation.managed.len(),
            upserted = reconciliation.report.upserted,
            "validation records created"
        );
        Ok(())
    }

    async fn update(
        &self,
        request: &Request,
        _response: &mut Response,
        deadline: Instant,
    ) -> Result<()> {
        let arn = require_certificate_arn(request.resource_properties.certificate_arn.as_deref())?;

        let old_arn = request
            .old_resource_properties
            .as_ref()
            .and_then(|old| old.certificate_arn.as_deref());
        let previous = match old_arn {
            Some(old_arn) if require_certificate_arn(Some(old_arn)).is_ok() => {
                self.tracked_requirements(old_arn, deadline).await?
            }
            Some(old_arn) => {
                warn!(old_arn, "previous certificate ARN is invalid, no records to clean up");
                Vec::new()
            }
            None => Vec::new(),
        };

        let reconciliation = self.provision(arn, &previous, deadline).await?;

        info!(
            arn,
            old_arn = old_arn.unwrap_or_default(),
            upserted = reconciliation.report.upserted,
            deleted = reconciliation.report.deleted,
            "validation records updated"
        );
        Ok(())
    }

    async fn delete(
        &self,
        request: &Request,
        response: &mut Response,
        deadline: Instant,
    ) -> Result<()> {
        // a Create that failed on a missing ARN is rolled back with the same properties
        let arn = match request.resource_properties.certificate_arn.as_deref() {
            None | Some("") => {
                info!("no certificate ARN, nothing to delete");
                response.succeed("Certificate does not exist.");
                return Ok(());
            }
            arn => require_certificate_arn(arn)?,
        };

        let previous = match self.waiter().describe(arn, deadline).await {
            Ok(details) => details.requirements(),
            Err(Error::CertificateNotFound(_)) => {
                info!(arn, "certificate already gone");
                response.succeed("Certificate not found.");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let reconciliation = self
            .reconciler()
            .reconcile(&[], &previous, Some(deadline))
            .await?;

        info!(
            arn,
            deleted = reconciliation.report.deleted,
            already_absent = reconciliation.report.already_absent,
            "validation records removed"
        );
        Ok(())
    }

    fn resource_type(&self) -> &'static str {
        VALIDATOR_RESOURCE_TYPE
    }
}
