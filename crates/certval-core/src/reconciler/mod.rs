//! Record reconciliation
//!
//! The reconciler turns two requirement snapshots (current and previous)
//! into DNS changes and applies them.
//!
//! ## Flow
//!
//! ```text
//! current reqs ──► resolve ──► desired records ──┐
//!                                                ├──► plan ──► apply per zone
//! previous reqs ─► resolve ──► previous records ─┘
//! ```
//!
//! Previous records are derived from the previous invocation's properties,
//! never from live DNS: only records this system wrote can be deleted.

mod plan;

pub use plan::{ReconciliationPlan, desired_records};

use crate::error::{Error, Result};
use crate::model::{HostedZone, ManagedRecord, ValidationRequirement, ZoneAssignment};
use crate::resolver::{assign_zones, resolve_zone};
use crate::retry::{Exhausted, RetryPolicy};
use crate::traits::{Clock, DnsProvider};
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Counters for one applied plan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyReport {
    /// Records created or overwritten
    pub upserted: usize,
    /// Records removed
    pub deleted: usize,
    /// Deletions skipped because the record was gone or held another value
    pub already_absent: usize,
}

impl ApplyReport {
    fn merge(&mut self, other: ApplyReport) {
        self.upserted += other.upserted;
        self.deleted += other.deleted;
        self.already_absent += other.already_absent;
    }
}

/// Result of a successful reconciliation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    /// The plan that was applied
    pub plan: ReconciliationPlan,
    /// What applying it did
    pub report: ApplyReport,
    /// The managed record set to track from now on
    pub managed: Vec<ManagedRecord>,
}

/// Computes and applies validation record changes
pub struct RecordReconciler<'a> {
    dns: &'a dyn DnsProvider,
    clock: &'a dyn Clock,
    retry: RetryPolicy,
    ttl: u32,
}

impl<'a> RecordReconciler<'a> {
    /// Create a new reconciler
    pub fn new(dns: &'a dyn DnsProvider, clock: &'a dyn Clock, retry: RetryPolicy, ttl: u32) -> Self {
        Self {
            dns,
            clock,
            retry,
            ttl,
        }
    }

    /// Reconcile DNS so it holds exactly the records for `current`
    ///
    /// # Parameters
    ///
    /// - `current`: requirements of the certificate now
    /// - `previous`: requirements this resource managed before (empty on
    ///   Create)
    /// - `deadline`: no retry is scheduled past this instant
    ///
    /// # Errors
    ///
    /// - `Error::ZoneNotFound` / `Error::AmbiguousZone` for a current
    ///   requirement
    /// - `Error::ConflictingRecord` if a foreign record blocks an upsert
    /// - `Error::RecordSubmission` once retries for a zone are exhausted
    pub async fn reconcile(
        &self,
        current: &[ValidationRequirement],
        previous: &[ValidationRequirement],
        deadline: Option<Instant>,
    ) -> Result<Reconciliation> {
        if current.is_empty() && previous.is_empty() {
            debug!("no current or previous requirements, nothing to reconcile");
            return Ok(Reconciliation {
                plan: ReconciliationPlan::default(),
                report: ApplyReport::default(),
                managed: Vec::new(),
            });
        }

        let zones = self.list_zones(deadline).await?;
        debug!(zones = zones.len(), "loaded hosted zones");

        let current_assignments = assign_zones(current, &zones)?;
        let previous_assignments = self.assign_previous(previous, &zones);

        let desired = desired_records(&current_assignments, self.ttl);
        let tracked = desired_records(&previous_assignments, self.ttl);
        let plan = ReconciliationPlan::compute(&desired, &tracked);

        info!(
            provider = self.dns.provider_name(),
            upserts = plan.to_upsert.len(),
            deletes = plan.to_delete.len(),
            unchanged = plan.unchanged.len(),
            "computed reconciliation plan"
        );

        let report = self.apply(&plan, deadline).await?;
        let managed = plan.desired();

        Ok(Reconciliation {
            plan,
            report,
            managed,
        })
    }

    /// Apply `plan`, zone by zone
    ///
    /// Every zone is attempted even if an earlier one failed; the first
    /// failure (in zone order) is returned afterwards.
    pub async fn apply(
        &self,
        plan: &ReconciliationPlan,
        deadline: Option<Instant>,
    ) -> Result<ApplyReport> {
        let mut report = ApplyReport::default();
        let mut first_error: Option<Error> = None;

        for (zone_id, changes) in plan.by_zone() {
            match self.apply_zone(zone_id, &changes, deadline).await {
                Ok(zone_report) => report.merge(zone_report),
                Err(e) => {
                    error!(zone_id, error = %e, "failed to apply changes to zone");
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(report),
        }
    }

    async fn apply_zone(
        &self,
        zone_id: &str,
        changes: &plan::ZoneChanges<'_>,
        deadline: Option<Instant>,
    ) -> Result<ApplyReport> {
        let mut report = ApplyReport::default();

        for record in &changes.upserts {
            self.retry
                .run(self.clock, deadline, "upsert_record", || {
                    self.dns.upsert_record(zone_id, record)
                })
                .await
                .map_err(|e| submission_error(zone_id, e))?;
            info!(
                zone_id,
                record_name = %record.record_name,
                record_type = %record.record_type,
                value = %record.record_value,
                "upserted validation record"
            );
            report.upserted += 1;
        }

        for record in &changes.deletes {
            let existed = self
                .retry
                .run(self.clock, deadline, "delete_record", || {
                    self.dns.delete_record(zone_id, record)
                })
                .await
                .map_err(|e| submission_error(zone_id, e))?;
            if existed {
                info!(zone_id, record_name = %record.record_name, "deleted validation record");
                report.deleted += 1;
            } else {
                debug!(
                    zone_id,
                    record_name = %record.record_name,
                    "record absent or repointed, left alone"
                );
                report.already_absent += 1;
            }
        }

        Ok(report)
    }

    async fn list_zones(&self, deadline: Option<Instant>) -> Result<Vec<HostedZone>> {
        self.retry
            .run(self.clock, deadline, "list_zones", || self.dns.list_zones())
            .await
            .map_err(|e| e.error)
    }

    /// Resolve previous requirements, skipping those whose zone is gone
    fn assign_previous(
        &self,
        previous: &[ValidationRequirement],
        zones: &[HostedZone],
    ) -> Vec<ZoneAssignment> {
        previous
            .iter()
            .filter_map(|requirement| match resolve_zone(&requirement.domain_name, zones) {
                Ok(zone) => Some(ZoneAssignment {
                    requirement: requirement.clone(),
                    zone: zone.clone(),
                }),
                Err(e) => {
                    warn!(
                        domain = %requirement.domain_name,
                        error = %e,
                        "skipping previously managed record, zone no longer resolvable"
                    );
                    None
                }
            })
            .collect()
    }
}

/// Transient failures become `RecordSubmission`, everything else passes
/// through unchanged
fn submission_error(zone_id: &str, exhausted: Exhausted) -> Error {
    if exhausted.error.is_transient() {
        Error::record_submission(
            zone_id,
            format!("{} (after {} attempts)", exhausted.error, exhausted.attempts),
        )
    } else {
        exhausted.error
    }
}
