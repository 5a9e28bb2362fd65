//! Route 53 implementation of [`DnsProvider`]
//!
//! ## API Calls
//!
//! - `list_zones`: `ListHostedZones`, paginated by marker
//! - `upsert_record`: `ListResourceRecordSets` (conflict check) then
//!   `ChangeResourceRecordSets` with `UPSERT`
//! - `delete_record`: `ListResourceRecordSets` (existence and value check)
//!   then `ChangeResourceRecordSets` with `DELETE` of the live record set
//!
//! Route 53 only deletes a record set when the request matches it exactly
//! (TTL and values), so deletes replay the live set instead of ours. A live
//! set pointing somewhere else is left alone.

use async_trait::async_trait;
use aws_sdk_route53::Client;
use aws_sdk_route53::error::{DisplayErrorContext, SdkError};
use aws_sdk_route53::operation::change_resource_record_sets::ChangeResourceRecordSetsError;
use aws_sdk_route53::types::{
    Change, ChangeAction, ChangeBatch, ResourceRecord, ResourceRecordSet, RrType,
};
use certval_core::model::{HostedZone, ManagedRecord, normalize_name};
use certval_core::traits::DnsProvider;
use certval_core::{Error, Result};
use tracing::{debug, info, warn};

const HOSTED_ZONE_PREFIX: &str = "/hostedzone/";

/// Record sets fetched around the target name when checking for conflicts
const LOOKUP_PAGE_SIZE: i32 = 10;

/// Route 53 DNS provider
///
/// # Trust Level: Untrusted
///
/// Single-shot: no retries, no sleeping. Throttling and network errors come
/// back as transient `Error::DnsProvider` for the reconciler to retry.
#[derive(Debug, Clone)]
pub struct Route53Provider {
    client: Client,
}

impl Route53Provider {
    /// Create a provider from a shared SDK configuration
    pub fn new(config: &aws_config::SdkConfig) -> Self {
        Self {
            client: Client::new(config),
        }
    }

    /// Live record sets named exactly `name`
    async fn record_sets_at(&self, zone_id: &str, name: &str) -> Result<Vec<ResourceRecordSet>> {
        let output = self
            .client
            .list_resource_record_sets()
            .hosted_zone_id(zone_id)
            .start_record_name(name)
            .max_items(LOOKUP_PAGE_SIZE)
            .send()
            .await
            .map_err(|e| {
                Error::dns_provider(format!(
                    "ListResourceRecordSets failed for zone {zone_id}: {}",
                    DisplayErrorContext(&e)
                ))
            })?;

        let target = normalize_name(name);
        Ok(output
            .resource_record_sets()
            .iter()
            .filter(|set| names_match(set.name(), &target))
            .cloned()
            .collect())
    }

    async fn submit(&self, zone_id: &str, change: Change, comment: &str) -> Result<()> {
        let batch = ChangeBatch::builder()
            .comment(comment)
            .changes(change)
            .build()
            .map_err(|e| Error::dns_rejected(e.to_string()))?;

        let output = self
            .client
            .change_resource_record_sets()
            .hosted_zone_id(zone_id)
            .change_batch(batch)
            .send()
            .await
            .map_err(|e| change_error(zone_id, e))?;

        if let Some(info) = output.change_info() {
            debug!(zone_id, change_id = info.id(), status = info.status().as_str(), "change submitted");
        }
        Ok(())
    }
}

#[async_trait]
impl DnsProvider for Route53Provider {
    async fn list_zones(&self) -> Result<Vec<HostedZone>> {
        let mut zones = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let output = self
                .client
                .list_hosted_zones()
                .set_marker(marker.take())
                .send()
                .await
                .map_err(|e| {
                    Error::dns_provider(format!("ListHostedZones failed: {}", DisplayErrorContext(&e)))
                })?;

            for zone in output.hosted_zones() {
                let private = zone.config().is_some_and(|c| c.private_zone());
                if let Some(zone) = public_zone(zone.id(), zone.name(), private) {
                    zones.push(zone);
                }
            }

            match output.next_marker() {
                Some(next) if output.is_truncated() => marker = Some(next.to_string()),
                _ => break,
            }
        }

        debug!(zones = zones.len(), "listed public hosted zones");
        Ok(zones)
    }

    async fn upsert_record(&self, zone_id: &str, record: &ManagedRecord) -> Result<()> {
        let existing = self.record_sets_at(zone_id, &record.record_name).await?;
        let existing_types: Vec<&str> = existing.iter().map(|set| set.r#type().as_str()).collect();
        if let Some(conflict) = conflicting_type(&existing_types, record.record_type.as_str()) {
            return Err(Error::ConflictingRecord {
                zone_id: zone_id.to_string(),
                record_name: record.record_name.clone(),
                record_type: record.record_type.to_string(),
                existing_type: conflict.to_string(),
            });
        }

        let set = ResourceRecordSet::builder()
            .name(&record.record_name)
            .r#type(RrType::from(record.record_type.as_str()))
            .ttl(i64::from(record.ttl))
            .resource_records(
                ResourceRecord::builder()
                    .value(&record.record_value)
                    .build()
                    .map_err(|e| Error::dns_rejected(e.to_string()))?,
            )
            .build()
            .map_err(|e| Error::dns_rejected(e.to_string()))?;
        let change = Change::builder()
            .action(ChangeAction::Upsert)
            .resource_record_set(set)
            .build()
            .map_err(|e| Error::dns_rejected(e.to_string()))?;

        self.submit(zone_id, change, "certval: ACM DNS validation")
            .await
            .map_err(|e| match e {
                Error::DnsRejected(message) if is_conflict_message(&message) => {
                    Error::ConflictingRecord {
                        zone_id: zone_id.to_string(),
                        record_name: record.record_name.clone(),
                        record_type: record.record_type.to_string(),
                        existing_type: "unknown".to_string(),
                    }
                }
                other => other,
            })?;

        info!(zone_id, record_name = %record.record_name, "UPSERT submitted");
        Ok(())
    }

    async fn delete_record(&self, zone_id: &str, record: &ManagedRecord) -> Result<bool> {
        let live = self
            .record_sets_at(zone_id, &record.record_name)
            .await?
            .into_iter()
            .find(|set| set.r#type().as_str() == record.record_type.as_str());

        let Some(live) = live else {
            debug!(zone_id, record_name = %record.record_name, "nothing to delete");
            return Ok(false);
        };

        {
            let live_values: Vec<&str> = live.resource_records().iter().map(|r| r.value()).collect();
            if !holds_only(&live_values, &record.record_value) {
                warn!(
                    zone_id,
                    record_name = %record.record_name,
                    live_values = ?live_values,
                    "record now holds another value, not deleting"
                );
                return Ok(false);
            }
        }

        let change = Change::builder()
            .action(ChangeAction::Delete)
            .resource_record_set(live)
            .build()
            .map_err(|e| Error::dns_rejected(e.to_string()))?;

        match self.submit(zone_id, change, "certval: ACM DNS validation cleanup").await {
            Ok(()) => Ok(true),
            // deleted between the lookup and the change
            Err(Error::DnsRejected(message)) if is_not_found_message(&message) => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn provider_name(&self) -> &'static str {
        "route53"
    }
}

/// Map a `ChangeResourceRecordSets` failure onto the core error kinds
fn change_error(zone_id: &str, err: SdkError<ChangeResourceRecordSetsError>) -> Error {
    let context = DisplayErrorContext(&err).to_string();
    match err.as_service_error() {
        Some(ChangeResourceRecordSetsError::InvalidChangeBatch(e)) => {
            Error::dns_rejected(e.message().map(str::to_string).unwrap_or(context))
        }
        Some(ChangeResourceRecordSetsError::NoSuchHostedZone(_))
        | Some(ChangeResourceRecordSetsError::InvalidInput(_)) => {
            Error::dns_rejected(format!("zone {zone_id}: {context}"))
        }
        // PriorRequestNotComplete, throttling, timeouts and dispatch errors
        _ => Error::dns_provider(format!("zone {zone_id}: {context}")),
    }
}

/// Convert a listed zone, dropping private ones
fn public_zone(id: &str, name: &str, private: bool) -> Option<HostedZone> {
    if private {
        return None;
    }
    let id = id.strip_prefix(HOSTED_ZONE_PREFIX).unwrap_or(id);
    Some(HostedZone::new(id, name))
}

/// Route 53 escapes `*` as `\052` in listed names
fn names_match(listed: &str, target_normalized: &str) -> bool {
    normalize_name(&listed.replace("\\052", "*")) == target_normalized
}

/// Whether a live record set carries exactly our value
fn holds_only(live_values: &[&str], ours: &str) -> bool {
    let ours = normalize_name(ours);
    !live_values.is_empty() && live_values.iter().all(|value| normalize_name(value) == ours)
}

fn conflicting_type<'a>(existing: &[&'a str], wanted: &str) -> Option<&'a str> {
    existing
        .iter()
        .copied()
        .find(|existing| !existing.eq_ignore_ascii_case(wanted))
}

fn is_not_found_message(message: &str) -> bool {
    message.contains("not found")
}

fn is_conflict_message(message: &str) -> bool {
    message.contains("conflicting RRSet") || message.contains("conflicts with other records")
}
