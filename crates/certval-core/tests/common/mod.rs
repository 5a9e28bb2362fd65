//! Test doubles and common utilities for contract tests
//!
//! Every double is `Clone` and shares its state through `Arc`, so a test can
//! hand one copy to the code under test and keep another for assertions.

#![allow(dead_code)]

use async_trait::async_trait;
use certval_core::cfn::{Request, Response};
use certval_core::error::{Error, Result};
use certval_core::model::{
    CertificateDetails, CertificateStatus, DomainValidation, HostedZone, ManagedRecord, RecordType,
    ResourceRecord, normalize_name,
};
use certval_core::traits::{CertificateProvider, Clock, DnsProvider, ResponseSender};
use serde_json::{Value, json};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

pub const STACK_ID: &str = "arn:aws:cloudformation:us-east-1:123456789012:stack/web/9b1c";
pub const RESPONSE_URL: &str = "https://cloudformation-custom-resource-response-useast1.s3.amazonaws.com/resp";

/// Build a certificate ARN from a short id
pub fn cert_arn(id: &str) -> String {
    format!("arn:aws:acm:us-east-1:123456789012:certificate/{id}")
}

/// Validation record name ACM would hand out for `domain`
///
/// A wildcard shares the record of its base domain.
pub fn record_name(domain: &str) -> String {
    let base = domain.trim_start_matches("*.");
    format!("_{}.{}.", short_hash(base), base)
}

/// Validation record value ACM would hand out for `domain`
pub fn record_value(domain: &str) -> String {
    format!("_{}.acm-validations.aws.", short_hash(domain.trim_start_matches("*.")))
}

fn short_hash(input: &str) -> String {
    let sum: u32 = input.bytes().map(u32::from).sum();
    format!("{sum:x}")
}

/// Certificate details with a validation record for every domain
pub fn certificate(arn: &str, status: CertificateStatus, domains: &[&str]) -> CertificateDetails {
    CertificateDetails {
        arn: arn.to_string(),
        status,
        domain_validations: domains
            .iter()
            .map(|domain| DomainValidation {
                domain_name: domain.to_string(),
                validation_status: Some("PENDING_VALIDATION".to_string()),
                resource_record: Some(ResourceRecord {
                    name: record_name(domain),
                    record_type: RecordType::Cname,
                    value: record_value(domain),
                }),
            })
            .collect(),
    }
}

/// Certificate details whose validation records are not published yet
pub fn certificate_without_records(arn: &str, domains: &[&str]) -> CertificateDetails {
    let mut details = certificate(arn, CertificateStatus::PendingValidation, domains);
    for dv in &mut details.domain_validations {
        dv.resource_record = None;
        dv.validation_status = None;
    }
    details
}

/// Build a request from JSON fragments
pub fn request(
    request_type: &str,
    resource_type: &str,
    physical_resource_id: Option<&str>,
    properties: Value,
    old_properties: Option<Value>,
) -> Request {
    let mut event = json!({
        "RequestType": request_type,
        "ResponseURL": RESPONSE_URL,
        "StackId": STACK_ID,
        "RequestId": "3d9e6c1a",
        "ResourceType": resource_type,
        "LogicalResourceId": "Resource",
        "ResourceProperties": properties,
    });
    if let Some(id) = physical_resource_id {
        event["PhysicalResourceId"] = json!(id);
    }
    if let Some(old) = old_properties {
        event["OldResourceProperties"] = old;
    }
    Request::from_value(event).expect("test request parses")
}

/// Virtual clock: `sleep` advances time instantly and is recorded
#[derive(Clone)]
pub struct VirtualClock {
    origin: Instant,
    offset: Arc<Mutex<Duration>>,
    sleeps: Arc<Mutex<Vec<Duration>>>,
}

impl VirtualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Arc::new(Mutex::new(Duration::ZERO)),
            sleeps: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Every sleep requested so far
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }

    /// Total virtual time elapsed
    pub fn elapsed(&self) -> Duration {
        *self.offset.lock().unwrap()
    }
}

#[async_trait]
impl Clock for VirtualClock {
    fn now(&self) -> Instant {
        self.origin + *self.offset.lock().unwrap()
    }

    async fn sleep(&self, duration: Duration) {
        *self.offset.lock().unwrap() += duration;
        self.sleeps.lock().unwrap().push(duration);
    }
}

/// In-memory DNS with call counters and failure injection
#[derive(Clone)]
pub struct InMemoryDns {
    zones: Arc<Mutex<Vec<HostedZone>>>,
    /// Keyed by (zone id, normalized record name)
    records: Arc<Mutex<BTreeMap<(String, String), ManagedRecord>>>,
    transient_failures: Arc<Mutex<HashMap<String, usize>>>,
    broken_zones: Arc<Mutex<HashSet<String>>>,
    list_calls: Arc<AtomicUsize>,
    upsert_calls: Arc<AtomicUsize>,
    delete_calls: Arc<AtomicUsize>,
}

impl InMemoryDns {
    pub fn new(zones: &[(&str, &str)]) -> Self {
        Self {
            zones: Arc::new(Mutex::new(
                zones.iter().map(|(id, name)| HostedZone::new(*id, *name)).collect(),
            )),
            records: Arc::new(Mutex::new(BTreeMap::new())),
            transient_failures: Arc::new(Mutex::new(HashMap::new())),
            broken_zones: Arc::new(Mutex::new(HashSet::new())),
            list_calls: Arc::new(AtomicUsize::new(0)),
            upsert_calls: Arc::new(AtomicUsize::new(0)),
            delete_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Fail the next `count` writes to `zone_id` with a transient error
    pub fn fail_next_writes(&self, zone_id: &str, count: usize) {
        self.transient_failures
            .lock()
            .unwrap()
            .insert(zone_id.to_string(), count);
    }

    /// Fail every write to `zone_id` with a transient error
    pub fn break_zone(&self, zone_id: &str) {
        self.broken_zones.lock().unwrap().insert(zone_id.to_string());
    }

    /// Place a record this system does not own
    pub fn seed(&self, zone_id: &str, name: &str, record_type: &str, value: &str) {
        let record = ManagedRecord {
            hosted_zone_id: zone_id.to_string(),
            record_name: normalize_name(name),
            record_type: RecordType::parse(record_type),
            record_value: value.to_string(),
            ttl: 300,
        };
        self.records
            .lock()
            .unwrap()
            .insert((zone_id.to_string(), normalize_name(name)), record);
    }

    pub fn record(&self, zone_id: &str, name: &str) -> Option<ManagedRecord> {
        self.records
            .lock()
            .unwrap()
            .get(&(zone_id.to_string(), normalize_name(name)))
            .cloned()
    }

    pub fn records(&self) -> Vec<ManagedRecord> {
        self.records.lock().unwrap().values().cloned().collect()
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn upsert_calls(&self) -> usize {
        self.upsert_calls.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    fn injected_failure(&self, zone_id: &str) -> Result<()> {
        if self.broken_zones.lock().unwrap().contains(zone_id) {
            return Err(Error::dns_provider(format!("zone {zone_id} unavailable")));
        }
        let mut failures = self.transient_failures.lock().unwrap();
        if let Some(remaining) = failures.get_mut(zone_id)
            && *remaining > 0
        {
            *remaining -= 1;
            return Err(Error::dns_provider("Throttling: Rate exceeded"));
        }
        Ok(())
    }
}

#[async_trait]
impl DnsProvider for InMemoryDns {
    async fn list_zones(&self) -> Result<Vec<HostedZone>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.zones.lock().unwrap().clone())
    }

    async fn upsert_record(&self, zone_id: &str, record: &ManagedRecord) -> Result<()> {
        self.upsert_calls.fetch_add(1, Ordering::SeqCst);
        self.injected_failure(zone_id)?;

        let key = (zone_id.to_string(), normalize_name(&record.record_name));
        let mut records = self.records.lock().unwrap();
        if let Some(existing) = records.get(&key)
            && existing.record_type != record.record_type
        {
            return Err(Error::ConflictingRecord {
                zone_id: zone_id.to_string(),
                record_name: record.record_name.clone(),
                record_type: record.record_type.to_string(),
                existing_type: existing.record_type.to_string(),
            });
        }
        records.insert(key, record.clone());
        Ok(())
    }

    async fn delete_record(&self, zone_id: &str, record: &ManagedRecord) -> Result<bool> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        self.injected_failure(zone_id)?;

        let key = (zone_id.to_string(), normalize_name(&record.record_name));
        let mut records = self.records.lock().unwrap();
        match records.get(&key) {
            Some(existing)
                if existing.record_type == record.record_type
                    && normalize_name(&existing.record_value)
                        == normalize_name(&record.record_value) =>
            {
                records.remove(&key);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn provider_name(&self) -> &'static str {
        "in-memory"
    }
}

/// Certificate service replaying a per-ARN script of describe results
///
/// The last scripted snapshot repeats forever. Unknown ARNs are
/// `CertificateNotFound`.
#[derive(Clone)]
pub struct ScriptedCertificates {
    scripts: Arc<Mutex<HashMap<String, VecDeque<CertificateDetails>>>>,
    describe_failures: Arc<Mutex<usize>>,
    next_arn: Arc<Mutex<String>>,
    requested: Arc<Mutex<Vec<(String, Vec<String>)>>>,
    deleted: Arc<Mutex<Vec<String>>>,
    describe_calls: Arc<AtomicUsize>,
}

impl ScriptedCertificates {
    pub fn new() -> Self {
        Self {
            scripts: Arc::new(Mutex::new(HashMap::new())),
            describe_failures: Arc::new(Mutex::new(0)),
            next_arn: Arc::new(Mutex::new(cert_arn("requested"))),
            requested: Arc::new(Mutex::new(Vec::new())),
            deleted: Arc::new(Mutex::new(Vec::new())),
            describe_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Script the describe results for `arn`
    pub fn script(&self, arn: &str, snapshots: Vec<CertificateDetails>) {
        self.scripts
            .lock()
            .unwrap()
            .insert(arn.to_string(), snapshots.into());
    }

    /// Fail the next `count` describe calls with a transient error
    pub fn fail_next_describes(&self, count: usize) {
        *self.describe_failures.lock().unwrap() = count;
    }

    /// ARN returned by the next `request_certificate`
    pub fn set_next_arn(&self, arn: &str) {
        *self.next_arn.lock().unwrap() = arn.to_string();
    }

    pub fn requested(&self) -> Vec<(String, Vec<String>)> {
        self.requested.lock().unwrap().clone()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn describe_calls(&self) -> usize {
        self.describe_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CertificateProvider for ScriptedCertificates {
    async fn describe_certificate(&self, arn: &str) -> Result<CertificateDetails> {
        self.describe_calls.fetch_add(1, Ordering::SeqCst);
        {
            let mut failures = self.describe_failures.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(Error::certificate_provider("ThrottlingException"));
            }
        }

        let mut scripts = self.scripts.lock().unwrap();
        let script = scripts
            .get_mut(arn)
            .ok_or_else(|| Error::CertificateNotFound(arn.to_string()))?;
        let snapshot = if script.len() > 1 {
            script.pop_front()
        } else {
            script.front().cloned()
        };
        snapshot.ok_or_else(|| Error::CertificateNotFound(arn.to_string()))
    }

    async fn request_certificate(
        &self,
        domain_name: &str,
        subject_alternative_names: &[String],
    ) -> Result<String> {
        self.requested
            .lock()
            .unwrap()
            .push((domain_name.to_string(), subject_alternative_names.to_vec()));
        Ok(self.next_arn.lock().unwrap().clone())
    }

    async fn delete_certificate(&self, arn: &str) -> Result<()> {
        if self.scripts.lock().unwrap().remove(arn).is_none() {
            return Err(Error::CertificateNotFound(arn.to_string()));
        }
        self.deleted.lock().unwrap().push(arn.to_string());
        Ok(())
    }
}

/// Response sender that keeps every response in memory
#[derive(Clone, Default)]
pub struct CapturingSender {
    sent: Arc<Mutex<Vec<(String, Response)>>>,
    fail: Arc<Mutex<bool>>,
}

impl CapturingSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every send fail after recording it
    pub fn fail_sends(&self) {
        *self.fail.lock().unwrap() = true;
    }

    pub fn sent(&self) -> Vec<(String, Response)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl ResponseSender for CapturingSender {
    async fn send(&self, response_url: &str, response: &Response) -> Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((response_url.to_string(), response.clone()));
        if *self.fail.lock().unwrap() {
            return Err(Error::http("403 Forbidden"));
        }
        Ok(())
    }
}
