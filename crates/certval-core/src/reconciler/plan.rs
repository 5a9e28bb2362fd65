//! Diff between desired and previously managed validation records

use crate::model::{ManagedRecord, RecordKey, ZoneAssignment, normalize_name};
use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

/// Changes needed to move DNS from the previous managed set to the desired one
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciliationPlan {
    /// Records to create or overwrite
    pub to_upsert: Vec<ManagedRecord>,
    /// Previously managed records no longer wanted
    pub to_delete: Vec<ManagedRecord>,
    /// Desired records already in place
    pub unchanged: Vec<ManagedRecord>,
}

/// Changes for a single hosted zone
#[derive(Debug, Default)]
pub(crate) struct ZoneChanges<'a> {
    pub upserts: Vec<&'a ManagedRecord>,
    pub deletes: Vec<&'a ManagedRecord>,
}

/// Build the deduplicated record set for a list of assignments
///
/// An apex domain and its wildcard share one validation record, so several
/// requirements can collapse into a single entry. Output is sorted by
/// [`RecordKey`].
pub fn desired_records(assignments: &[ZoneAssignment], ttl: u32) -> Vec<ManagedRecord> {
    let mut records: BTreeMap<RecordKey, ManagedRecord> = BTreeMap::new();

    for assignment in assignments {
        let record = ManagedRecord::from_assignment(assignment, ttl);
        match records.get(&record.key()) {
            None => {
                records.insert(record.key(), record);
            }
            Some(existing) if !same_value(&existing.record_value, &record.record_value) => {
                warn!(
                    record_name = %record.record_name,
                    kept = %existing.record_value,
                    ignored = %record.record_value,
                    "two requirements want different values for the same record"
                );
            }
            Some(_) => {}
        }
    }

    records.into_values().collect()
}

fn same_value(a: &str, b: &str) -> bool {
    normalize_name(a) == normalize_name(b)
}

impl ReconciliationPlan {
    /// Diff `desired` against `previous`
    ///
    /// - desired only → upsert
    /// - previous only → delete
    /// - both, same value → unchanged
    /// - both, different value → upsert (overwrites in place)
    pub fn compute(desired: &[ManagedRecord], previous: &[ManagedRecord]) -> Self {
        let previous_by_key: BTreeMap<RecordKey, &ManagedRecord> =
            previous.iter().map(|r| (r.key(), r)).collect();
        let desired_keys: BTreeSet<RecordKey> = desired.iter().map(ManagedRecord::key).collect();

        let mut plan = ReconciliationPlan::default();

        for record in desired {
            match previous_by_key.get(&record.key()) {
                Some(old) if same_value(&old.record_value, &record.record_value) => {
                    plan.unchanged.push(record.clone());
                }
                _ => plan.to_upsert.push(record.clone()),
            }
        }

        let mut seen = BTreeSet::new();
        for (key, record) in &previous_by_key {
            if !desired_keys.contains(key) && seen.insert(key.clone()) {
                plan.to_delete.push((*record).clone());
            }
        }

        plan
    }

    /// Whether applying the plan would touch DNS at all
    pub fn is_empty(&self) -> bool {
        self.to_upsert.is_empty() && self.to_delete.is_empty()
    }

    /// The managed set after the plan has been applied
    pub fn desired(&self) -> Vec<ManagedRecord> {
        let mut records: Vec<ManagedRecord> = self
            .to_upsert
            .iter()
            .chain(self.unchanged.iter())
            .cloned()
            .collect();
        records.sort_by_key(ManagedRecord::key);
        records
    }

    /// Group changes by hosted zone, zones in sorted order
    pub(crate) fn by_zone(&self) -> BTreeMap<&str, ZoneChanges<'_>> {
        let mut zones: BTreeMap<&str, ZoneChanges<'_>> = BTreeMap::new();
        for record in &self.to_upsert {
            zones
                .entry(record.hosted_zone_id.as_str())
                .or_default()
                .upserts
                .push(record);
        }
        for record in &self.to_delete {
            zones
                .entry(record.hosted_zone_id.as_str())
                .or_default()
                .deletes
                .push(record);
        }
        zones
    }
}
