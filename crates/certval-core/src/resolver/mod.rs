//! Zone resolution
//!
//! Maps a validated domain to the hosted zone that owns its validation
//! record. The most specific zone wins: among all zones whose name is the
//! domain itself or one of its parents, the one with the most labels.
//!
//! ```text
//! zones:  example.com.   dev.example.com.
//! domain: app.dev.example.com  ──►  dev.example.com.
//! domain: *.example.com        ──►  example.com.
//! ```

use crate::error::{Error, Result};
use crate::model::{HostedZone, ValidationRequirement, ZoneAssignment, normalize_name};
use tracing::debug;

/// Strip a leading wildcard label and normalize
fn base_domain(domain: &str) -> String {
    let normalized = normalize_name(domain);
    match normalized.strip_prefix("*.") {
        Some(base) => base.to_string(),
        None => normalized,
    }
}

/// `domain` equals `zone` or sits below it (both normalized)
fn is_within(domain: &str, zone: &str) -> bool {
    domain == zone
        || domain
            .strip_suffix(zone)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

fn label_count(name: &str) -> usize {
    name.split('.').filter(|label| !label.is_empty()).count()
}

/// Resolve the hosted zone for `domain`
///
/// # Errors
///
/// - `Error::ZoneNotFound` if no zone contains the domain
/// - `Error::AmbiguousZone` if the best match is shared by several zones
pub fn resolve_zone<'a>(domain: &str, zones: &'a [HostedZone]) -> Result<&'a HostedZone> {
    let target = base_domain(domain);

    let mut best: Vec<&HostedZone> = Vec::new();
    let mut best_labels = 0;

    for zone in zones {
        let zone_name = normalize_name(&zone.dns_name);
        if !is_within(&target, &zone_name) {
            continue;
        }
        let labels = label_count(&zone_name);
        if best.is_empty() || labels > best_labels {
            best.clear();
            best.push(zone);
            best_labels = labels;
        } else if labels == best_labels {
            best.push(zone);
        }
    }

    match best.as_slice() {
        [] => Err(Error::zone_not_found(domain)),
        [zone] => {
            debug!(domain, zone_id = %zone.id, zone_name = %zone.dns_name, "resolved hosted zone");
            Ok(zone)
        }
        [first, ..] => Err(Error::AmbiguousZone {
            domain: domain.to_string(),
            zone_name: normalize_name(&first.dns_name),
            zone_ids: best.iter().map(|z| z.id.clone()).collect(),
        }),
    }
}

/// Resolve every requirement
///
/// Fails on the first requirement without a zone.
pub fn assign_zones(
    requirements: &[ValidationRequirement],
    zones: &[HostedZone],
) -> Result<Vec<ZoneAssignment>> {
    requirements
        .iter()
        .map(|requirement| {
            resolve_zone(&requirement.domain_name, zones).map(|zone| ZoneAssignment {
                requirement: requirement.clone(),
                zone: zone.clone(),
            })
        })
        .collect()
}
