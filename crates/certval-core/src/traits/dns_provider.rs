// # DNS Provider Trait
//
// Defines the interface for reading hosted zones and writing validation
// records.
//
// ## Implementations
//
// - Route 53: `certval-provider-aws` crate
//
// ## Usage
//
// ```rust,ignore
// use certval_core::DnsProvider;
//
// let zones = provider.list_zones().await?;
// provider.upsert_record(&zones[0].id, &record).await?;
// let existed = provider.delete_record(&zones[0].id, &record).await?;
// ```

use crate::model::{HostedZone, ManagedRecord};
use async_trait::async_trait;

/// Trait for DNS provider implementations
///
/// # Trust Level: Untrusted
///
/// Providers execute exactly one logical API operation per call.
///
/// ## Allowed Capabilities
/// - ✅ Perform API calls to their own endpoints
/// - ✅ Return success or failure (the reconciler handles retry)
///
/// ## Forbidden Capabilities
/// - ❌ Implement retry logic or backoff (owned by `RecordReconciler`)
/// - ❌ Decide which records should exist (owned by `RecordReconciler`)
/// - ❌ Overwrite a record of a different type at the target name
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// List every hosted zone that may own a validation record
    ///
    /// Implementations return public zones only, with provider prefixes
    /// stripped from the ids.
    async fn list_zones(&self) -> Result<Vec<HostedZone>, crate::Error>;

    /// Create or overwrite `record` in `zone_id`
    ///
    /// # Idempotency
    ///
    /// Scoped to (zone, name, type) and never conditioned on the record
    /// being absent: writing an already-correct record succeeds.
    ///
    /// # Errors
    ///
    /// - `Error::ConflictingRecord` if a record of another type exists at
    ///   the same name
    /// - any transient error for the reconciler to retry
    async fn upsert_record(&self, zone_id: &str, record: &ManagedRecord)
    -> Result<(), crate::Error>;

    /// Delete `record` from `zone_id`
    ///
    /// # Returns
    ///
    /// - `Ok(true)`: the record existed and was removed
    /// - `Ok(false)`: the record was already absent, or the live record at
    ///   (zone, name, type) holds a value other than `record.record_value`
    ///   and was left in place
    async fn delete_record(&self, zone_id: &str, record: &ManagedRecord)
    -> Result<bool, crate::Error>;

    /// Get the provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;
}
