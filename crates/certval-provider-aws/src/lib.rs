// # AWS Providers
//
// This crate provides the AWS implementations of the certval provider traits:
// ACM for certificates and Route 53 for DNS.
//
// ## Implementation Status
//
// - ✅ One API call per trait operation (plus one lookup for record writes)
// - ✅ Errors classified as transient or permanent for the core retry policy
// - ✅ Public hosted zones only, listed with pagination
// - ✅ Conflicting record sets detected before any write
// - ✅ Deleting an absent record reports "already absent", never an error
// - ❌ NO retry logic (owned by the reconciler and the issuance waiter)
// - ❌ NO sleeping or polling (owned by the issuance waiter)
// - ❌ NO caching of zones or certificates between calls
//
// ## Trust Level: Untrusted (Providers)
//
// **Allowed Capabilities**:
// - ✅ Call the ACM and Route 53 APIs
// - ✅ Translate SDK types into `certval_core::model` types
//
// **Forbidden Capabilities**:
// - ❌ Spawn tasks or threads
// - ❌ Retry, back off or sleep
// - ❌ Decide which records should exist
//
// ## Credentials
//
// Both clients use the default AWS credential chain (the Lambda execution
// role in production). Nothing here reads or logs credentials.

pub mod acm;
pub mod route53;

pub use acm::AcmProvider;
pub use route53::Route53Provider;
