// # certval-core
//
// Core library for DNS validation of ACM certificates through CloudFormation
// custom resources.
//
// ## Architecture Overview
//
// - **CertificateProvider**: Trait for reading, requesting and deleting certificates
// - **DnsProvider**: Trait for listing hosted zones and writing validation records
// - **Zone resolver**: Pure longest-suffix match of a domain to its hosted zone
// - **RecordReconciler**: Diffs desired against previously managed records and applies the diff per zone
// - **IssuanceWaiter**: Deadline-aware poll loop for certificate issuance
// - **CertificateValidator**: Orchestrates the above for Create, Update and Delete
// - **CertificateResource**: Requests certificates without waiting for validation
//
// ## Design Principles
//
// 1. **Library-First**: The Lambda binary only parses events and wires providers
// 2. **Idempotency**: Upserts overwrite in place, deletes of absent records succeed
// 3. **Bounded Time**: Every retry and poll respects the invocation deadline
// 4. **Stateless**: Previous state travels in the event, never in process memory

pub mod cfn;
pub mod config;
pub mod error;
pub mod model;
pub mod reconciler;
pub mod resolver;
pub mod resource;
pub mod retry;
pub mod traits;
pub mod waiter;

// Re-export core types for convenience
pub use cfn::{Request, RequestType, ResourceProperties, Response, Status};
pub use config::ValidatorConfig;
pub use error::{Error, Result};
pub use model::{
    CertificateDetails, CertificateStatus, DomainValidation, HostedZone, ManagedRecord, RecordType,
    ResourceRecord, ValidationRequirement,
};
pub use reconciler::{ReconciliationPlan, RecordReconciler};
pub use resource::{CertificateResource, CertificateValidator, CustomResource};
pub use traits::{CertificateProvider, Clock, DnsProvider, ResponseSender, SystemClock};
pub use waiter::{IssuanceWaiter, WaitPhase, WaitState};
