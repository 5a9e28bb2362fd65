//! Core traits for certificate validation
//!
//! This module defines the abstract interfaces to everything outside the
//! engine.
//!
//! - [`CertificateProvider`]: read and manage certificates
//! - [`DnsProvider`]: list zones and write validation records
//! - [`Clock`]: time source for poll loops and retry delays
//! - [`ResponseSender`]: deliver the CloudFormation response

pub mod certificate_provider;
pub mod clock;
pub mod dns_provider;
pub mod response_sender;

pub use certificate_provider::CertificateProvider;
pub use clock::{Clock, SystemClock};
pub use dns_provider::DnsProvider;
pub use response_sender::ResponseSender;
