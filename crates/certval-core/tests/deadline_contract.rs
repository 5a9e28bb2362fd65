//! Architectural Contract Test: Deadline Enforcement
//!
//! This test verifies that no part of an invocation outlives the working
//! deadline (invocation deadline minus the safety margin).
//!
//! Constraints verified:
//! - A certificate that never issues ends in a timeout at or before the deadline
//! - A timeout is reported differently from a validation failure
//! - Poll intervals are fixed and the last sleep is clamped to the deadline
//! - Persistent status read errors become a polling failure, not a timeout
//! - A read error whose retry would cross the deadline is a timeout
//!
//! If this test fails, a stuck certificate can keep the function running
//! until the platform kills it, and CloudFormation never gets a response.

mod common;

use certval_core::cfn::{Status, VALIDATOR_RESOURCE_TYPE};
use certval_core::error::Error;
use certval_core::model::CertificateStatus;
use certval_core::resource::{self, CertificateValidator, working_deadline};
use certval_core::waiter::{IssuanceWaiter, WaitPhase};
use certval_core::{Clock, ValidatorConfig};
use chrono::{TimeDelta, Utc};
use common::*;
use serde_json::json;
use std::time::Duration;

#[tokio::test]
async fn never_issuing_certificate_times_out_at_the_deadline() {
    let arn = cert_arn("stuck");
    let certs = ScriptedCertificates::new();
    certs.script(&arn, vec![certificate(&arn, CertificateStatus::PendingValidation, &["a.com"])]);
    let dns = InMemoryDns::new(&[("Z1", "a.com.")]);
    let clock = VirtualClock::new();
    let config = ValidatorConfig::default();

    // 15 minutes of invocation budget, 30 s of it reserved for the response
    let wall_now = Utc::now();
    let deadline = working_deadline(
        wall_now + TimeDelta::minutes(15),
        wall_now,
        clock.now(),
        config.safety_margin(),
    );

    let validator = CertificateValidator::new(
        Box::new(certs.clone()),
        Box::new(dns.clone()),
        Box::new(clock.clone()),
        config,
    );
    let request = request("Create", VALIDATOR_RESOURCE_TYPE, None, json!({ "CertificateArn": arn }), None);

    let response = resource::handle(&validator, &request, deadline).await;

    assert_eq!(response.status, Status::Failed);
    assert!(response.reason.starts_with("Timed out"), "{}", response.reason);
    assert!(clock.now() <= deadline, "waited past the deadline");
    assert_eq!(clock.elapsed(), Duration::from_secs(870));
    assert!(
        clock.sleeps().iter().all(|s| *s <= Duration::from_secs(5)),
        "fixed interval, no backoff"
    );
}

#[tokio::test]
async fn waiter_reports_state_on_issuance() {
    let arn = cert_arn("ok");
    let certs = ScriptedCertificates::new();
    certs.script(
        &arn,
        vec![
            certificate(&arn, CertificateStatus::PendingValidation, &["a.com"]),
            certificate(&arn, CertificateStatus::Issued, &["a.com"]),
        ],
    );
    let clock = VirtualClock::new();
    let config = ValidatorConfig::default();
    let waiter = IssuanceWaiter::new(&certs, &clock, config.poll_interval(), config.status_retry());

    let state = waiter
        .wait(&arn, clock.now() + Duration::from_secs(60))
        .await
        .expect("certificate issues");

    assert_eq!(state.phase, WaitPhase::Issued);
    assert_eq!(state.attempts, 2);
    assert_eq!(state.elapsed, Duration::from_secs(5));
    assert_eq!(state.last_observed_status, Some(CertificateStatus::Issued));
}

#[tokio::test]
async fn last_sleep_is_clamped_to_the_remaining_budget() {
    let arn = cert_arn("stuck");
    let certs = ScriptedCertificates::new();
    certs.script(&arn, vec![certificate(&arn, CertificateStatus::PendingValidation, &["a.com"])]);
    let clock = VirtualClock::new();
    let config = ValidatorConfig::default();
    let waiter = IssuanceWaiter::new(&certs, &clock, config.poll_interval(), config.status_retry());
    let deadline = clock.now() + Duration::from_secs(7);

    let err = waiter.wait(&arn, deadline).await.unwrap_err();

    assert!(matches!(err, Error::IssuanceTimedOut { attempts: 2, .. }), "{err:?}");
    assert_eq!(clock.sleeps(), vec![Duration::from_secs(5), Duration::from_secs(2)]);
    assert_eq!(clock.now(), deadline);
}

#[tokio::test]
async fn persistent_status_errors_are_a_polling_failure() {
    let arn = cert_arn("flaky");
    let certs = ScriptedCertificates::new();
    certs.script(&arn, vec![certificate(&arn, CertificateStatus::Issued, &["a.com"])]);
    certs.fail_next_describes(10);
    let clock = VirtualClock::new();
    let config = ValidatorConfig::default();
    let waiter = IssuanceWaiter::new(&certs, &clock, config.poll_interval(), config.status_retry());

    let err = waiter
        .wait(&arn, clock.now() + Duration::from_secs(600))
        .await
        .unwrap_err();

    match err {
        Error::Polling { attempts, .. } => assert_eq!(attempts, config.status_retry().max_attempts()),
        other => panic!("expected a polling failure, got {other:?}"),
    }
    assert_eq!(certs.describe_calls(), 4);
}

#[tokio::test]
async fn status_error_at_the_deadline_is_a_timeout() {
    let arn = cert_arn("flaky");
    let certs = ScriptedCertificates::new();
    certs.script(&arn, vec![certificate(&arn, CertificateStatus::Issued, &["a.com"])]);
    certs.fail_next_describes(10);
    let clock = VirtualClock::new();
    let config = ValidatorConfig::default();
    let waiter = IssuanceWaiter::new(&certs, &clock, config.poll_interval(), config.status_retry());
    let deadline = clock.now() + Duration::from_millis(500);

    let err = waiter.wait(&arn, deadline).await.unwrap_err();

    match err {
        Error::IssuanceTimedOut { attempts, last_status, .. } => {
            assert_eq!(attempts, 1);
            assert_eq!(last_status, "none");
        }
        other => panic!("expected a timeout, got {other:?}"),
    }
    assert_eq!(certs.describe_calls(), 1);
    assert!(clock.now() <= deadline);
}

#[tokio::test]
async fn brief_status_errors_are_absorbed() {
    let arn = cert_arn("flaky");
    let certs = ScriptedCertificates::new();
    certs.script(&arn, vec![certificate(&arn, CertificateStatus::Issued, &["a.com"])]);
    certs.fail_next_describes(2);
    let clock = VirtualClock::new();
    let config = ValidatorConfig::default();
    let waiter = IssuanceWaiter::new(&certs, &clock, config.poll_interval(), config.status_retry());

    let state = waiter
        .wait(&arn, clock.now() + Duration::from_secs(600))
        .await
        .expect("retries absorb the errors");

    assert_eq!(state.attempts, 1);
    assert_eq!(certs.describe_calls(), 3);
}
