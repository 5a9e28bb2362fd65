//! Issuance waiter
//!
//! Deadline-aware poll loops over the certificate status provider.
//!
//! ## State machine
//!
//! ```text
//! Pending ──► Polling ──┬──► Issued
//!               ▲  │    ├──► Failed
//!               └──┘    └──► TimedOut
//! ```
//!
//! The interval is fixed. Each sleep is clamped to what is left before the
//! deadline, so `TimedOut` is reached at or before it and never after.

use crate::error::{Error, Result};
use crate::model::{CertificateDetails, CertificateStatus};
use crate::retry::{Exhausted, RetryPolicy};
use crate::traits::{CertificateProvider, Clock};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Phase of a wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitPhase {
    Pending,
    Polling,
    Issued,
    Failed,
    TimedOut,
}

impl WaitPhase {
    /// Whether the phase has no outgoing transitions
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Issued | Self::Failed | Self::TimedOut)
    }
}

/// Progress of one wait, scoped to a single invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitState {
    pub phase: WaitPhase,
    /// Status polls performed
    pub attempts: u32,
    /// Time since the wait started, updated on every transition
    pub elapsed: Duration,
    pub deadline: Instant,
    pub last_observed_status: Option<CertificateStatus>,
    started: Instant,
}

impl WaitState {
    fn new(now: Instant, deadline: Instant) -> Self {
        Self {
            phase: WaitPhase::Pending,
            attempts: 0,
            elapsed: Duration::ZERO,
            deadline,
            last_observed_status: None,
            started: now,
        }
    }

    fn transition(&mut self, phase: WaitPhase, now: Instant) {
        if self.phase.is_terminal() {
            warn!(from = ?self.phase, to = ?phase, "ignoring transition out of terminal phase");
            return;
        }
        self.phase = phase;
        self.elapsed = now.saturating_duration_since(self.started);
    }

    fn last_status(&self) -> String {
        self.last_observed_status
            .as_ref()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "none".to_string())
    }

    fn time_out(&mut self, arn: &str, now: Instant) -> Error {
        self.transition(WaitPhase::TimedOut, now);
        warn!(arn, attempts = self.attempts, elapsed_secs = self.elapsed.as_secs(), "deadline reached before issuance");
        Error::IssuanceTimedOut {
            arn: arn.to_string(),
            attempts: self.attempts,
            elapsed_secs: self.elapsed.as_secs(),
            last_status: self.last_status(),
        }
    }
}

/// Polls a certificate until it is issued, fails, or the deadline passes
pub struct IssuanceWaiter<'a> {
    certificates: &'a dyn CertificateProvider,
    clock: &'a dyn Clock,
    poll_interval: Duration,
    status_retry: RetryPolicy,
}

impl<'a> IssuanceWaiter<'a> {
    /// Create a new waiter
    pub fn new(
        certificates: &'a dyn CertificateProvider,
        clock: &'a dyn Clock,
        poll_interval: Duration,
        status_retry: RetryPolicy,
    ) -> Self {
        Self {
            certificates,
            clock,
            poll_interval,
            status_retry,
        }
    }

    /// Wait for `arn` to be issued
    ///
    /// Returns the final state on success.
    ///
    /// # Errors
    ///
    /// - `Error::IssuanceFailed` on a terminal non-issued status
    /// - `Error::IssuanceTimedOut` when the deadline is reached first,
    ///   including while a failing status read waits for its retry
    /// - `Error::Polling` when status reads keep failing
    pub async fn wait(&self, arn: &str, deadline: Instant) -> Result<WaitState> {
        let mut state = WaitState::new(self.clock.now(), deadline);
        info!(arn, "waiting for certificate issuance");

        loop {
            let now = self.clock.now();
            if now >= deadline {
                return Err(state.time_out(arn, now));
            }

            state.transition(WaitPhase::Polling, now);
            state.attempts += 1;
            let details = match self.read_status(arn, deadline).await {
                Ok(details) => details,
                Err(exhausted) if exhausted.deadline_reached => {
                    return Err(state.time_out(arn, self.clock.now()));
                }
                Err(exhausted) => return Err(polling_error(arn, exhausted)),
            };
            let now = self.clock.now();
            debug!(arn, attempt = state.attempts, status = %details.status, "polled certificate status");

            let status = details.status;
            state.last_observed_status = Some(status.clone());

            if status == CertificateStatus::Issued {
                state.transition(WaitPhase::Issued, now);
                info!(arn, attempts = state.attempts, elapsed_secs = state.elapsed.as_secs(), "certificate issued");
                return Ok(state);
            }
            if status.is_terminal_failure() {
                state.transition(WaitPhase::Failed, now);
                warn!(arn, status = %status, "certificate reached a terminal failure status");
                return Err(Error::IssuanceFailed {
                    arn: arn.to_string(),
                    status: status.to_string(),
                });
            }

            let remaining = deadline.saturating_duration_since(now);
            self.clock.sleep(self.poll_interval.min(remaining)).await;
        }
    }

    /// Wait until every domain validation option carries a resource record
    ///
    /// ACM fills in the records a few seconds after the request. Gives up
    /// after `timeout` or at `deadline`, whichever comes first.
    ///
    /// # Errors
    ///
    /// - `Error::RequirementsUnavailable` if records are still missing
    /// - `Error::IssuanceFailed` if the certificate fails meanwhile
    /// - `Error::Polling` when status reads keep failing
    pub async fn wait_for_requirements(
        &self,
        arn: &str,
        interval: Duration,
        timeout: Duration,
        deadline: Instant,
    ) -> Result<CertificateDetails> {
        let limit = (self.clock.now() + timeout).min(deadline);

        loop {
            let details = self.describe(arn, deadline).await?;

            if details.status.is_terminal_failure() {
                return Err(Error::IssuanceFailed {
                    arn: arn.to_string(),
                    status: details.status.to_string(),
                });
            }

            let missing = details.missing_records();
            if missing.is_empty() || details.status == CertificateStatus::Issued {
                debug!(arn, records = details.domain_validations.len(), "validation records available");
                return Ok(details);
            }

            let remaining = limit.saturating_duration_since(self.clock.now());
            if remaining.is_zero() {
                return Err(Error::RequirementsUnavailable {
                    arn: arn.to_string(),
                    missing,
                });
            }

            debug!(arn, missing = ?missing, "validation records not yet published");
            self.clock.sleep(interval.min(remaining)).await;
        }
    }

    /// Read the certificate once, retrying transient failures
    ///
    /// # Errors
    ///
    /// - `Error::Polling` once status read retries are exhausted
    /// - non-transient provider errors such as `Error::CertificateNotFound`
    pub async fn describe(&self, arn: &str, deadline: Instant) -> Result<CertificateDetails> {
        self.read_status(arn, deadline)
            .await
            .map_err(|e| polling_error(arn, e))
    }

    async fn read_status(
        &self,
        arn: &str,
        deadline: Instant,
    ) -> std::result::Result<CertificateDetails, Exhausted> {
        self.status_retry
            .run(self.clock, Some(deadline), "describe_certificate", || {
                self.certificates.describe_certificate(arn)
            })
            .await
    }
}

fn polling_error(arn: &str, exhausted: Exhausted) -> Error {
    if exhausted.error.is_transient() {
        Error::Polling {
            arn: arn.to_string(),
            attempts: exhausted.attempts,
            message: exhausted.error.to_string(),
        }
    } else {
        exhausted.error
    }
}
