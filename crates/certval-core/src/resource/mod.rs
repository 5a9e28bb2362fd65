//! Custom resource handlers
//!
//! A [`CustomResource`] implements Create, Update and Delete. [`handle`]
//! dispatches on the request type and folds any error into a FAILED
//! response; [`process`] additionally delivers the response, whatever the
//! outcome.
//!
//! ```text
//! Request ──► handle ──► create | update | delete ──► Response ──► ResponseSender
//!                              │
//!                              └── Err(e) ──► FAILED, Reason = e
//! ```

pub mod certificate;
pub mod validator;

pub use certificate::CertificateResource;
pub use validator::CertificateValidator;

use crate::cfn::{Request, RequestType, Response};
use crate::error::{Error, Result};
use crate::traits::ResponseSender;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// A CloudFormation custom resource
///
/// Handlers start from a SUCCESS response that echoes the request's
/// identifiers. Returning `Err` turns it into FAILED with the error text as
/// reason; handlers only touch `response` to set a physical id, data, or a
/// reason on success.
#[async_trait]
pub trait CustomResource: Send + Sync {
    /// Handle a Create event
    async fn create(&self, request: &Request, response: &mut Response, deadline: Instant)
    -> Result<()>;

    /// Handle an Update event
    async fn update(&self, request: &Request, response: &mut Response, deadline: Instant)
    -> Result<()>;

    /// Handle a Delete event
    async fn delete(&self, request: &Request, response: &mut Response, deadline: Instant)
    -> Result<()>;

    /// Resource type name (for logging)
    fn resource_type(&self) -> &'static str;
}

/// Run the handler for `request` and build the response
pub async fn handle(resource: &dyn CustomResource, request: &Request, deadline: Instant) -> Response {
    let mut response = Response::for_request(request);

    info!(
        resource_type = resource.resource_type(),
        request_type = %request.request_type,
        logical_resource_id = %request.logical_resource_id,
        "handling request"
    );

    let outcome = match &request.request_type {
        RequestType::Create => resource.create(request, &mut response, deadline).await,
        RequestType::Update => resource.update(request, &mut response, deadline).await,
        RequestType::Delete => resource.delete(request, &mut response, deadline).await,
        RequestType::Unknown(other) => Err(Error::UnknownRequestType(other.clone())),
    };

    match outcome {
        Ok(()) => info!(
            physical_resource_id = %response.physical_resource_id,
            reason = %response.reason,
            "request succeeded"
        ),
        Err(e) => {
            error!(error = %e, "request failed");
            response.fail(e.to_string());
        }
    }

    response
}

/// Handle `request` and deliver the response to its `ResponseURL`
///
/// The response is sent even when the handler fails.
///
/// # Errors
///
/// Only delivery failures are returned; handler failures are part of the
/// response.
pub async fn process(
    resource: &dyn CustomResource,
    request: &Request,
    deadline: Instant,
    sender: &dyn ResponseSender,
) -> Result<Response> {
    let response = handle(resource, request, deadline).await;
    debug!(response = ?response, "sending response");
    sender.send(&request.response_url, &response).await?;
    Ok(response)
}

/// Translate the platform's wall-clock deadline into a monotonic instant,
/// `margin` early
///
/// A deadline already in the past (or closer than `margin`) yields `now`.
pub fn working_deadline(
    invocation_deadline: DateTime<Utc>,
    wall_now: DateTime<Utc>,
    now: Instant,
    margin: Duration,
) -> Instant {
    let remaining = (invocation_deadline - wall_now)
        .to_std()
        .unwrap_or(Duration::ZERO);
    now + remaining.saturating_sub(margin)
}
