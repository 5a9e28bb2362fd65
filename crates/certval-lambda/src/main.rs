// # certval-lambda - CloudFormation custom resource handler
//
// This binary is a THIN integration layer:
// - DO NOT add DNS, waiting, or retry logic here
// - All lifecycle logic lives in certval-core
// - Configuration is via environment variables ONLY
//
// The binary is responsible for:
// 1. Reading and validating configuration from environment variables
// 2. Installing JSON tracing with a per-invocation level
// 3. Loading AWS credentials once per cold start
// 4. Parsing each event, picking the handler, and uploading the response
//
// ## Configuration
//
// - `CERTVAL_LOG_LEVEL`: DEBUG, INFO, WARNING, ERROR or CRITICAL (default INFO)
// - `CERTVAL_POLL_INTERVAL_SECS`: Issuance poll interval (default 5)
// - `CERTVAL_SAFETY_MARGIN_SECS`: Time reserved for the response (default 30)
// - `CERTVAL_MAX_RETRIES`: DNS change retries (default 3)
// - `CERTVAL_RETRY_DELAY_MS` / `CERTVAL_MAX_RETRY_DELAY_MS`: Retry backoff step and cap
// - `CERTVAL_STATUS_READ_RETRIES`: Tolerated failed status reads per poll (default 3)
// - `CERTVAL_REQUIREMENTS_POLL_INTERVAL_SECS` / `CERTVAL_REQUIREMENTS_TIMEOUT_SECS`:
//   Waiting for ACM to publish validation records (default 5 / 60)
// - `CERTVAL_RECORD_TTL`: TTL of validation records (default 300)
//
// ## Handlers
//
// - `Custom::Certificate`: requests and deletes certificates
// - `Custom::CertificateValidator`: publishes validation records and waits
//   for issuance
//
// Other resource type names are routed by their properties: a
// `CertificateArn` selects the validator, a `DomainName` the certificate
// handler.

mod config;
mod logging;
mod sender;

use anyhow::Result;
use aws_config::BehaviorVersion;
use certval_core::cfn::{CERTIFICATE_RESOURCE_TYPE, VALIDATOR_RESOURCE_TYPE};
use certval_core::resource::{self, CertificateResource, CertificateValidator, working_deadline};
use certval_core::traits::ResponseSender;
use certval_core::{Request, Response, Status, SystemClock};
use certval_provider_aws::{AcmProvider, Route53Provider};
use chrono::{DateTime, Utc};
use config::Config;
use lambda_runtime::{LambdaEvent, service_fn};
use logging::Logging;
use sender::HttpResponseSender;
use serde_json::{Map, Value};
use std::process::ExitCode;
use std::time::Instant;
use tracing::{error, info, warn};

/// Exit codes for cold start failures
#[derive(Debug, Clone, Copy)]
enum CertvalExitCode {
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<CertvalExitCode> for ExitCode {
    fn from(code: CertvalExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Which custom resource handles a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Handler {
    Certificate,
    Validator,
}

impl Handler {
    fn select(request: &Request) -> Option<Self> {
        match request.resource_type.as_str() {
            CERTIFICATE_RESOURCE_TYPE => Some(Self::Certificate),
            VALIDATOR_RESOURCE_TYPE => Some(Self::Validator),
            _ => {
                let props = &request.resource_properties;
                if props.certificate_arn.is_some() {
                    Some(Self::Validator)
                } else if props.domain_name.is_some() {
                    Some(Self::Certificate)
                } else {
                    None
                }
            }
        }
    }
}

/// Long-lived state shared by all invocations of one execution environment
struct App {
    config: Config,
    logging: Logging,
    aws: aws_config::SdkConfig,
    dns: Route53Provider,
    sender: HttpResponseSender,
}

impl App {
    async fn handle(&self, event: LambdaEvent<Value>) -> Result<Value, lambda_runtime::Error> {
        let (payload, context) = event.into_parts();
        let wall_now = Utc::now();
        let now = Instant::now();

        let request = match Request::from_value(payload.clone()) {
            Ok(request) => request,
            Err(e) => {
                error!(error = %e, "malformed custom resource event");
                self.reject_malformed(&payload, &e.to_string()).await;
                return Err(e.into());
            }
        };

        self.logging
            .apply(request.resource_properties.log_level.as_deref());
        info!(
            request_type = %request.request_type,
            resource_type = %request.resource_type,
            logical_resource_id = %request.logical_resource_id,
            request_id = %request.request_id,
            "received request"
        );

        let deadline = working_deadline(
            invocation_deadline(context.deadline, wall_now),
            wall_now,
            now,
            self.config.validator.safety_margin(),
        );

        let response = match Handler::select(&request) {
            Some(handler) => {
                let certificates = Box::new(AcmProvider::new(&self.aws, request.region()));
                match handler {
                    Handler::Certificate => {
                        let resource = CertificateResource::new(certificates);
                        resource::process(&resource, &request, deadline, &self.sender).await?
                    }
                    Handler::Validator => {
                        let resource = CertificateValidator::new(
                            certificates,
                            Box::new(self.dns.clone()),
                            Box::new(SystemClock),
                            self.config.validator.clone(),
                        );
                        resource::process(&resource, &request, deadline, &self.sender).await?
                    }
                }
            }
            None => {
                warn!(resource_type = %request.resource_type, "no handler for resource type");
                let mut response = Response::for_request(&request);
                response.fail(format!(
                    "Unsupported ResourceType {}: expected {CERTIFICATE_RESOURCE_TYPE} or {VALIDATOR_RESOURCE_TYPE}",
                    request.resource_type
                ));
                self.sender.send(&request.response_url, &response).await?;
                response
            }
        };

        if response.is_success() {
            info!(physical_resource_id = %response.physical_resource_id, "request finished");
        } else {
            warn!(reason = %response.reason, "request finished with FAILED");
        }
        Ok(serde_json::to_value(&response)?)
    }

    /// Best effort FAILED response for an event that did not parse, so the
    /// stack does not wait for the CloudFormation timeout
    async fn reject_malformed(&self, payload: &Value, reason: &str) {
        let Some((url, response)) = malformed_event_response(payload, reason) else {
            warn!("event carries no ResponseURL, no response sent");
            return;
        };
        if let Err(e) = self.sender.send(&url, &response).await {
            error!(error = %e, "failed to send response for malformed event");
        }
    }
}

/// Platform deadline as wall-clock time; an unrepresentable value leaves no
/// budget at all
fn invocation_deadline(deadline_ms: u64, wall_now: DateTime<Utc>) -> DateTime<Utc> {
    i64::try_from(deadline_ms)
        .ok()
        .and_then(DateTime::from_timestamp_millis)
        .unwrap_or_else(|| {
            warn!(deadline_ms, "invalid invocation deadline");
            wall_now
        })
}

fn malformed_event_response(payload: &Value, reason: &str) -> Option<(String, Response)> {
    let field = |name: &str| payload.get(name).and_then(Value::as_str);
    let url = field("ResponseURL")?;

    let response = Response {
        status: Status::Failed,
        reason: format!("Invalid request: {reason}"),
        physical_resource_id: field("PhysicalResourceId")
            .or_else(|| field("LogicalResourceId"))
            .unwrap_or("invalid-request")
            .to_string(),
        stack_id: field("StackId").unwrap_or_default().to_string(),
        request_id: field("RequestId").unwrap_or_default().to_string(),
        logical_resource_id: field("LogicalResourceId").unwrap_or_default().to_string(),
        no_echo: false,
        data: Map::new(),
    };
    Some((url.to_string(), response))
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {e:#}");
            return CertvalExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {e:#}");
        return CertvalExitCode::ConfigError.into();
    }

    let logging = match Logging::init(config.log_level) {
        Ok(logging) => logging,
        Err(e) => {
            eprintln!("Failed to set tracing subscriber: {e}");
            return CertvalExitCode::ConfigError.into();
        }
    };

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return CertvalExitCode::RuntimeError.into();
        }
    };

    match rt.block_on(run(config, logging)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Runtime error: {:#}", e);
            CertvalExitCode::RuntimeError.into()
        }
    }
}

async fn run(config: Config, logging: Logging) -> Result<()> {
    let aws = aws_config::defaults(BehaviorVersion::latest()).load().await;
    let app = App {
        dns: Route53Provider::new(&aws),
        sender: HttpResponseSender::new()?,
        aws,
        config,
        logging,
    };

    info!(
        poll_interval_secs = app.config.validator.poll_interval_secs,
        safety_margin_secs = app.config.validator.safety_margin_secs,
        "certval handler ready"
    );

    let app = &app;
    lambda_runtime::run(service_fn(move |event: LambdaEvent<Value>| async move {
        app.handle(event).await
    }))
    .await
    .map_err(|e| anyhow::anyhow!(e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(resource_type: &str, props: Value) -> Request {
        Request::from_value(json!({
            "RequestType": "Create",
            "ResponseURL": "https://example.invalid/response",
            "StackId": "arn:aws:cloudformation:eu-west-1:123456789012:stack/s/guid",
            "RequestId": "r-1",
            "ResourceType": resource_type,
            "LogicalResourceId": "Cert",
            "ResourceProperties": props
        }))
        .unwrap()
    }

    #[test]
    fn known_resource_types_pick_their_handler() {
        assert_eq!(
            Handler::select(&request("Custom::Certificate", json!({}))),
            Some(Handler::Certificate)
        );
        assert_eq!(
            Handler::select(&request("Custom::CertificateValidator", json!({}))),
            Some(Handler::Validator)
        );
    }

    #[test]
    fn other_resource_types_are_routed_by_properties() {
        let arn = "arn:aws:acm:eu-west-1:123456789012:certificate/abc";
        assert_eq!(
            Handler::select(&request("Custom::Validation", json!({ "CertificateArn": arn }))),
            Some(Handler::Validator)
        );
        assert_eq!(
            Handler::select(&request("Custom::Cert", json!({ "DomainName": "a.com" }))),
            Some(Handler::Certificate)
        );
        assert_eq!(Handler::select(&request("Custom::Other", json!({}))), None);
    }

    #[test]
    fn deadline_comes_from_epoch_millis() {
        let now = Utc::now();
        let deadline = invocation_deadline(1_700_000_000_000, now);
        assert_eq!(deadline.timestamp(), 1_700_000_000);
        assert_eq!(invocation_deadline(u64::MAX, now), now);
    }

    #[test]
    fn malformed_events_still_get_a_failure() {
        let payload = json!({
            "ResponseURL": "https://example.invalid/response",
            "StackId": "stack",
            "RequestId": "r-1",
            "LogicalResourceId": "Cert"
        });

        let (url, response) = malformed_event_response(&payload, "missing field `RequestType`").unwrap();

        assert_eq!(url, "https://example.invalid/response");
        assert_eq!(response.status, Status::Failed);
        assert_eq!(response.physical_resource_id, "Cert");
        assert!(response.reason.contains("RequestType"));
        assert!(malformed_event_response(&json!({}), "x").is_none());
    }
}
