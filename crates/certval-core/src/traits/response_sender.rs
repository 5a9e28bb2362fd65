// # Response Sender Trait
//
// Delivers the custom-resource response to CloudFormation.
//
// The Lambda binary implements this with an HTTP PUT to the request's
// pre-signed `ResponseURL`; tests capture responses in memory.

use crate::cfn::Response;
use async_trait::async_trait;

/// Trait for response transports
#[async_trait]
pub trait ResponseSender: Send + Sync {
    /// Upload `response` to `response_url`
    async fn send(&self, response_url: &str, response: &Response) -> Result<(), crate::Error>;
}
