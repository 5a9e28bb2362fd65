//! Response upload to the pre-signed S3 URL

use async_trait::async_trait;
use certval_core::traits::ResponseSender;
use certval_core::{Error, Response, Result};
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use std::time::Duration;
use tracing::{debug, info};

/// HTTP timeout for the upload (30 seconds, the default safety margin)
const UPLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// Uploads responses with an HTTP PUT
///
/// The URL is pre-signed without a content type, so the request must carry
/// an empty `Content-Type` header or S3 rejects the signature.
#[derive(Debug, Clone)]
pub struct HttpResponseSender {
    client: reqwest::Client,
}

impl HttpResponseSender {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(UPLOAD_TIMEOUT)
            .build()
            .map_err(|e| Error::http(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ResponseSender for HttpResponseSender {
    async fn send(&self, response_url: &str, response: &Response) -> Result<()> {
        let body = serde_json::to_vec(response)?;
        debug!(body = %String::from_utf8_lossy(&body), "response body");

        let reply = self
            .client
            .put(response_url)
            .header(CONTENT_TYPE, "")
            .header(CONTENT_LENGTH, body.len())
            .body(body)
            .send()
            .await
            .map_err(|e| Error::http(format!("response upload failed: {e}")))?;

        let status = reply.status();
        if !status.is_success() {
            return Err(Error::http(format!("response upload rejected with HTTP {status}")));
        }

        info!(http_status = status.as_u16(), "response sent");
        Ok(())
    }
}
