//! HTTP transport for document submission.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, trace};

use crate::error::{CrptError, Result};

/// Content type of every submission body.
pub const CONTENT_TYPE_JSON: &str = "application/json";
/// Header carrying the detached document signature.
pub const SIGNATURE_HEADER: &str = "Signature";

/// A single outgoing submission.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    /// Endpoint to POST to
    pub url: String,
    /// Value of the `Signature` header
    pub signature: String,
    /// Serialized document
    pub body: String,
}

impl TransportRequest {
    /// Headers sent with the request.
    pub fn headers(&self) -> [(&'static str, &str); 2] {
        [
            ("Content-Type", CONTENT_TYPE_JSON),
            (SIGNATURE_HEADER, self.signature.as_str()),
        ]
    }
}

/// Status code and body returned by the API.
///
/// Non-2xx responses are ordinary values, not errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Trait for transports that deliver a submission and return the raw response.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send the request. Fails only on connectivity or I/O problems.
    async fn send(&self, request: TransportRequest) -> Result<ApiResponse>;
}

/// Transport backed by a pooled `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Create a transport whose requests time out after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CrptError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: TransportRequest) -> Result<ApiResponse> {
        trace!(url = %request.url, bytes = request.body.len(), "Sending request");

        let mut builder = self.client.post(&request.url);
        for (name, value) in request.headers() {
            builder = builder.header(name, value);
        }

        let response = builder
            .body(request.body)
            .send()
            .await
            .map_err(|e| CrptError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| CrptError::Transport(format!("Failed to read response body: {}", e)))?;

        debug!(status = status, "Received response");
        Ok(ApiResponse { status, body })
    }
}

/// Transport that never touches the network.
///
/// Waits for the configured latency and acknowledges every request with
/// `200`. Useful for exercising the rate limiter without a live API.
#[derive(Debug, Clone, Default)]
pub struct DryRunTransport {
    latency: Duration,
}

impl DryRunTransport {
    pub fn new(latency: Duration) -> Self {
        Self { latency }
    }
}

#[async_trait]
impl Transport for DryRunTransport {
    async fn send(&self, request: TransportRequest) -> Result<ApiResponse> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let body = serde_json::json!({
            "dry_run": true,
            "url": request.url,
            "bytes": request.body.len(),
        });

        Ok(ApiResponse {
            status: 200,
            body: body.to_string(),
        })
    }
}
