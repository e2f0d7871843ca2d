//! Ready-made client for the CRPT document creation endpoint.

use std::sync::Arc;

use tracing::info;

use super::document::Document;
use super::pipeline::SubmissionPipeline;
use super::transport::{ApiResponse, HttpTransport, Transport};
use crate::config::ClientConfig;
use crate::error::Result;
use crate::ratelimit::RateLimiter;

/// Submission pipeline over HTTP, limited by a `RateLimiter`.
pub type CrptApi = SubmissionPipeline<RateLimiter, HttpTransport>;

impl CrptApi {
    /// Build a client from configuration.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let transport = HttpTransport::new(config.api.request_timeout())?;
        Self::with_transport(config, transport)
    }
}

impl<T: Transport> SubmissionPipeline<RateLimiter, T> {
    /// Build a rate-limited pipeline from configuration around any transport.
    pub fn with_transport(config: &ClientConfig, transport: T) -> Result<Self> {
        config.validate()?;

        let limiter = RateLimiter::from_settings(&config.rate_limit)?;
        let url = config.api.create_document_url();

        info!(
            url = %url,
            request_limit = config.rate_limit.request_limit,
            time_unit = ?config.rate_limit.time_unit,
            "CRPT API client initialized"
        );

        Ok(Self::new(Arc::new(limiter), Arc::new(transport), url))
    }

    /// Create a document in the registry.
    pub async fn create_document(&self, document: &Document, signature: &str) -> Result<ApiResponse> {
        self.submit(document, signature).await
    }

    /// Close the rate limiter, rejecting submissions still waiting for a permit.
    pub async fn shutdown(&self) {
        self.gate().close().await;
    }
}
