//! Submission pipeline: permit, serialize, send, report, release.

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use super::transport::{ApiResponse, Transport, TransportRequest};
use crate::error::Result;
use crate::ratelimit::PermitGate;

/// Returns the held permit when dropped.
///
/// Covers every exit from `submit`, including cancellation of its future.
struct PermitGuard<'a, G: PermitGate + ?Sized> {
    gate: &'a G,
}

impl<G: PermitGate + ?Sized> Drop for PermitGuard<'_, G> {
    fn drop(&mut self) {
        self.gate.release();
    }
}

/// Submits records through a transport, gated by a rate limiter.
pub struct SubmissionPipeline<G: PermitGate, T: Transport> {
    /// Admission gate shared by every caller
    gate: Arc<G>,
    /// Transport used for the single send per submission
    transport: Arc<T>,
    /// Endpoint records are posted to
    url: String,
}

impl<G: PermitGate, T: Transport> SubmissionPipeline<G, T> {
    /// Create a pipeline posting to `url`.
    pub fn new(gate: Arc<G>, transport: Arc<T>, url: impl Into<String>) -> Self {
        Self {
            gate,
            transport,
            url: url.into(),
        }
    }

    /// Get the admission gate.
    pub fn gate(&self) -> &Arc<G> {
        &self.gate
    }

    /// Get the endpoint URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Submit one record with its signature.
    ///
    /// Waits for a permit, serializes the record to JSON and performs exactly
    /// one transport call. Non-2xx responses are returned as `Ok`. The permit
    /// is released once on every path after it was acquired.
    #[instrument(
        skip(self, record, signature),
        fields(request_id = %Uuid::new_v4(), url = %self.url)
    )]
    pub async fn submit<R>(&self, record: &R, signature: &str) -> Result<ApiResponse>
    where
        R: Serialize + Sync + ?Sized,
    {
        if let Err(e) = self.gate.acquire().await {
            let outcome = Err(e);
            report(&outcome);
            return outcome;
        }
        let _permit = PermitGuard {
            gate: self.gate.as_ref(),
        };

        let outcome = self.send_record(record, signature).await;
        report(&outcome);
        outcome
    }

    async fn send_record<R>(&self, record: &R, signature: &str) -> Result<ApiResponse>
    where
        R: Serialize + Sync + ?Sized,
    {
        let body = serde_json::to_string(record)?;
        let request = TransportRequest {
            url: self.url.clone(),
            signature: signature.to_string(),
            body,
        };
        self.transport.send(request).await
    }
}

/// Log the outcome of a submission.
fn report(outcome: &Result<ApiResponse>) {
    match outcome {
        Ok(response) if response.is_success() => {
            info!(status = response.status, body = %response.body, "Document submitted");
        }
        Ok(response) => {
            warn!(status = response.status, body = %response.body, "Document rejected by API");
        }
        Err(e) => {
            error!(error = %e, "Document submission failed");
        }
    }
}
