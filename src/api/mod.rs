//! Document submission API: payloads, transport and the rate-limited pipeline.

mod client;
mod document;
mod pipeline;
mod transport;

pub use client::CrptApi;
pub use document::{Description, Document, Product};
pub use pipeline::SubmissionPipeline;
pub use transport::{
    ApiResponse, DryRunTransport, HttpTransport, Transport, TransportRequest, CONTENT_TYPE_JSON,
    SIGNATURE_HEADER,
};
