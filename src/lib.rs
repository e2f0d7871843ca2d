//! CRPT API - Rate-Limited Document Submission Client
//!
//! This crate submits documents to the CRPT registry API while capping the
//! number of requests started per time window. A shared permit pool gates
//! every submission and is refilled to capacity by a background task once
//! per window.

pub mod api;
pub mod config;
pub mod error;
pub mod ratelimit;

pub use api::{CrptApi, Document, SubmissionPipeline};
pub use config::ClientConfig;
pub use error::{CrptError, Result};
pub use ratelimit::RateLimiter;
