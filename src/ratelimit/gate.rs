//! Permit gate trait for abstracting the limiter behind the submission pipeline.

use async_trait::async_trait;

use crate::error::Result;

/// Trait for admission gates.
///
/// The submission pipeline only needs to take a permit before a request
/// and hand it back afterwards. `RateLimiter` is the production
/// implementation; tests substitute instrumented gates.
#[async_trait]
pub trait PermitGate: Send + Sync {
    /// Wait until a permit is available and take it.
    async fn acquire(&self) -> Result<()>;

    /// Return one previously acquired permit.
    fn release(&self);
}
