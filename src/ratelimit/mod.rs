//! Rate limiting logic and permit management.

mod gate;
mod limiter;
mod window;

pub use gate::PermitGate;
pub use limiter::RateLimiter;
pub use window::TimeWindow;
