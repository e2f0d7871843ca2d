//! Time window definitions for the permit refill cadence.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Time unit after which the permit pool is refilled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeWindow {
    /// Per-millisecond refill, mostly useful in tests
    Millisecond,
    /// Per-second refill
    #[default]
    Second,
    /// Per-minute refill
    Minute,
    /// Per-hour refill
    Hour,
    /// Per-day refill
    Day,
}

impl TimeWindow {
    /// Get the duration of this time window.
    pub fn duration(&self) -> Duration {
        match self {
            TimeWindow::Millisecond => Duration::from_millis(1),
            TimeWindow::Second => Duration::from_secs(1),
            TimeWindow::Minute => Duration::from_secs(60),
            TimeWindow::Hour => Duration::from_secs(3600),
            TimeWindow::Day => Duration::from_secs(86400),
        }
    }
}
