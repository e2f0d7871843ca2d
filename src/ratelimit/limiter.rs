//! Core rate limiter implementation.
//!
//! The limiter owns a fixed-capacity pool of permits. Callers take a permit
//! before issuing a request and hand it back when the request finishes. A
//! background task resets the pool to full capacity once per period, so at
//! most `capacity` requests start within any single window.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{oneshot, Notify};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use super::gate::PermitGate;
use crate::config::RateLimitSettings;
use crate::error::{CrptError, Result};

/// Shared permit state, referenced by both the limiter and its refill task.
struct PermitPool {
    /// Permits currently available, always within `0..=capacity`
    available: AtomicUsize,
    /// Upper bound on available permits
    capacity: usize,
    /// Set once the limiter is closed
    closed: AtomicBool,
    /// Wakes callers suspended in `acquire`
    notify: Notify,
}

impl PermitPool {
    fn new(capacity: usize) -> Self {
        Self {
            available: AtomicUsize::new(capacity),
            capacity,
            closed: AtomicBool::new(false),
            notify: Notify::new(),
        }
    }

    /// Take one permit if any is left.
    fn try_take(&self) -> bool {
        self.available
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok()
    }

    /// Return one permit unless the pool is already full.
    fn give_back(&self) -> bool {
        let returned = self
            .available
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < self.capacity).then_some(n + 1)
            })
            .is_ok();

        if returned {
            self.notify.notify_one();
        }
        returned
    }

    /// Hard reset to full capacity. Returns the count observed before the reset.
    fn refill(&self) -> usize {
        let previous = self.available.swap(self.capacity, Ordering::AcqRel);
        self.notify.notify_waiters();
        previous
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// Handle to the background refill task.
struct RefillTask {
    shutdown_tx: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

/// A permit-pool rate limiter admitting at most `capacity` requests per period.
///
/// This struct is thread-safe and is meant to be shared behind an `Arc`.
/// Dropping the limiter drops the shutdown sender, which stops the refill
/// task on its next wake-up; `close` does the same eagerly and waits for it.
pub struct RateLimiter {
    pool: Arc<PermitPool>,
    period: Duration,
    refill_task: Mutex<Option<RefillTask>>,
}

impl RateLimiter {
    /// Create a new rate limiter and start its refill task.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(capacity: usize, period: Duration) -> Result<Self> {
        if capacity == 0 {
            return Err(CrptError::Config(
                "rate limiter capacity must be greater than zero".to_string(),
            ));
        }
        if period.is_zero() {
            return Err(CrptError::Config(
                "rate limiter period must be greater than zero".to_string(),
            ));
        }

        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            CrptError::Config("rate limiter must be created inside a Tokio runtime".to_string())
        })?;

        let first_refill = Instant::now().checked_add(period).ok_or_else(|| {
            CrptError::Config(format!("rate limiter period {:?} is too large", period))
        })?;

        let pool = Arc::new(PermitPool::new(capacity));
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let handle = runtime.spawn(refill_loop(pool.clone(), first_refill, period, shutdown_rx));

        info!(
            capacity = capacity,
            period_ms = period.as_millis() as u64,
            "Rate limiter initialized"
        );

        Ok(Self {
            pool,
            period,
            refill_task: Mutex::new(Some(RefillTask {
                shutdown_tx,
                handle,
            })),
        })
    }

    /// Create a rate limiter from configuration settings.
    pub fn from_settings(settings: &RateLimitSettings) -> Result<Self> {
        Self::new(settings.request_limit as usize, settings.time_unit.duration())
    }

    /// Wait until a permit is available and take it.
    ///
    /// Waiters are not served in any particular order. Returns
    /// `CrptError::LimiterClosed` once the limiter has been closed.
    pub async fn acquire(&self) -> Result<()> {
        loop {
            // Register interest before checking so a concurrent release or
            // refill between the check and the await is not missed.
            let notified = self.pool.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.pool.is_closed() {
                return Err(CrptError::LimiterClosed);
            }
            if self.pool.try_take() {
                trace!(available = self.available(), "Permit acquired");
                return Ok(());
            }

            trace!("No permits available, waiting");
            notified.await;
        }
    }

    /// Take a permit without waiting.
    pub fn try_acquire(&self) -> bool {
        !self.pool.is_closed() && self.pool.try_take()
    }

    /// Wait at most `timeout` for a permit.
    ///
    /// A caller that times out holds no permit.
    pub async fn acquire_timeout(&self, timeout: Duration) -> Result<()> {
        match tokio::time::timeout(timeout, self.acquire()).await {
            Ok(result) => result,
            Err(_) => {
                debug!(timeout_ms = timeout.as_millis() as u64, "Permit acquisition timed out");
                Err(CrptError::AcquireTimeout(timeout))
            }
        }
    }

    /// Return one permit to the pool.
    ///
    /// Returns `false` if the pool was already full, which happens when a
    /// refill tick restored the permit while its request was still running.
    pub fn release(&self) -> bool {
        let returned = self.pool.give_back();
        if !returned {
            trace!(capacity = self.pool.capacity, "Permit pool already full, release ignored");
        }
        returned
    }

    /// Number of permits currently available.
    pub fn available(&self) -> usize {
        self.pool.available.load(Ordering::Acquire)
    }

    /// Maximum number of permits per period.
    pub fn capacity(&self) -> usize {
        self.pool.capacity
    }

    /// Refill period.
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Whether `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }

    /// Stop the refill task and reject all current and future waiters.
    ///
    /// Calling this more than once is a no-op.
    pub async fn close(&self) {
        if self.pool.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.pool.notify.notify_waiters();

        let task = self.refill_task.lock().take();
        if let Some(task) = task {
            // The task may already be gone if the runtime is shutting down.
            let _ = task.shutdown_tx.send(());
            if let Err(e) = task.handle.await {
                warn!(error = %e, "Refill task terminated abnormally");
            }
        }

        info!("Rate limiter closed");
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("capacity", &self.pool.capacity)
            .field("available", &self.available())
            .field("period", &self.period)
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[async_trait]
impl PermitGate for RateLimiter {
    async fn acquire(&self) -> Result<()> {
        RateLimiter::acquire(self).await
    }

    fn release(&self) {
        RateLimiter::release(self);
    }
}

/// Reset the pool to capacity once per period until told to stop.
async fn refill_loop(
    pool: Arc<PermitPool>,
    first_refill: Instant,
    period: Duration,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    let mut ticker = interval_at(first_refill, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    debug!(period_ms = period.as_millis() as u64, "Refill task started");

    loop {
        tokio::select! {
            biased;
            // Resolves on an explicit signal or when the limiter is dropped.
            _ = &mut shutdown_rx => break,
            _ = ticker.tick() => {
                let previous = pool.refill();
                trace!(
                    previous = previous,
                    capacity = pool.capacity,
                    "Permit pool refilled"
                );
            }
        }
    }

    debug!("Refill task stopped");
}
