//! End-to-end submission scenarios against the real rate limiter.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::ser::Error as _;
use serde::Serialize;
use tokio::time::Instant;

use crpt_api::api::{ApiResponse, Transport, TransportRequest};
use crpt_api::ratelimit::{PermitGate, RateLimiter};
use crpt_api::{CrptError, Document, Result, SubmissionPipeline};

const URL: &str = "http://registry.test/api/v3/lk/documents/create";

/// Transport that answers after a fixed delay and records when each call started.
struct RecordingTransport {
    latency: Duration,
    status: u16,
    body: &'static str,
    started: Mutex<Vec<Instant>>,
}

impl RecordingTransport {
    fn new(latency: Duration, status: u16, body: &'static str) -> Self {
        Self {
            latency,
            status,
            body,
            started: Mutex::new(Vec::new()),
        }
    }

    fn started(&self) -> Vec<Instant> {
        let mut started = self.started.lock().clone();
        started.sort();
        started
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(&self, _request: TransportRequest) -> Result<ApiResponse> {
        self.started.lock().push(Instant::now());
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        Ok(ApiResponse {
            status: self.status,
            body: self.body.to_string(),
        })
    }
}

/// Wraps the real limiter and counts how often permits are returned.
struct InstrumentedGate {
    inner: RateLimiter,
    acquired: AtomicUsize,
    released: AtomicUsize,
}

impl InstrumentedGate {
    fn new(capacity: usize, period: Duration) -> Self {
        Self {
            inner: RateLimiter::new(capacity, period).unwrap(),
            acquired: AtomicUsize::new(0),
            released: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl PermitGate for InstrumentedGate {
    async fn acquire(&self) -> Result<()> {
        self.inner.acquire().await?;
        self.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn release(&self) {
        self.released.fetch_add(1, Ordering::SeqCst);
        self.inner.release();
    }
}

struct Malformed;

impl Serialize for Malformed {
    fn serialize<S: serde::Serializer>(&self, _serializer: S) -> std::result::Result<S::Ok, S::Error> {
        Err(S::Error::custom("record cannot be encoded"))
    }
}

fn spawn_submissions<G, T>(
    pipeline: &Arc<SubmissionPipeline<G, T>>,
    count: usize,
) -> Vec<tokio::task::JoinHandle<Result<ApiResponse>>>
where
    G: PermitGate + 'static,
    T: Transport + 'static,
{
    (0..count)
        .map(|_| {
            let pipeline = pipeline.clone();
            tokio::spawn(async move { pipeline.submit(&Document::sample(), "test").await })
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_burst_beyond_capacity_waits_for_refill_tick() {
    // Calls outlive the window, so only the refill tick can free capacity.
    let limiter = Arc::new(RateLimiter::new(5, Duration::from_secs(1)).unwrap());
    let transport = Arc::new(RecordingTransport::new(Duration::from_millis(1500), 200, "ok"));
    let pipeline = Arc::new(SubmissionPipeline::new(limiter.clone(), transport.clone(), URL));
    let start = Instant::now();

    for handle in spawn_submissions(&pipeline, 10) {
        assert_eq!(handle.await.unwrap().unwrap().status, 200);
    }

    let started = transport.started();
    assert_eq!(started.len(), 10);
    for at in &started[..5] {
        assert_eq!(*at - start, Duration::ZERO);
    }
    for at in &started[5..] {
        assert_eq!(*at - start, Duration::from_secs(1));
    }
}

#[tokio::test(start_paused = true)]
async fn test_fast_calls_free_capacity_on_release() {
    let limiter = Arc::new(RateLimiter::new(5, Duration::from_secs(1)).unwrap());
    let transport = Arc::new(RecordingTransport::new(Duration::ZERO, 200, "ok"));
    let pipeline = Arc::new(SubmissionPipeline::new(limiter.clone(), transport.clone(), URL));
    let start = Instant::now();

    for handle in spawn_submissions(&pipeline, 10) {
        handle.await.unwrap().unwrap();
    }

    // Every call finished before the first tick; released permits were reused.
    assert!(transport.started().iter().all(|at| *at - start < Duration::from_secs(1)));
    assert_eq!(limiter.available(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_capacity_calls_proceed_and_one_more_blocks() {
    let limiter = Arc::new(RateLimiter::new(3, Duration::from_secs(3600)).unwrap());
    let transport = Arc::new(RecordingTransport::new(Duration::from_secs(10), 200, "ok"));
    let pipeline = Arc::new(SubmissionPipeline::new(limiter.clone(), transport.clone(), URL));

    let first = spawn_submissions(&pipeline, 3);
    tokio::time::sleep(Duration::from_millis(1)).await;
    assert_eq!(transport.started().len(), 3);
    assert_eq!(limiter.available(), 0);

    let extra = spawn_submissions(&pipeline, 1);
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(transport.started().len(), 3);

    for handle in first.into_iter().chain(extra) {
        handle.await.unwrap().unwrap();
    }
    assert_eq!(transport.started().len(), 4);
}

#[tokio::test]
async fn test_server_error_is_returned_and_permit_released() {
    let gate = Arc::new(InstrumentedGate::new(1, Duration::from_secs(3600)));
    let transport = Arc::new(RecordingTransport::new(Duration::ZERO, 500, "error"));
    let pipeline = SubmissionPipeline::new(gate.clone(), transport, URL);

    let response = pipeline.submit(&Document::sample(), "test").await.unwrap();

    assert_eq!(response.status, 500);
    assert_eq!(response.body, "error");
    assert!(!response.is_success());
    assert_eq!(gate.released.load(Ordering::SeqCst), 1);
    assert_eq!(gate.inner.available(), 1);
}

#[tokio::test]
async fn test_serialization_failure_does_not_leak_permit() {
    // A single permit and no refill within the test: a leak would hang the second call.
    let gate = Arc::new(InstrumentedGate::new(1, Duration::from_secs(3600)));
    let transport = Arc::new(RecordingTransport::new(Duration::ZERO, 200, "ok"));
    let pipeline = SubmissionPipeline::new(gate.clone(), transport.clone(), URL);

    let err = pipeline.submit(&Malformed, "test").await.unwrap_err();
    assert!(matches!(err, CrptError::Serialization(_)));
    assert!(transport.started().is_empty());

    let response = tokio::time::timeout(
        Duration::from_secs(5),
        pipeline.submit(&Document::sample(), "test"),
    )
    .await
    .expect("permit was not released after serialization failure")
    .unwrap();
    assert_eq!(response.status, 200);

    assert_eq!(gate.acquired.load(Ordering::SeqCst), 2);
    assert_eq!(gate.released.load(Ordering::SeqCst), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_release_count_matches_acquire_count_under_load() {
    let gate = Arc::new(InstrumentedGate::new(4, Duration::from_millis(20)));
    let transport = Arc::new(RecordingTransport::new(Duration::from_millis(2), 200, "ok"));
    let pipeline = Arc::new(SubmissionPipeline::new(gate.clone(), transport.clone(), URL));

    for handle in spawn_submissions(&pipeline, 40) {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(transport.started().len(), 40);
    assert_eq!(gate.acquired.load(Ordering::SeqCst), 40);
    assert_eq!(gate.released.load(Ordering::SeqCst), 40);
    assert!(gate.inner.available() <= gate.inner.capacity());
}

#[tokio::test]
async fn test_close_rejects_queued_submissions() {
    let limiter = Arc::new(RateLimiter::new(1, Duration::from_secs(3600)).unwrap());
    let transport = Arc::new(RecordingTransport::new(Duration::ZERO, 200, "ok"));
    let pipeline = Arc::new(SubmissionPipeline::new(limiter.clone(), transport.clone(), URL));

    assert!(limiter.try_acquire());
    let queued = spawn_submissions(&pipeline, 2);
    tokio::task::yield_now().await;

    limiter.close().await;
    for handle in queued {
        assert!(matches!(handle.await.unwrap(), Err(CrptError::LimiterClosed)));
    }
    assert!(transport.started().is_empty());
}
