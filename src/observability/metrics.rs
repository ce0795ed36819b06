//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Count requests received and responses sent, per status
//! - Accumulate processing time
//! - Mirror every counter into the `metrics` facade for Prometheus scraping
//!
//! # Metrics
//! - `http_requests_received_total` (counter)
//! - `http_responses_sent_total` (counter): by status
//! - `http_request_duration_seconds` (histogram)
//! - `http_response_bytes_total` (counter)
//! - `http_rate_limited_total` (counter)
//! - `background_tasks_total` (counter): by outcome
//!
//! # Design Decisions
//! - Low-overhead updates (atomic operations); the status map is the only lock
//! - Active requests are derived, never stored

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use axum::http::StatusCode;
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use serde::Serialize;

const REQUESTS_RECEIVED: &str = "http_requests_received_total";
const RESPONSES_SENT: &str = "http_responses_sent_total";
const REQUEST_DURATION: &str = "http_request_duration_seconds";
const RESPONSE_BYTES: &str = "http_response_bytes_total";
const RATE_LIMITED: &str = "http_rate_limited_total";
const BACKGROUND_TASKS: &str = "background_tasks_total";

/// Process-wide request counters.
#[derive(Debug)]
pub struct RequestMetrics {
    started: Instant,
    received: AtomicU64,
    sent: AtomicU64,
    processing_us: AtomicU64,
    between_metrics_calls: AtomicU64,
    by_status: Mutex<BTreeMap<u16, u64>>,
}

/// Point-in-time copy of [`RequestMetrics`].
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub total_requests_received: u64,
    pub total_responses_sent: u64,
    pub active_requests: u64,
    pub total_processing_time_us: u64,
    pub requests_between_metrics_calls: u64,
    pub total_responses_sent_by_status: BTreeMap<u16, u64>,
}

impl Default for RequestMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestMetrics {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            received: AtomicU64::new(0),
            sent: AtomicU64::new(0),
            processing_us: AtomicU64::new(0),
            between_metrics_calls: AtomicU64::new(0),
            by_status: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
        self.between_metrics_calls.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(REQUESTS_RECEIVED).increment(1);
    }

    pub fn record_sent(&self, status: StatusCode, elapsed: Duration) {
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.processing_us.fetch_add(micros, Ordering::Relaxed);
        *self
            .by_status
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(status.as_u16())
            .or_insert(0) += 1;
        self.sent.fetch_add(1, Ordering::Relaxed);

        metrics::counter!(RESPONSES_SENT, "status" => status.as_u16().to_string()).increment(1);
        metrics::histogram!(REQUEST_DURATION).record(elapsed.as_secs_f64());
    }

    /// Requests received but not yet answered.
    pub fn active(&self) -> u64 {
        let sent = self.sent.load(Ordering::Relaxed);
        self.received.load(Ordering::Relaxed).saturating_sub(sent)
    }

    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }

    /// Read the counter of requests since the last metrics call and reset it.
    pub fn take_between_metrics_calls(&self) -> u64 {
        self.between_metrics_calls.swap(0, Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let by_status = self
            .by_status
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let sent = self.sent.load(Ordering::Relaxed);
        let received = self.received.load(Ordering::Relaxed);
        MetricsSnapshot {
            total_requests_received: received,
            total_responses_sent: sent,
            active_requests: received.saturating_sub(sent),
            total_processing_time_us: self.processing_us.load(Ordering::Relaxed),
            requests_between_metrics_calls: self.between_metrics_calls.load(Ordering::Relaxed),
            total_responses_sent_by_status: by_status,
        }
    }
}

/// Install the Prometheus exporter, scrapeable at `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Prometheus exporter listening");
    Ok(())
}

pub fn record_rate_limited() {
    metrics::counter!(RATE_LIMITED).increment(1);
}

pub fn record_response_bytes(len: usize) {
    metrics::counter!(RESPONSE_BYTES).increment(len as u64);
}

pub fn record_background_task(outcome: &'static str) {
    metrics::counter!(BACKGROUND_TASKS, "outcome" => outcome).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_and_active() {
        let m = RequestMetrics::new();
        for _ in 0..3 {
            m.record_received();
        }
        m.record_sent(StatusCode::OK, Duration::from_micros(250));
        m.record_sent(StatusCode::OK, Duration::from_micros(750));
        assert_eq!(m.active(), 1);

        let snap = m.snapshot();
        assert_eq!(snap.total_requests_received, 3);
        assert_eq!(snap.total_responses_sent, 2);
        assert_eq!(snap.total_processing_time_us, 1000);
        assert_eq!(snap.total_responses_sent_by_status[&200], 2);
    }

    #[test]
    fn test_between_calls_resets() {
        let m = RequestMetrics::new();
        m.record_received();
        m.record_received();
        assert_eq!(m.take_between_metrics_calls(), 2);
        assert_eq!(m.take_between_metrics_calls(), 0);
        assert_eq!(m.snapshot().total_requests_received, 2);
    }

    #[test]
    fn test_snapshot_serializes_status_keys_as_strings() {
        let m = RequestMetrics::new();
        m.record_received();
        m.record_sent(StatusCode::NOT_FOUND, Duration::ZERO);
        let json = serde_json::to_value(m.snapshot()).unwrap();
        assert_eq!(json["total_responses_sent_by_status"]["404"], 1);
    }
}
