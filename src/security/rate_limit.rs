//! Per-client token-bucket rate limiting.
//!
//! One bucket per client key lives in a single registry behind one mutex.
//! The lock covers only the map lookup and the token math; nothing awaits
//! while it is held. A periodic sweep evicts clients that have gone idle.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::{self, Instant};

use crate::config::RateLimitConfig;

/// A token bucket. Starts full; never holds more than its capacity.
#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(capacity: f64, now: Instant) -> Self {
        Self {
            tokens: capacity,
            last_refill: now,
        }
    }

    fn try_acquire(&mut self, capacity: f64, refill_rate: f64, now: Instant) -> bool {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();

        self.tokens = (self.tokens + elapsed * refill_rate).min(capacity);
        self.last_refill = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

#[derive(Debug)]
struct ClientRateState {
    bucket: TokenBucket,
    last_seen: Instant,
}

/// Registry of per-client buckets.
#[derive(Debug)]
pub struct RateLimiter {
    clients: Mutex<HashMap<String, ClientRateState>>,
    rate: f64,
    capacity: f64,
    idle_timeout: Duration,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self::with_limits(config.requests_per_second, config.burst_size, config.idle_timeout())
    }

    pub fn with_limits(requests_per_second: f64, burst_size: u32, idle_timeout: Duration) -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
            rate: requests_per_second,
            capacity: f64::from(burst_size),
            idle_timeout,
        }
    }

    /// Try to take one token for `key`. Returns `false` when the client is over its rate.
    pub fn admit(&self, key: &str) -> bool {
        self.admit_at(key, Instant::now())
    }

    pub fn admit_at(&self, key: &str, now: Instant) -> bool {
        let mut clients = self.lock();
        let state = clients
            .entry(key.to_string())
            .or_insert_with(|| ClientRateState {
                bucket: TokenBucket::new(self.capacity, now),
                last_seen: now,
            });
        state.last_seen = now;
        state.bucket.try_acquire(self.capacity, self.rate, now)
    }

    /// Evict clients idle for longer than the idle timeout. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    pub fn sweep_at(&self, now: Instant) -> usize {
        let mut clients = self.lock();
        let before = clients.len();
        clients.retain(|_, state| now.saturating_duration_since(state.last_seen) <= self.idle_timeout);
        before - clients.len()
    }

    /// Number of clients currently tracked.
    pub fn tracked_clients(&self) -> usize {
        self.lock().len()
    }

    pub fn is_tracked(&self, key: &str) -> bool {
        self.lock().contains_key(key)
    }

    /// Sweep every `period` until shutdown is signalled.
    pub async fn run_sweeper(self: Arc<Self>, period: Duration, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(interval_secs = period.as_secs(), "Rate limiter sweeper starting");

        let mut ticker = time::interval_at(Instant::now() + period, period);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let evicted = self.sweep();
                    if evicted > 0 {
                        tracing::debug!(evicted, remaining = self.tracked_clients(), "Evicted idle clients");
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Rate limiter sweeper received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    // The token math cannot leave the map half-updated, so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, ClientRateState>> {
        self.clients.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
