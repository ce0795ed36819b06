//! Background task tracking.
//!
//! # Responsibilities
//! - Run fire-and-forget work on its own task, with its own fault boundary
//! - Count outstanding tasks so shutdown can wait for them
//!
//! # Design Decisions
//! - The count is incremented before the task is spawned
//! - A drop guard decrements it, on success, error and panic alike
//! - Waiting uses a watch channel, so `drain` never polls

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use tokio::sync::watch;
use tokio::time::{self, Instant};

use crate::observability::metrics as telemetry;

/// How a drain ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    Drained,
    TimedOut { outstanding: usize },
}

/// Counted set of outstanding background tasks. Cheap to clone.
#[derive(Debug, Clone)]
pub struct TaskTracker {
    outstanding: Arc<watch::Sender<usize>>,
}

impl Default for TaskTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Decrements the outstanding count when dropped.
struct TaskGuard {
    outstanding: Arc<watch::Sender<usize>>,
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.outstanding.send_modify(|n| *n = n.saturating_sub(1));
    }
}

impl TaskTracker {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(0);
        Self {
            outstanding: Arc::new(tx),
        }
    }

    pub fn outstanding(&self) -> usize {
        *self.outstanding.borrow()
    }

    /// Spawn `task`. A panic inside it is logged and goes no further.
    pub fn spawn<F>(&self, name: &'static str, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.outstanding.send_modify(|n| *n += 1);
        let guard = TaskGuard {
            outstanding: self.outstanding.clone(),
        };

        tokio::spawn(async move {
            let _guard = guard;
            match AssertUnwindSafe(task).catch_unwind().await {
                Ok(()) => telemetry::record_background_task("completed"),
                Err(payload) => {
                    tracing::error!(task = name, panic = %panic_message(payload.as_ref()), "Background task panicked");
                    telemetry::record_background_task("panicked");
                }
            }
        });
    }

    /// Wait until nothing is outstanding or `deadline` passes.
    pub async fn drain(&self, deadline: Instant) -> DrainOutcome {
        let mut rx = self.outstanding.subscribe();
        let drained = time::timeout_at(deadline, rx.wait_for(|n| *n == 0)).await.is_ok();
        if drained {
            DrainOutcome::Drained
        } else {
            DrainOutcome::TimedOut {
                outstanding: self.outstanding(),
            }
        }
    }
}

/// Best-effort text of a panic payload.
pub fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
