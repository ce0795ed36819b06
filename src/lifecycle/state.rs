//! Server lifecycle state machine.

use std::fmt;

use serde::Serialize;
use tokio::sync::watch;

/// Where the server is in its life. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    Starting,
    Accepting,
    Draining,
    Stopped,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Starting => "starting",
            LifecycleState::Accepting => "accepting",
            LifecycleState::Draining => "draining",
            LifecycleState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Observable holder of the current [`LifecycleState`].
#[derive(Debug)]
pub struct Lifecycle {
    tx: watch::Sender<LifecycleState>,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(LifecycleState::Starting);
        Self { tx }
    }

    pub fn current(&self) -> LifecycleState {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.tx.subscribe()
    }

    /// Move to `next` if it is ahead of the current state.
    ///
    /// Returns `false`, leaving the state untouched, for a backwards or repeated move.
    pub fn advance(&self, next: LifecycleState) -> bool {
        let moved = self.tx.send_if_modified(|current| {
            if next > *current {
                *current = next;
                true
            } else {
                false
            }
        });
        if moved {
            tracing::info!(state = %next, "Lifecycle state changed");
        }
        moved
    }
}
