//! Shutdown triggers.
//!
//! # Responsibilities
//! - Listen for SIGTERM and SIGINT
//! - Fan a single shutdown request out to the server and its helpers
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - A handler that fails to install is logged and disabled, not fatal
//! - Only the first trigger counts; a second Ctrl-C does not restart the drain

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;

/// Handle that asks the server, the limiter sweeper and anything else
/// subscribed to stop. Clones share one channel.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: broadcast::Sender<()>,
    triggered: Arc<AtomicBool>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self {
            tx,
            triggered: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Request shutdown. Returns `false` if it was already requested.
    pub fn trigger(&self, reason: &str) -> bool {
        if self.triggered.swap(true, Ordering::AcqRel) {
            tracing::debug!(reason, "Shutdown already in progress");
            return false;
        }
        tracing::info!(reason, subscribers = self.tx.receiver_count(), "Shutdown triggered");
        let _ = self.tx.send(());
        true
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::Acquire)
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve on the first termination signal, returning its name.
pub async fn wait_for_signal() -> &'static str {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "Failed to install SIGINT handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => "SIGINT",
        () = sigterm => "SIGTERM",
    }
}

/// Trigger `shutdown` once a termination signal arrives.
pub async fn shutdown_on_signal(shutdown: Shutdown) {
    let signal = wait_for_signal().await;
    shutdown.trigger(signal);
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast::error::TryRecvError;

    #[tokio::test]
    async fn test_every_subscriber_hears_the_trigger() {
        let shutdown = Shutdown::new();
        let mut server = shutdown.subscribe();
        let mut sweeper = shutdown.clone().subscribe();

        assert!(shutdown.trigger("SIGTERM"));
        assert!(server.recv().await.is_ok());
        assert!(sweeper.recv().await.is_ok());
    }

    #[tokio::test]
    async fn test_second_trigger_is_ignored() {
        let shutdown = Shutdown::new();
        let mut rx = shutdown.subscribe();
        assert!(!shutdown.is_triggered());

        assert!(shutdown.trigger("SIGINT"));
        assert!(!shutdown.clone().trigger("SIGINT"));
        assert!(shutdown.is_triggered());

        assert!(rx.recv().await.is_ok());
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
    }
}
