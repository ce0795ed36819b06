//! Outbound user notifications.
//!
//! Handlers never deliver inline; they hand a [`Notification`] to
//! [`deliver`] inside a tracked background task so shutdown can wait for it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

const DELIVERY_ATTEMPTS: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),

    #[error("recipient rejected: {0}")]
    Rejected(String),
}

/// A message to one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// Sent after registration; carries the activation token plaintext.
    Welcome {
        user_id: i64,
        name: String,
        activation_token: String,
    },
}

impl Notification {
    pub fn subject(&self) -> &'static str {
        match self {
            Notification::Welcome { .. } => "Welcome! Please activate your account",
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, recipient: &str, notification: &Notification) -> Result<(), NotifyError>;
}

/// Writes notifications to the log instead of delivering them.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, recipient: &str, notification: &Notification) -> Result<(), NotifyError> {
        match notification {
            Notification::Welcome {
                user_id,
                name,
                activation_token,
            } => tracing::info!(
                recipient,
                subject = notification.subject(),
                user_id,
                name = %name,
                activation_token = %token_hint(activation_token),
                "Notification written to log"
            ),
        }
        Ok(())
    }
}

/// The first few characters of a token, enough to match it up in logs.
fn token_hint(token: &str) -> String {
    let prefix: String = token.chars().take(4).collect();
    format!("{prefix}...")
}

/// Send `notification`, retrying transient failures a few times.
pub async fn deliver(notifier: Arc<dyn Notifier>, recipient: String, notification: Notification) {
    for attempt in 1..=DELIVERY_ATTEMPTS {
        match notifier.send(&recipient, &notification).await {
            Ok(()) => return,
            Err(err) if attempt < DELIVERY_ATTEMPTS => {
                tracing::warn!(attempt, error = %err, "Notification delivery failed, retrying");
                tokio::time::sleep(RETRY_DELAY).await;
            }
            Err(err) => {
                tracing::error!(attempts = attempt, error = %err, "Notification delivery failed");
            }
        }
    }
}
