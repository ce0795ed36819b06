//! Timeout enforcement for collaborator calls.
//!
//! # Responsibilities
//! - Wrap every identity, permission and store call with a fixed deadline
//! - Turn an elapsed deadline into `StoreError::Timeout`
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - Timeout errors are distinct from other errors and surface as 500
//! - Nothing here retries; a stalled collaborator fails the one request

use std::future::Future;
use std::time::Duration;

use crate::store::StoreError;

/// Await `call`, failing with [`StoreError::Timeout`] once `limit` elapses.
pub async fn call_with_deadline<T, F>(limit: Duration, call: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(timeout_ms = limit.as_millis() as u64, "collaborator call timed out");
            Err(StoreError::Timeout(limit))
        }
    }
}
