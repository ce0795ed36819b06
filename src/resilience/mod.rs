//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Collaborator call from an interceptor or handler:
//!     → timeouts.rs (enforce the fixed collaborator deadline)
//!     → Ok / StoreError / StoreError::Timeout back to the caller
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - No retries at this layer; retrying is the collaborator's business

pub mod timeouts;

pub use timeouts::call_with_deadline;
