//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request (rate limit interceptor):
//!     → client_ip.rs (derive the client key from headers or peer address)
//!     → rate_limit.rs (take a token from that client's bucket)
//!     → Pass to authentication
//! ```
//!
//! # Design Decisions
//! - Forwarding headers group clients; they are never trusted for anything else
//! - One lock around the registry; no I/O while it is held
//! - Idle clients are evicted by a background sweep

pub mod client_ip;
pub mod rate_limit;

pub use client_ip::client_key;
pub use rate_limit::RateLimiter;
