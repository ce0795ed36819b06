//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (method, path)
//!     → router.rs (scan the table in order)
//!     → matcher.rs (segment match, capture :params)
//!     → Return: route gates + handler, or 404 / 405
//!
//! Route Compilation (at startup):
//!     api::routes()
//!     → Compile path patterns
//!     → Freeze as immutable Router
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex in hot path (segment matching only)
//! - Deterministic: same input always matches same route
//! - First full match wins (table order)

pub mod matcher;
pub mod router;

pub use matcher::PathPattern;
pub use router::{Handler, Route, Router};
