//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Validate config → Install exporter → Bind listener → Build server
//!
//! Running (state.rs):
//!     Starting → Accepting → Draining → Stopped
//!
//! Shutdown (signals.rs):
//!     SIGTERM/SIGINT → broadcast → stop accepting
//!     → drain connections and background tasks (tasks.rs) → Stopped
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, listener last
//! - Shutdown has one deadline; overrunning it is logged, never fatal
//! - Background tasks are counted so shutdown knows what it waits for

pub mod signals;
pub mod startup;
pub mod state;
pub mod tasks;

pub use signals::Shutdown;
pub use state::{Lifecycle, LifecycleState};
pub use tasks::{DrainOutcome, TaskTracker};
