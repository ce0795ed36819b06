//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection (axum, request-id and trace layers)
//!     → server.rs (the chain is the single fallback service)
//!     → middleware/ (fixed interceptor stages)
//!     → routing::Router (route gates, then the handler)
//!     → json.rs / decode.rs (read and classify request bodies)
//!     → error.rs (every failure becomes the JSON error envelope)
//!     → response.rs (status and byte accounting on the way out)
//! ```

pub mod decode;
pub mod error;
pub mod json;
pub mod middleware;
pub mod request;
pub mod response;
pub mod server;

pub use error::ApiError;
pub use request::{PathParams, RequestContext};
pub use server::{AppState, HttpServer, ShutdownReport};
