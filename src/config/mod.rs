//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)           command line flags
//!     → loader.rs (parse & deserialize)   │
//!     → validation.rs (semantic checks)   │
//!     → ServerConfig ◀────────────────────┘ (main.rs applies overrides)
//!     → shared via Arc to all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; the pipeline is built once from it
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    CorsConfig, CorsMode, Environment, ListenerConfig, LogFormat, ObservabilityConfig,
    RateLimitConfig, SecurityConfig, ServerConfig, TimeoutConfig,
};
pub use validation::{validate_config, ValidationError};
