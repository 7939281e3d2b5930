//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → loader.rs (environment overrides: LOG_LEVEL, PORT)
//!     → validation.rs (semantic checks)
//!     → AppConfig (validated, immutable)
//!     → shared by value with the server at startup
//! ```
//!
//! # Design Decisions
//! - Config is read once at process start; there is no hot reload
//! - All fields have defaults so a missing file is a valid config
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{AppConfig, LimitsConfig, ListenerConfig, ObservabilityConfig, TimeoutConfig};
pub use validation::{validate_config, ValidationError};
