//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML/YAML)
//!     → loader.rs (parse & deserialize, normalize context paths)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → shared via Arc with the gateway and the introspection API
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; the upstream set never changes at runtime
//! - Optional fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError, ConfigFormat};
pub use schema::{GatewayConfig, HealthCheckConfig, LogFormat, ObservabilityConfig, ServerConfig};
pub use validation::ValidationError;
