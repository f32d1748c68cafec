//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → CLI overrides (main.rs)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!     → AllowList / DenialRenderer built once and shared via Arc
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; the allow-list never changes at runtime
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    DenialConfig, ListenerConfig, MitmConfig, ObservabilityConfig, PolicyConfig, ProxyConfig,
    TimeoutConfig,
};
pub use validation::{validate_config, ValidationError};
