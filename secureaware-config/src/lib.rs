//! Domain-driven configuration management for SecureAware
//!
//! Configuration is split by functional domain (server, logging, access),
//! each with its own defaults and validation, and can be loaded from YAML
//! with `SECUREAWARE_*` environment overrides.

pub mod domains;
pub mod error;
pub mod loader;
pub mod validation;

pub use domains::{
    access::{AccessConfig, RoleSource, SessionConfig, DEV_SESSION_SECRET},
    logging::{LogFormat, LogLevel, LoggingConfig},
    server::ServerConfig,
    SecureAwareConfig,
};
pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;
pub use validation::Validatable;
