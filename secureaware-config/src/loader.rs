//! Configuration loading and environment variable handling

use crate::domains::SecureAwareConfig;
use crate::error::{ConfigError, ConfigResult};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Configuration loader with environment variable support
pub struct ConfigLoader {
    /// Environment variable prefix
    prefix: String,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Create a new config loader with default prefix
    pub fn new() -> Self {
        Self {
            prefix: "SECUREAWARE".to_string(),
        }
    }

    /// Create a new config loader with custom prefix
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Load configuration from a YAML file with environment overrides
    pub fn from_file(&self, path: impl AsRef<Path>) -> ConfigResult<SecureAwareConfig> {
        let content = std::fs::read_to_string(path)?;
        let mut config: SecureAwareConfig = serde_yaml::from_str(&content)?;

        self.apply_env_overrides(&mut config)?;
        config.validate_all()?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env(&self) -> ConfigResult<SecureAwareConfig> {
        let mut config = SecureAwareConfig::default();
        self.apply_env_overrides(&mut config)?;
        config.validate_all()?;
        Ok(config)
    }

    /// Load configuration with fallback chain
    pub fn load(&self, config_path: Option<impl AsRef<Path>>) -> ConfigResult<SecureAwareConfig> {
        match config_path {
            Some(path) => self.from_file(path),
            None => self.from_env(),
        }
    }

    fn apply_env_overrides(&self, config: &mut SecureAwareConfig) -> ConfigResult<()> {
        self.apply_server_overrides(&mut config.server)?;
        self.apply_logging_overrides(&mut config.logging)?;
        self.apply_access_overrides(&mut config.access)?;
        Ok(())
    }

    fn apply_server_overrides(
        &self,
        config: &mut crate::domains::server::ServerConfig,
    ) -> ConfigResult<()> {
        if let Ok(address) = self.get_env_var("BIND_ADDRESS") {
            config.bind_address = address;
        }

        if let Some(port) = self.parse_env_var::<u16>("PORT")? {
            config.port = port;
        }

        Ok(())
    }

    fn apply_logging_overrides(
        &self,
        config: &mut crate::domains::logging::LoggingConfig,
    ) -> ConfigResult<()> {
        if let Ok(level) = self.get_env_var("LOG_LEVEL") {
            config.level = level
                .parse()
                .map_err(|_| ConfigError::EnvError(format!("Invalid LOG_LEVEL: {}", level)))?;
        }

        if let Ok(format) = self.get_env_var("LOG_FORMAT") {
            config.format = format
                .parse()
                .map_err(|_| ConfigError::EnvError(format!("Invalid LOG_FORMAT: {}", format)))?;
        }

        Ok(())
    }

    fn apply_access_overrides(
        &self,
        config: &mut crate::domains::access::AccessConfig,
    ) -> ConfigResult<()> {
        if let Ok(secret) = self.get_env_var("SESSION_SECRET") {
            config.session.secret = secret;
        }

        if let Some(dev_mode) = self.parse_env_var::<bool>("SESSION_DEV_MODE")? {
            config.session.dev_mode = dev_mode;
        }

        if let Ok(source) = self.get_env_var("ROLE_SOURCE") {
            config.role_source = match source.to_lowercase().as_str() {
                "identity" => crate::domains::access::RoleSource::Identity,
                "claims" => crate::domains::access::RoleSource::Claims,
                _ => {
                    return Err(ConfigError::EnvError(format!("Invalid ROLE_SOURCE: {}", source)))
                }
            };
        }

        if let Some(seconds) = self.parse_env_var::<u64>("CLAIMS_MAX_AGE_SECONDS")? {
            config.claims_max_age = Duration::from_secs(seconds);
        }

        if let Some(page_size) = self.parse_env_var::<usize>("LIST_PAGE_SIZE")? {
            config.list_page_size = page_size;
        }

        Ok(())
    }

    /// Get environment variable with prefix
    fn get_env_var(&self, name: &str) -> Result<String, std::env::VarError> {
        std::env::var(format!("{}_{}", self.prefix, name))
    }

    fn parse_env_var<T>(&self, name: &str) -> ConfigResult<Option<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get_env_var(name) {
            Ok(raw) => raw
                .parse()
                .map(Some)
                .map_err(|e| ConfigError::EnvError(format!("Invalid {}: {}", name, e))),
            Err(_) => Ok(None),
        }
    }
}
