//! Session verification and route guard configuration

use crate::error::ConfigResult;
use crate::validation::{
    validate_app_path, validate_positive, validate_range, validate_required_string, Validatable,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Upper bound on how many principals are fetched from the identity provider per page
pub const MAX_LIST_PAGE_SIZE: usize = 500;

/// Longest lifetime a minted session token may have (30 days)
pub const MAX_TOKEN_EXPIRY_SECS: u64 = 30 * 24 * 60 * 60;

/// Signing secret shipped for local development; refused unless `dev_mode` is set
pub const DEV_SESSION_SECRET: &str = "secureaware-development-secret-change-me";

/// Access control configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessConfig {
    /// Session token settings
    #[serde(default)]
    pub session: SessionConfig,

    /// Where unauthenticated requests are sent
    #[serde(default = "default_sign_in_path")]
    pub sign_in_path: String,

    /// Default landing page for authenticated users
    #[serde(default = "default_landing_path")]
    pub landing_path: String,

    /// Path patterns that bypass authentication entirely
    #[serde(default = "default_public_paths")]
    pub public_paths: Vec<String>,

    /// Where the route guard reads the caller's role from
    #[serde(default)]
    pub role_source: RoleSource,

    /// Oldest session token whose role claim is still trusted when `role_source` is `claims`
    #[serde(with = "crate::domains::utils::serde_duration", default = "default_claims_max_age")]
    pub claims_max_age: Duration,

    /// Page size used when enumerating principals
    #[serde(default = "default_list_page_size")]
    pub list_page_size: usize,
}

/// Source of truth for the caller's role at request time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RoleSource {
    /// Re-resolve the role from the identity provider on every request
    #[default]
    Identity,
    /// Trust the session token's role claim while it is younger than `claims_max_age`
    Claims,
}

/// Session token configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// HMAC secret used to sign and verify session tokens
    #[serde(default = "default_session_secret")]
    pub secret: String,

    /// Token issuer
    #[serde(default = "default_issuer")]
    pub issuer: String,

    /// Token audience
    #[serde(default = "default_audience")]
    pub audience: String,

    /// Lifetime of minted tokens
    #[serde(with = "crate::domains::utils::serde_duration", default = "default_token_expiry")]
    pub token_expiry: Duration,

    /// Cookie consulted when no bearer token is present
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,

    /// Accept the built-in development secret
    #[serde(default = "crate::domains::utils::default_false")]
    pub dev_mode: bool,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            sign_in_path: default_sign_in_path(),
            landing_path: default_landing_path(),
            public_paths: default_public_paths(),
            role_source: RoleSource::default(),
            claims_max_age: default_claims_max_age(),
            list_page_size: default_list_page_size(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            secret: default_session_secret(),
            issuer: default_issuer(),
            audience: default_audience(),
            token_expiry: default_token_expiry(),
            cookie_name: default_cookie_name(),
            dev_mode: false,
        }
    }
}

impl Validatable for AccessConfig {
    fn validate(&self) -> ConfigResult<()> {
        self.session.validate()?;
        validate_app_path(&self.sign_in_path, "sign_in_path", self.domain_name())?;
        validate_app_path(&self.landing_path, "landing_path", self.domain_name())?;

        for pattern in &self.public_paths {
            if !pattern.starts_with('/') {
                return Err(self.validation_error(format!(
                    "public path pattern '{}' must start with '/'",
                    pattern
                )));
            }
        }

        // The sign-in page must stay reachable without a session or every redirect loops
        if !self.public_paths.iter().any(|p| covers(p, &self.sign_in_path)) {
            return Err(self.validation_error(format!(
                "sign_in_path '{}' must be covered by public_paths",
                self.sign_in_path
            )));
        }

        validate_positive(self.claims_max_age.as_secs(), "claims_max_age", self.domain_name())?;
        validate_range(
            self.list_page_size,
            1,
            MAX_LIST_PAGE_SIZE,
            "list_page_size",
            self.domain_name(),
        )?;
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "access"
    }
}

impl Validatable for SessionConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_required_string(&self.secret, "secret", self.domain_name())?;
        if self.secret.len() < 16 {
            return Err(self.validation_error("secret must be at least 16 bytes"));
        }
        if self.secret == DEV_SESSION_SECRET && !self.dev_mode {
            return Err(self.validation_error(
                "secret is the built-in development secret; set a real secret or enable dev_mode",
            ));
        }
        validate_required_string(&self.issuer, "issuer", self.domain_name())?;
        validate_required_string(&self.audience, "audience", self.domain_name())?;
        validate_required_string(&self.cookie_name, "cookie_name", self.domain_name())?;
        validate_range(
            self.token_expiry.as_secs(),
            1,
            MAX_TOKEN_EXPIRY_SECS,
            "token_expiry",
            self.domain_name(),
        )?;
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "access.session"
    }
}

/// Literal check for the common `/prefix(.*)` pattern shape
fn covers(pattern: &str, path: &str) -> bool {
    match pattern.strip_suffix("(.*)") {
        Some(prefix) => path.starts_with(prefix),
        None => pattern == path,
    }
}

fn default_sign_in_path() -> String {
    "/sign-in".to_string()
}

fn default_landing_path() -> String {
    "/dashboard".to_string()
}

fn default_public_paths() -> Vec<String> {
    vec![
        "/".to_string(),
        "/sign-in(.*)".to_string(),
        "/sign-up(.*)".to_string(),
        "/api/webhooks/clerk".to_string(),
    ]
}

fn default_claims_max_age() -> Duration {
    Duration::from_secs(60)
}

fn default_list_page_size() -> usize {
    100
}

fn default_session_secret() -> String {
    DEV_SESSION_SECRET.to_string()
}

fn default_issuer() -> String {
    "secureaware".to_string()
}

fn default_audience() -> String {
    "secureaware-portal".to_string()
}

fn default_token_expiry() -> Duration {
    Duration::from_secs(8 * 60 * 60)
}

fn default_cookie_name() -> String {
    "__session".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dev_config() -> AccessConfig {
        let mut config = AccessConfig::default();
        config.session.dev_mode = true;
        config
    }

    #[test]
    fn test_default_access_config() {
        let config = dev_config();
        assert!(config.validate().is_ok());
        assert_eq!(config.role_source, RoleSource::Identity);
        assert_eq!(config.list_page_size, 100);
    }

    #[test]
    fn test_dev_secret_requires_dev_mode() {
        let config = AccessConfig::default();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("development secret"));

        let mut config = AccessConfig::default();
        config.session.secret = "a-deployment-specific-signing-key".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_token_expiry_bounds() {
        let mut config = dev_config();
        config.session.token_expiry = Duration::from_secs(MAX_TOKEN_EXPIRY_SECS + 1);
        assert!(config.validate().is_err());

        config.session.token_expiry = Duration::from_secs(u64::MAX);
        assert!(config.validate().is_err());

        config.session.token_expiry = Duration::from_secs(MAX_TOKEN_EXPIRY_SECS);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_sign_in_must_be_public() {
        let config = AccessConfig {
            public_paths: vec!["/".to_string()],
            ..dev_config()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("sign_in_path"));
    }

    #[test]
    fn test_page_size_bounds() {
        let config = AccessConfig {
            list_page_size: MAX_LIST_PAGE_SIZE + 1,
            ..dev_config()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_short_secret_rejected() {
        let mut config = dev_config();
        config.session.secret = "short".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_role_source_serde() {
        let source: RoleSource = serde_yaml::from_str("claims").unwrap();
        assert_eq!(source, RoleSource::Claims);
    }
}
