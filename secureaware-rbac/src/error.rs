//! Error types for RBAC operations
//!
//! These errors stay inside the crate's internal plumbing. The public
//! evaluator operations are total and turn every error into a deny.

use thiserror::Error;

use crate::roles::Permission;

/// Result type for RBAC operations
pub type RbacResult<T> = Result<T, RbacError>;

/// RBAC-specific errors
#[derive(Error, Debug)]
pub enum RbacError {
    /// Identity provider call failed
    #[error("Identity provider error: {0}")]
    Identity(#[from] IdentityError),

    /// No principal with this id exists
    #[error("Principal not found: {principal_id}")]
    PrincipalNotFound { principal_id: String },

    /// Audit store call failed
    #[error("Audit log error: {0}")]
    Audit(#[from] AuditError),

    /// Session token could not be verified
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// A route pattern failed to compile
    #[error("Invalid route pattern '{pattern}': {message}")]
    InvalidRoutePattern { pattern: String, message: String },

    /// Invalid configuration
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },
}

impl RbacError {
    /// Create a new invalid config error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::PrincipalNotFound { .. } | Self::Identity(IdentityError::UserNotFound { .. })
        )
    }
}

/// Errors reported by an identity provider
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    /// The provider could not be reached or timed out
    #[error("identity provider unavailable: {message}")]
    Unavailable { message: String },

    /// The provider has no user with this id
    #[error("user not found: {user_id}")]
    UserNotFound { user_id: String },

    /// The provider refused the request (quota, validation, ...)
    #[error("identity provider rejected request: {message}")]
    Rejected { message: String },
}

impl IdentityError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }
}

/// Errors reported by the audit log store
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuditError {
    #[error("audit store unavailable: {message}")]
    Unavailable { message: String },
}

/// Session token errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("session token is missing")]
    Missing,

    #[error("session token has expired")]
    Expired,

    #[error("session token is invalid: {message}")]
    Invalid { message: String },

    #[error("failed to encode session token: {message}")]
    Encoding { message: String },
}

/// Role administration failures, returned to the acting admin
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AdminError {
    #[error("{acting_id} lacks the {permission} permission")]
    InsufficientPermission {
        acting_id: String,
        permission: Permission,
    },

    #[error("principals cannot change their own role")]
    SelfRoleChange,

    #[error("target principal not found: {target_id}")]
    TargetNotFound { target_id: String },

    #[error("failed to write role: {reason}")]
    WriteFailed { reason: String },

    /// The role was written but the audit entry was not; `reverted` tells
    /// whether the previous role was restored
    #[error("failed to record audit entry (reverted: {reverted}): {reason}")]
    AuditFailed { reason: String, reverted: bool },

    #[error("failed to list principals: {reason}")]
    ListFailed { reason: String },
}
