//! Role-based access control and compliance policy for the SecureAware portal
//!
//! This crate provides:
//! - A static two-role permission catalog and per-role compliance requirements
//! - A typed adapter over the external identity provider
//! - Fail-closed permission and compliance evaluators
//! - An axum route guard that redirects unauthenticated or unauthorized requests
//! - Audited role administration

pub mod adapter;
pub mod admin;
pub mod audit;
pub mod compliance;
pub mod error;
pub mod memory;
pub mod metadata;
pub mod middleware;
pub mod models;
pub mod permissions;
pub mod policies;
pub mod roles;
pub mod routes;
pub mod session;

pub use adapter::{IdentityAdapter, IdentityProvider, MetadataUpdate};
pub use admin::{PrincipalSummary, RoleAdministrator, RoleAssignment};
pub use audit::{AuditAction, AuditLogStore, RoleAuditEntry};
pub use compliance::{ComplianceEvaluator, ComplianceStatus, ComplianceVerdict};
pub use error::{AdminError, AuditError, IdentityError, RbacError, RbacResult, SessionError};
pub use metadata::{MetadataBag, MetadataPatch, PrincipalMetadata};
pub use middleware::{
    protect, route_guard_middleware, DenyReason, GuardDecision, RequestIdentity, RouteGuard,
    USER_ID_HEADER, USER_ROLE_HEADER,
};
pub use models::{IdentityRecord, Principal, Subject};
pub use permissions::{PermissionCheck, PermissionChecker};
pub use policies::{requirements_for, ComplianceRequirements};
pub use roles::{permissions_for, Permission, PermissionCategory, Role};
pub use routes::{RoutePattern, RouteProtectionRule, RouteTable};
pub use session::{SessionClaims, SessionVerifier};
