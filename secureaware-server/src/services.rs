//! Shared application state and the development user directory

use anyhow::{Context, Result};
use secureaware_config::SecureAwareConfig;
use secureaware_rbac::{
    memory::{InMemoryAuditLog, InMemoryIdentityProvider},
    AuditLogStore, ComplianceEvaluator, IdentityAdapter, IdentityProvider, IdentityRecord,
    PermissionChecker, RbacResult, RoleAdministrator, RouteGuard, RouteTable,
};
use std::path::Path;
use std::sync::Arc;

/// Services shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub permissions: PermissionChecker,
    pub compliance: ComplianceEvaluator,
    pub admin: RoleAdministrator,
    pub guard: Arc<RouteGuard>,
}

impl AppState {
    pub fn new(
        config: &SecureAwareConfig,
        provider: Arc<dyn IdentityProvider>,
        audit: Arc<dyn AuditLogStore>,
    ) -> RbacResult<Self> {
        let identity = IdentityAdapter::new(provider);
        let routes = RouteTable::standard(&config.access.landing_path)?;
        let guard = RouteGuard::new(&config.access, routes, identity.clone())?;

        Ok(Self {
            permissions: PermissionChecker::new(identity.clone()),
            compliance: ComplianceEvaluator::new(identity.clone()),
            admin: RoleAdministrator::new(identity, audit)
                .with_page_size(config.access.list_page_size),
            guard: Arc::new(guard),
        })
    }

    /// State over in-memory collaborators seeded with `users`
    pub fn in_memory(config: &SecureAwareConfig, users: Vec<IdentityRecord>) -> RbacResult<Self> {
        Self::new(
            config,
            Arc::new(InMemoryIdentityProvider::with_users(users)),
            Arc::new(InMemoryAuditLog::new()),
        )
    }
}

/// Read a YAML list of users
pub fn load_users(path: impl AsRef<Path>) -> Result<Vec<IdentityRecord>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read user directory {}", path.display()))?;
    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse user directory {}", path.display()))
}

/// Built-in directory used when no user file is given
pub fn demo_users() -> Result<Vec<IdentityRecord>> {
    serde_yaml::from_str(include_str!("../fixtures/users.yaml"))
        .context("Built-in user directory is malformed")
}
