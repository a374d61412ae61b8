//! Role administration
//!
//! Every role change is permission-checked against the acting principal's
//! current role, written to the identity provider and recorded in the
//! audit store. A principal can never change their own role.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::adapter::IdentityAdapter;
use crate::audit::{AuditAction, AuditLogStore, RoleAuditEntry};
use crate::compliance;
use crate::error::AdminError;
use crate::metadata::MetadataPatch;
use crate::models::{Principal, Subject};
use crate::permissions::PermissionChecker;
use crate::policies::requirements_for;
use crate::roles::{Permission, Role};

const DEFAULT_PAGE_SIZE: usize = 100;

/// A completed role change
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoleAssignment {
    pub principal: Principal,
    pub previous_role: Role,
    pub new_role: Role,
    pub audit_entry: RoleAuditEntry,
}

/// One row of the admin user list
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrincipalSummary {
    pub id: String,
    pub email: String,
    pub role: Role,
    /// No readable role was stored, so `role` is the default
    pub role_defaulted: bool,
    pub role_assigned_at: Option<DateTime<Utc>>,
    pub role_assigned_by: Option<String>,
    pub has_2fa: bool,
    pub is_compliant: bool,
    pub missing_training: Vec<String>,
}

impl PrincipalSummary {
    fn from_principal(principal: Principal, now: DateTime<Utc>) -> Self {
        let is_compliant = compliance::evaluate(&principal, now).is_compliant();
        let missing_training =
            requirements_for(principal.role).missing_training(&principal.metadata.completed_training);

        let role_defaulted = principal.has_fallback_role();

        Self {
            id: principal.id,
            email: principal.email,
            role: principal.role,
            role_defaulted,
            role_assigned_at: principal.metadata.role_assigned_at,
            role_assigned_by: principal.metadata.role_assigned_by,
            has_2fa: principal.metadata.has_2fa,
            is_compliant,
            missing_training,
        }
    }
}

/// Admin operations on principals' roles
#[derive(Clone)]
pub struct RoleAdministrator {
    identity: IdentityAdapter,
    permissions: PermissionChecker,
    audit: Arc<dyn AuditLogStore>,
    page_size: usize,
}

impl RoleAdministrator {
    pub fn new(identity: IdentityAdapter, audit: Arc<dyn AuditLogStore>) -> Self {
        Self {
            permissions: PermissionChecker::new(identity.clone()),
            identity,
            audit,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Give `target_id` the role `new_role`.
    ///
    /// Re-assigning the current role succeeds and is audited like any other change.
    pub async fn assign_role(
        &self,
        target_id: &str,
        new_role: Role,
        acting_id: &str,
        reason: Option<String>,
    ) -> Result<RoleAssignment, AdminError> {
        self.change_role(target_id, new_role, acting_id, reason, AuditAction::RoleAssigned)
            .await
    }

    /// Return `target_id` to the default role
    pub async fn remove_role(&self, target_id: &str, acting_id: &str) -> Result<RoleAssignment, AdminError> {
        self.change_role(target_id, Role::DEFAULT, acting_id, None, AuditAction::RoleRemoved)
            .await
    }

    async fn change_role(
        &self,
        target_id: &str,
        new_role: Role,
        acting_id: &str,
        reason: Option<String>,
        action: AuditAction,
    ) -> Result<RoleAssignment, AdminError> {
        if target_id == acting_id {
            warn!("{} attempted to change their own role", acting_id);
            return Err(AdminError::SelfRoleChange);
        }

        self.require(acting_id, Permission::AssignRoles).await?;

        let target = self
            .identity
            .resolve(Subject::Id(target_id))
            .await
            .map_err(|e| {
                if e.is_not_found() {
                    AdminError::TargetNotFound {
                        target_id: target_id.to_string(),
                    }
                } else {
                    AdminError::WriteFailed {
                        reason: format!("could not read target: {}", e),
                    }
                }
            })?;
        let previous_role = target.role;

        let patch = MetadataPatch::new()
            .role(new_role)
            .role_assigned(acting_id, Utc::now());
        let updated = self
            .identity
            .try_update_metadata(target_id, &patch)
            .await
            .map_err(|e| AdminError::WriteFailed {
                reason: e.to_string(),
            })?;

        let entry = RoleAuditEntry::new(target_id, acting_id, action, previous_role, new_role, reason);
        if let Err(e) = self.audit.append(entry.clone()).await {
            let reverted = self.revert(&target).await;
            return Err(AdminError::AuditFailed {
                reason: e.to_string(),
                reverted,
            });
        }

        info!(
            principal = target_id,
            performed_by = acting_id,
            action = action.as_str(),
            "Role changed from {} to {}",
            previous_role,
            new_role
        );

        Ok(RoleAssignment {
            principal: updated,
            previous_role,
            new_role,
            audit_entry: entry,
        })
    }

    /// Best-effort restore of the role fields from before a failed change
    async fn revert(&self, before: &Principal) -> bool {
        let mut patch = MetadataPatch::new().role(before.role);
        if let (Some(by), Some(at)) = (
            before.metadata.role_assigned_by.as_ref(),
            before.metadata.role_assigned_at,
        ) {
            patch = patch.role_assigned(by.clone(), at);
        }

        match self.identity.try_update_metadata(&before.id, &patch).await {
            Ok(_) => true,
            Err(e) => {
                error!("Could not revert unaudited role change for {}: {}", before.id, e);
                false
            }
        }
    }

    /// Every principal with their role and compliance state
    pub async fn list_all_with_roles(&self, acting_id: &str) -> Result<Vec<PrincipalSummary>, AdminError> {
        self.require(acting_id, Permission::ViewAllUsers).await?;

        let principals = self
            .identity
            .list_principals(self.page_size)
            .await
            .map_err(|e| AdminError::ListFailed {
                reason: e.to_string(),
            })?;

        let now = Utc::now();
        Ok(principals
            .into_iter()
            .map(|p| PrincipalSummary::from_principal(p, now))
            .collect())
    }

    /// Role history of `target_id`, newest first
    pub async fn audit_trail(&self, target_id: &str, acting_id: &str) -> Result<Vec<RoleAuditEntry>, AdminError> {
        self.require(acting_id, Permission::ViewAuditLogs).await?;

        self.audit
            .find_by_target(target_id)
            .await
            .map_err(|e| AdminError::ListFailed {
                reason: e.to_string(),
            })
    }

    async fn require(&self, acting_id: &str, permission: Permission) -> Result<(), AdminError> {
        if self
            .permissions
            .has_permission(Subject::Id(acting_id), permission)
            .await
        {
            Ok(())
        } else {
            warn!("{} denied: missing {}", acting_id, permission);
            Err(AdminError::InsufficientPermission {
                acting_id: acting_id.to_string(),
                permission,
            })
        }
    }
}
