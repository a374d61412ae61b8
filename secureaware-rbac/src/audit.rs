//! Role change audit trail

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AuditError;
use crate::roles::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    RoleAssigned,
    RoleRemoved,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::RoleAssigned => "role_assigned",
            AuditAction::RoleRemoved => "role_removed",
        }
    }
}

/// One role change, as recorded in the append-only audit store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAuditEntry {
    pub id: Uuid,
    pub target_principal_id: String,
    pub performed_by: String,
    pub action: AuditAction,
    pub previous_role: Role,
    pub new_role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl RoleAuditEntry {
    pub fn new(
        target_principal_id: impl Into<String>,
        performed_by: impl Into<String>,
        action: AuditAction,
        previous_role: Role,
        new_role: Role,
        reason: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            target_principal_id: target_principal_id.into(),
            performed_by: performed_by.into(),
            action,
            previous_role,
            new_role,
            reason,
            timestamp: Utc::now(),
        }
    }
}

/// Append-only store for [`RoleAuditEntry`] records
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuditLogStore: Send + Sync {
    async fn append(&self, entry: RoleAuditEntry) -> Result<(), AuditError>;

    /// Entries about one principal, newest first
    async fn find_by_target(&self, principal_id: &str) -> Result<Vec<RoleAuditEntry>, AuditError>;

    /// The latest `limit` entries across all principals, newest first
    async fn recent(&self, limit: usize) -> Result<Vec<RoleAuditEntry>, AuditError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_wire_format() {
        let entry = RoleAuditEntry::new(
            "user_2",
            "user_1",
            AuditAction::RoleAssigned,
            Role::Employee,
            Role::Admin,
            Some("promoted to security lead".to_string()),
        );
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["action"], "role_assigned");
        assert_eq!(json["previous_role"], "employee");
        assert_eq!(json["new_role"], "admin");
        assert_eq!(json["target_principal_id"], "user_2");

        let back: RoleAuditEntry = serde_json::from_value(json).unwrap();
        assert_eq!(back, entry);
    }

    #[test]
    fn test_reason_is_optional() {
        let entry = RoleAuditEntry::new("a", "b", AuditAction::RoleRemoved, Role::Admin, Role::Employee, None);
        let json = serde_json::to_value(&entry).unwrap();
        assert!(json.get("reason").is_none());
        assert_eq!(entry.action.as_str(), "role_removed");
    }
}
