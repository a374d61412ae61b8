//! In-memory identity provider and audit store
//!
//! Used by tests and the development server.

use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use crate::adapter::IdentityProvider;
use crate::audit::{AuditLogStore, RoleAuditEntry};
use crate::error::{AuditError, IdentityError};
use crate::metadata::MetadataBag;
use crate::models::IdentityRecord;

/// Identity provider backed by a map, ordered by user id
#[derive(Default)]
pub struct InMemoryIdentityProvider {
    users: RwLock<BTreeMap<String, IdentityRecord>>,
}

impl InMemoryIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_users(users: impl IntoIterator<Item = IdentityRecord>) -> Self {
        let users = users.into_iter().map(|u| (u.id.clone(), u)).collect();
        Self {
            users: RwLock::new(users),
        }
    }
}

#[async_trait]
impl IdentityProvider for InMemoryIdentityProvider {
    async fn get_user(&self, user_id: &str) -> Result<Option<IdentityRecord>, IdentityError> {
        Ok(self.users.read().await.get(user_id).cloned())
    }

    async fn update_user_metadata(
        &self,
        user_id: &str,
        metadata: MetadataBag,
    ) -> Result<IdentityRecord, IdentityError> {
        let mut users = self.users.write().await;
        let user = users
            .get_mut(user_id)
            .ok_or_else(|| IdentityError::UserNotFound {
                user_id: user_id.to_string(),
            })?;
        user.metadata = metadata;
        Ok(user.clone())
    }

    async fn list_users(
        &self,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<IdentityRecord>, IdentityError> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }
}

/// Append-only audit log kept in insertion order
#[derive(Default)]
pub struct InMemoryAuditLog {
    entries: RwLock<Vec<RoleAuditEntry>>,
}

impl InMemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuditLogStore for InMemoryAuditLog {
    async fn append(&self, entry: RoleAuditEntry) -> Result<(), AuditError> {
        self.entries.write().await.push(entry);
        Ok(())
    }

    async fn find_by_target(&self, principal_id: &str) -> Result<Vec<RoleAuditEntry>, AuditError> {
        Ok(self
            .entries
            .read()
            .await
            .iter()
            .rev()
            .filter(|e| e.target_principal_id == principal_id)
            .cloned()
            .collect())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<RoleAuditEntry>, AuditError> {
        Ok(self
            .entries
            .read()
            .await
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect())
    }
}
