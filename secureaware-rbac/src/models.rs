//! Data models for the RBAC system

use serde::{Deserialize, Serialize};

use crate::metadata::{MetadataBag, PrincipalMetadata};
use crate::roles::Role;
use crate::session::SessionClaims;

/// A user as the identity provider stores it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityRecord {
    pub id: String,
    /// Primary email address, empty when the provider has none
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub metadata: MetadataBag,
}

impl IdentityRecord {
    pub fn new(id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
            metadata: MetadataBag::new(),
        }
    }

    pub fn with_metadata(mut self, metadata: MetadataBag) -> Self {
        self.metadata = metadata;
        self
    }
}

/// The authenticated user as seen by access control
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Principal {
    pub id: String,
    pub email: String,
    /// Effective role: the stored role, or [`Role::DEFAULT`] when missing or unknown
    pub role: Role,
    pub metadata: PrincipalMetadata,
}

impl Principal {
    pub fn from_record(record: &IdentityRecord) -> Self {
        let metadata = PrincipalMetadata::from_bag(&record.metadata);
        Self {
            id: record.id.clone(),
            email: record.email.clone(),
            role: metadata.role.unwrap_or(Role::DEFAULT),
            metadata,
        }
    }

    /// Whether the stored role was missing or unreadable and the default was substituted
    pub fn has_fallback_role(&self) -> bool {
        self.metadata.role.is_none()
    }
}

impl From<IdentityRecord> for Principal {
    fn from(record: IdentityRecord) -> Self {
        Principal::from_record(&record)
    }
}

/// Who an access check is about.
///
/// Either an already-resolved principal, a principal id, or the caller of
/// the current request identified by its verified session.
#[derive(Debug, Clone, Copy)]
pub enum Subject<'a> {
    Principal(&'a Principal),
    Id(&'a str),
    Session(&'a SessionClaims),
}

impl<'a> Subject<'a> {
    /// Principal id this subject refers to
    pub fn id(&self) -> &'a str {
        match *self {
            Subject::Principal(principal) => &principal.id,
            Subject::Id(id) => id,
            Subject::Session(claims) => &claims.sub,
        }
    }
}

impl<'a> From<&'a Principal> for Subject<'a> {
    fn from(principal: &'a Principal) -> Self {
        Subject::Principal(principal)
    }
}

impl<'a> From<&'a SessionClaims> for Subject<'a> {
    fn from(claims: &'a SessionClaims) -> Self {
        Subject::Session(claims)
    }
}

impl<'a> From<&'a str> for Subject<'a> {
    fn from(id: &'a str) -> Self {
        Subject::Id(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_principal_from_record_with_role() {
        let mut bag = MetadataBag::new();
        bag.insert("role".to_string(), json!("admin"));
        let record = IdentityRecord::new("user_1", "a@example.com").with_metadata(bag);

        let principal = Principal::from_record(&record);
        assert_eq!(principal.role, Role::Admin);
        assert!(!principal.has_fallback_role());
    }

    #[test]
    fn test_missing_role_degrades_to_default() {
        let principal: Principal = IdentityRecord::new("user_2", "b@example.com").into();
        assert_eq!(principal.role, Role::DEFAULT);
        assert!(principal.has_fallback_role());
    }

    #[test]
    fn test_corrupted_role_degrades_to_default() {
        let mut bag = MetadataBag::new();
        bag.insert("role".to_string(), json!({"name": "admin"}));
        let principal: Principal = IdentityRecord::new("user_3", "").with_metadata(bag).into();
        assert_eq!(principal.role, Role::DEFAULT);
    }

    #[test]
    fn test_subject_ids() {
        let principal: Principal = IdentityRecord::new("user_4", "").into();
        assert_eq!(Subject::from(&principal).id(), "user_4");
        assert_eq!(Subject::from("user_5").id(), "user_5");
    }
}
