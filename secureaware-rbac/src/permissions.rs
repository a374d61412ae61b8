//! Permission checking utilities
//!
//! Every check resolves the subject's role through the identity adapter
//! and answers from the static catalog. Resolution failures deny.

use serde::Serialize;
use tracing::{debug, warn};

use crate::adapter::IdentityAdapter;
use crate::error::RbacResult;
use crate::models::Subject;
use crate::roles::{permissions_for, Permission, Role};

/// Diagnostic result of [`PermissionChecker::check_permissions`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PermissionCheck {
    pub granted: bool,
    pub role: Role,
    pub required: Vec<Permission>,
    pub owned: Vec<Permission>,
    pub missing: Vec<Permission>,
}

/// Permission checker for validating principal actions
#[derive(Clone)]
pub struct PermissionChecker {
    identity: IdentityAdapter,
}

impl PermissionChecker {
    pub fn new(identity: IdentityAdapter) -> Self {
        Self { identity }
    }

    pub async fn has_permission(&self, subject: Subject<'_>, permission: Permission) -> bool {
        self.has_all_permissions(subject, &[permission]).await
    }

    /// True when the subject owns at least one of `permissions`; false for an empty list
    pub async fn has_any_permission(&self, subject: Subject<'_>, permissions: &[Permission]) -> bool {
        self.evaluate(subject, "any", |role| {
            permissions.iter().any(|p| role.has_permission(*p))
        })
        .await
    }

    /// True when the subject owns every one of `permissions`; true for an empty list
    pub async fn has_all_permissions(&self, subject: Subject<'_>, permissions: &[Permission]) -> bool {
        self.evaluate(subject, "all", |role| {
            permissions.iter().all(|p| role.has_permission(*p))
        })
        .await
    }

    /// Break down which of `required` the subject owns
    pub async fn check_permissions(
        &self,
        subject: Subject<'_>,
        required: &[Permission],
    ) -> PermissionCheck {
        match self.identity.resolve(subject).await {
            Ok(principal) => {
                let owned = permissions_for(principal.role).to_vec();
                let missing: Vec<Permission> = required
                    .iter()
                    .filter(|p| !owned.contains(p))
                    .copied()
                    .collect();

                PermissionCheck {
                    granted: missing.is_empty(),
                    role: principal.role,
                    required: required.to_vec(),
                    owned,
                    missing,
                }
            }
            Err(e) => {
                warn!("Permission check for {} denied: {}", subject.id(), e);
                PermissionCheck {
                    granted: false,
                    role: Role::DEFAULT,
                    required: required.to_vec(),
                    owned: Vec::new(),
                    missing: required.to_vec(),
                }
            }
        }
    }

    async fn evaluate<F>(&self, subject: Subject<'_>, mode: &str, predicate: F) -> bool
    where
        F: FnOnce(Role) -> bool,
    {
        match self.role_strict(subject).await {
            Ok(role) => {
                let granted = predicate(role);
                debug!(
                    "Permission check ({}) for {} as {}: {}",
                    mode,
                    subject.id(),
                    role,
                    granted
                );
                granted
            }
            Err(e) => {
                warn!("Permission check for {} denied: {}", subject.id(), e);
                false
            }
        }
    }

    async fn role_strict(&self, subject: Subject<'_>) -> RbacResult<Role> {
        self.identity.resolve(subject).await.map(|p| p.role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::MockIdentityProvider;
    use crate::error::IdentityError;
    use crate::metadata::MetadataBag;
    use crate::models::IdentityRecord;
    use serde_json::json;
    use std::sync::Arc;

    fn checker_with_role(role: &'static str) -> PermissionChecker {
        let mut provider = MockIdentityProvider::new();
        provider.expect_get_user().returning(move |id| {
            let mut bag = MetadataBag::new();
            bag.insert("role".to_string(), json!(role));
            Ok(Some(IdentityRecord::new(id, "").with_metadata(bag)))
        });
        PermissionChecker::new(IdentityAdapter::new(Arc::new(provider)))
    }

    fn failing_checker() -> PermissionChecker {
        let mut provider = MockIdentityProvider::new();
        provider
            .expect_get_user()
            .returning(|_| Err(IdentityError::unavailable("timeout")));
        PermissionChecker::new(IdentityAdapter::new(Arc::new(provider)))
    }

    #[tokio::test]
    async fn test_employee_permissions() {
        let checker = checker_with_role("employee");
        let subject = Subject::Id("user_1");

        assert!(checker.has_permission(subject, Permission::TakeTraining).await);
        assert!(!checker.has_permission(subject, Permission::ManageUsers).await);
        assert!(
            checker
                .has_any_permission(subject, &[Permission::ManageUsers, Permission::TakeQuizzes])
                .await
        );
        assert!(
            !checker
                .has_all_permissions(subject, &[Permission::ManageUsers, Permission::TakeQuizzes])
                .await
        );
    }

    #[tokio::test]
    async fn test_vacuous_cases() {
        let checker = checker_with_role("employee");
        let subject = Subject::Id("user_1");
        assert!(checker.has_all_permissions(subject, &[]).await);
        assert!(!checker.has_any_permission(subject, &[]).await);
    }

    #[tokio::test]
    async fn test_fail_closed_on_provider_error() {
        let checker = failing_checker();
        let subject = Subject::Id("user_1");

        assert!(!checker.has_permission(subject, Permission::TakeTraining).await);
        assert!(!checker.has_all_permissions(subject, &[]).await);
        assert!(!checker.has_any_permission(subject, &[Permission::TakeTraining]).await);

        let check = checker
            .check_permissions(subject, &[Permission::TakeTraining])
            .await;
        assert!(!check.granted);
        assert_eq!(check.role, Role::DEFAULT);
        assert_eq!(check.missing, vec![Permission::TakeTraining]);
    }

    #[tokio::test]
    async fn test_check_permissions_breakdown() {
        let checker = checker_with_role("employee");
        let check = checker
            .check_permissions(
                Subject::Id("user_1"),
                &[Permission::TakeTraining, Permission::ExportReports],
            )
            .await;

        assert!(!check.granted);
        assert_eq!(check.role, Role::Employee);
        assert_eq!(check.missing, vec![Permission::ExportReports]);
        assert!(check.owned.contains(&Permission::TakeTraining));
    }

    #[tokio::test]
    async fn test_admin_owns_everything() {
        let checker = checker_with_role("admin");
        assert!(
            checker
                .has_all_permissions(Subject::Id("user_1"), Permission::all())
                .await
        );
    }
}
