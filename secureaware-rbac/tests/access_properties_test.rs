//! Access-control properties across the catalog, evaluators and administration

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use mockall::mock;
use secureaware_rbac::{
    memory::{InMemoryAuditLog, InMemoryIdentityProvider},
    permissions_for, AdminError, AuditAction, AuditLogStore, ComplianceEvaluator, IdentityAdapter,
    IdentityError, IdentityProvider, IdentityRecord, MetadataBag, MetadataPatch, MetadataUpdate,
    Permission, PermissionChecker, Role, RoleAdministrator, Subject,
};
use std::sync::Arc;
use tokio::sync::Barrier;

mock! {
    pub Provider {}

    #[async_trait]
    impl IdentityProvider for Provider {
        async fn get_user(&self, user_id: &str) -> Result<Option<IdentityRecord>, IdentityError>;
        async fn update_user_metadata(
            &self,
            user_id: &str,
            metadata: MetadataBag,
        ) -> Result<IdentityRecord, IdentityError>;
        async fn list_users(
            &self,
            offset: usize,
            limit: usize,
        ) -> Result<Vec<IdentityRecord>, IdentityError>;
    }
}

fn user(id: &str, patch: MetadataPatch) -> IdentityRecord {
    let mut bag = MetadataBag::new();
    patch.apply_to(&mut bag);
    IdentityRecord::new(id, format!("{}@example.com", id)).with_metadata(bag)
}

fn adapter(users: Vec<IdentityRecord>) -> IdentityAdapter {
    IdentityAdapter::new(Arc::new(InMemoryIdentityProvider::with_users(users)))
}

#[tokio::test]
async fn test_has_permission_matches_catalog_membership() {
    let identity = adapter(vec![
        user("admin", MetadataPatch::new().role(Role::Admin)),
        user("employee", MetadataPatch::new().role(Role::Employee)),
    ]);
    let checker = PermissionChecker::new(identity);

    for role in Role::all() {
        let id = role.as_str();
        for permission in Permission::all() {
            assert_eq!(
                checker.has_permission(Subject::Id(id), *permission).await,
                permissions_for(*role).contains(permission),
                "{} / {}",
                role,
                permission
            );
        }
        assert!(checker.has_all_permissions(Subject::Id(id), &[]).await);
        assert!(!checker.has_any_permission(Subject::Id(id), &[]).await);
    }

    assert!(!checker.has_permission(Subject::Id("employee"), Permission::ManageUsers).await);
    assert!(checker.has_permission(Subject::Id("admin"), Permission::ManageUsers).await);
}

#[tokio::test]
async fn test_missing_or_corrupt_role_evaluates_as_default() {
    let mut corrupt = MetadataBag::new();
    corrupt.insert("role".to_string(), serde_json::json!(["admin"]));

    let identity = adapter(vec![
        IdentityRecord::new("legacy", ""),
        IdentityRecord::new("corrupt", "").with_metadata(corrupt),
    ]);
    let checker = PermissionChecker::new(identity.clone());

    for id in ["legacy", "corrupt"] {
        assert_eq!(identity.role_of(Subject::Id(id)).await, Role::DEFAULT);
        assert!(checker.has_permission(Subject::Id(id), Permission::TakeTraining).await);
        assert!(!checker.has_permission(Subject::Id(id), Permission::AssignRoles).await);
    }
}

#[tokio::test]
async fn test_evaluators_fail_closed_when_provider_errors() {
    let mut provider = MockProvider::new();
    provider
        .expect_get_user()
        .returning(|_| Err(IdentityError::unavailable("upstream 503")));
    provider
        .expect_update_user_metadata()
        .returning(|_, _| Err(IdentityError::unavailable("upstream 503")));

    let identity = IdentityAdapter::new(Arc::new(provider));
    let checker = PermissionChecker::new(identity.clone());
    let compliance = ComplianceEvaluator::new(identity.clone());
    let subject = Subject::Id("admin_1");

    assert!(!checker.has_permission(subject, Permission::TakeTraining).await);
    assert!(!checker.has_all_permissions(subject, &[]).await);
    assert!(!checker.check_permissions(subject, &[]).await.granted);
    assert!(!compliance.is_compliant(subject).await);
    assert!(compliance.user_compliance_status("admin_1").await.is_none());
    assert!(identity.principal_by_id("admin_1").await.is_none());
    assert!(matches!(
        identity
            .update_metadata("admin_1", MetadataPatch::new().has_2fa(true))
            .await,
        MetadataUpdate::Failed { .. }
    ));
}

#[tokio::test]
async fn test_compliance_round_trip_through_metadata_update() {
    let identity = adapter(vec![user("emp_1", MetadataPatch::new().role(Role::Employee))]);
    let compliance = ComplianceEvaluator::new(identity.clone());

    assert!(!compliance.is_compliant(Subject::Id("emp_1")).await);

    let outcome = identity
        .update_metadata(
            "emp_1",
            MetadataPatch::new()
                .has_2fa(true)
                .training_complete(true)
                .last_training_date(Utc::now() - Duration::days(1)),
        )
        .await;
    assert!(outcome.is_updated());
    assert!(compliance.is_compliant(Subject::Id("emp_1")).await);

    // The role written earlier survived the merge
    assert_eq!(identity.role_of(Subject::Id("emp_1")).await, Role::Employee);
}

#[tokio::test]
async fn test_staleness_boundary_is_inclusive() {
    let now = Utc.with_ymd_and_hms(2026, 9, 1, 8, 0, 0).unwrap();
    let compliant_except_date = || {
        MetadataPatch::new()
            .role(Role::Employee)
            .has_2fa(true)
            .training_complete(true)
    };
    let identity = adapter(vec![
        user("exact", compliant_except_date().last_training_date(now - Duration::days(180))),
        user("late", compliant_except_date().last_training_date(now - Duration::days(181))),
        user("undated", compliant_except_date()),
    ]);
    let compliance = ComplianceEvaluator::new(identity);

    assert!(compliance.is_compliant_at(Subject::Id("exact"), now).await);
    assert!(!compliance.is_compliant_at(Subject::Id("late"), now).await);
    assert!(compliance.is_compliant_at(Subject::Id("undated"), now).await);

    let status = compliance
        .user_compliance_status_at("late", now)
        .await
        .unwrap();
    assert!(status.training_expired);
    assert_eq!(status.days_since_training, Some(181));
}

#[tokio::test]
async fn test_training_date_at_calendar_end() {
    let now = Utc.with_ymd_and_hms(2026, 9, 1, 8, 0, 0).unwrap();
    let mut record = user(
        "far_future",
        MetadataPatch::new()
            .role(Role::Employee)
            .has_2fa(true)
            .training_complete(true),
    );
    record.metadata.insert(
        "lastTrainingDate".to_string(),
        serde_json::json!(8_210_266_876_799_999_i64),
    );
    let compliance = ComplianceEvaluator::new(adapter(vec![record]));

    let status = compliance
        .user_compliance_status_at("far_future", now)
        .await
        .unwrap();
    assert!(status.last_training_date.is_some());
    assert_eq!(status.next_due_date, None);
    assert!(!status.training_expired);
    assert!(compliance.is_compliant_at(Subject::Id("far_future"), now).await);
}

#[tokio::test]
async fn test_reassigning_same_role_is_audited() {
    let identity = adapter(vec![
        user("admin_1", MetadataPatch::new().role(Role::Admin)),
        user("emp_1", MetadataPatch::new().role(Role::Employee)),
    ]);
    let audit = Arc::new(InMemoryAuditLog::new());
    let admin = RoleAdministrator::new(identity, audit.clone());

    admin.assign_role("emp_1", Role::Admin, "admin_1", None).await.unwrap();
    let second = admin.assign_role("emp_1", Role::Admin, "admin_1", None).await.unwrap();
    assert_eq!(second.previous_role, Role::Admin);
    assert_eq!(second.new_role, Role::Admin);

    let entries = audit.find_by_target("emp_1").await.unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].previous_role, Role::Admin);
    assert_eq!(entries[0].new_role, Role::Admin);
    assert_eq!(entries[0].action, AuditAction::RoleAssigned);
    assert_eq!(entries[1].previous_role, Role::Employee);
}

#[tokio::test]
async fn test_self_role_change_always_fails() {
    let identity = adapter(vec![
        user("admin_1", MetadataPatch::new().role(Role::Admin)),
        user("emp_1", MetadataPatch::new().role(Role::Employee)),
    ]);
    let admin = RoleAdministrator::new(identity, Arc::new(InMemoryAuditLog::new()));

    for role in Role::all() {
        for id in ["admin_1", "emp_1", "unknown"] {
            assert_eq!(
                admin.assign_role(id, *role, id, None).await,
                Err(AdminError::SelfRoleChange)
            );
        }
    }
    assert_eq!(
        admin.remove_role("admin_1", "admin_1").await,
        Err(AdminError::SelfRoleChange)
    );
}

/// Provider whose reads wait for a second reader before returning
struct LockstepProvider {
    inner: InMemoryIdentityProvider,
    barrier: Barrier,
}

#[async_trait]
impl IdentityProvider for LockstepProvider {
    async fn get_user(&self, user_id: &str) -> Result<Option<IdentityRecord>, IdentityError> {
        let user = self.inner.get_user(user_id).await;
        self.barrier.wait().await;
        user
    }

    async fn update_user_metadata(
        &self,
        user_id: &str,
        metadata: MetadataBag,
    ) -> Result<IdentityRecord, IdentityError> {
        self.inner.update_user_metadata(user_id, metadata).await
    }

    async fn list_users(
        &self,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<IdentityRecord>, IdentityError> {
        self.inner.list_users(offset, limit).await
    }
}

#[tokio::test]
async fn test_concurrent_updates_can_lose_a_write() {
    let provider = Arc::new(LockstepProvider {
        inner: InMemoryIdentityProvider::with_users(vec![user(
            "emp_1",
            MetadataPatch::new().role(Role::Employee),
        )]),
        barrier: Barrier::new(2),
    });
    let identity = IdentityAdapter::new(provider.clone());

    // Both writers read the same stale bag before either writes
    let (first, second) = tokio::join!(
        identity.update_metadata("emp_1", MetadataPatch::new().has_2fa(true)),
        identity.update_metadata("emp_1", MetadataPatch::new().training_complete(true)),
    );
    assert!(first.is_updated());
    assert!(second.is_updated());

    let stored = provider.inner.get_user("emp_1").await.unwrap().unwrap();
    let metadata = secureaware_rbac::PrincipalMetadata::from_bag(&stored.metadata);
    assert!(
        metadata.has_2fa != metadata.training_complete,
        "exactly one writer wins the whole bag"
    );
    assert_eq!(metadata.role, Some(Role::Employee));
}

#[tokio::test]
async fn test_sequential_updates_to_different_fields_both_survive() {
    let identity = adapter(vec![user("emp_1", MetadataPatch::new().role(Role::Employee))]);

    identity
        .update_metadata("emp_1", MetadataPatch::new().has_2fa(true))
        .await;
    identity
        .update_metadata("emp_1", MetadataPatch::new().training_complete(true))
        .await;

    let principal = identity.principal_by_id("emp_1").await.unwrap();
    assert!(principal.metadata.has_2fa);
    assert!(principal.metadata.training_complete);
}
