//! HTTP handlers for the portal API
//!
//! Every handler behind the route guard reads the caller from the
//! [`RequestIdentity`] extension the guard attaches.

use axum::{
    extract::{FromRequestParts, Path, Query, State},
    http::request::Parts,
    Json,
};
use secureaware_rbac::{
    ComplianceStatus, Permission, PermissionCategory, PermissionCheck, PrincipalSummary,
    RequestIdentity, Role, RoleAssignment, RoleAuditEntry, Subject,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;

use crate::errors::{ApiError, ApiResult};
use crate::services::AppState;

/// The authenticated caller, as established by the route guard
pub struct CurrentUser(pub RequestIdentity);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestIdentity>()
            .cloned()
            .map(CurrentUser)
            .ok_or_else(|| ApiError::unauthorized("No authenticated principal on this request"))
    }
}

pub async fn root() -> Json<Value> {
    Json(json!({
        "service": "SecureAware access core",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running"
    }))
}

/// Identity echo for the landing page
pub async fn dashboard(CurrentUser(identity): CurrentUser) -> Json<Value> {
    Json(json!({
        "user_id": identity.user_id,
        "role": identity.role,
        "role_display_name": identity.role.display_name(),
        "privilege_level": identity.role.privilege_level(),
        "permissions": identity.role.permissions(),
        "permission_groups": permission_groups(identity.role.permissions()),
    }))
}

/// Permissions keyed by category, for menu sections
fn permission_groups(permissions: &[Permission]) -> BTreeMap<PermissionCategory, Vec<Permission>> {
    let mut groups: BTreeMap<PermissionCategory, Vec<Permission>> = BTreeMap::new();
    for permission in permissions {
        groups.entry(permission.category()).or_default().push(*permission);
    }
    groups
}

pub async fn my_compliance(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
) -> ApiResult<Json<ComplianceStatus>> {
    state
        .compliance
        .user_compliance_status(&identity.user_id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("No compliance record for {}", identity.user_id)))
}

#[derive(Debug, Deserialize)]
pub struct PermissionQuery {
    /// Comma-separated permission names
    #[serde(default)]
    pub require: Option<String>,
}

pub async fn my_permissions(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
    Query(query): Query<PermissionQuery>,
) -> ApiResult<Json<PermissionCheck>> {
    let required = parse_permissions(query.require.as_deref().unwrap_or(""))?;
    let check = state
        .permissions
        .check_permissions(Subject::Id(&identity.user_id), &required)
        .await;
    Ok(Json(check))
}

fn parse_permissions(list: &str) -> ApiResult<Vec<Permission>> {
    list.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(|name| name.parse::<Permission>().map_err(ApiError::bad_request))
        .collect()
}

pub async fn list_users(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
) -> ApiResult<Json<Vec<PrincipalSummary>>> {
    let users = state.admin.list_all_with_roles(&identity.user_id).await?;
    Ok(Json(users))
}

#[derive(Debug, Deserialize)]
pub struct AssignRoleRequest {
    pub role: String,
    #[serde(default)]
    pub reason: Option<String>,
}

pub async fn assign_role(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
    Path(target_id): Path<String>,
    Json(request): Json<AssignRoleRequest>,
) -> ApiResult<Json<RoleAssignment>> {
    let role: Role = request.role.parse().map_err(ApiError::bad_request)?;
    let assignment = state
        .admin
        .assign_role(&target_id, role, &identity.user_id, request.reason)
        .await?;
    Ok(Json(assignment))
}

pub async fn remove_role(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
    Path(target_id): Path<String>,
) -> ApiResult<Json<RoleAssignment>> {
    let assignment = state.admin.remove_role(&target_id, &identity.user_id).await?;
    Ok(Json(assignment))
}

pub async fn audit_trail(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
    Path(target_id): Path<String>,
) -> ApiResult<Json<Vec<RoleAuditEntry>>> {
    let entries = state.admin.audit_trail(&target_id, &identity.user_id).await?;
    Ok(Json(entries))
}
