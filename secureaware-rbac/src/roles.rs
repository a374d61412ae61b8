//! Role and permission catalog
//!
//! A static, closed table. Looking up any declared role never fails, and a
//! role name that does not parse resolves to an empty permission set.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Portal roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Employee,
}

impl Role {
    /// Least-privileged role; every unknown or missing role resolves to it
    pub const DEFAULT: Role = Role::Employee;

    /// All declared roles, most privileged first
    pub fn all() -> &'static [Role] {
        &[Role::Admin, Role::Employee]
    }

    /// Wire name used in metadata, claims and headers
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Employee => "employee",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Role::Admin => "Administrator",
            Role::Employee => "Employee",
        }
    }

    /// Relative privilege, higher is more privileged
    pub fn privilege_level(&self) -> u8 {
        match self {
            Role::Admin => 100,
            Role::Employee => 10,
        }
    }

    /// Parse a wire name, case-insensitively
    pub fn parse(value: &str) -> Option<Role> {
        match value.trim().to_ascii_lowercase().as_str() {
            "admin" => Some(Role::Admin),
            "employee" => Some(Role::Employee),
            _ => None,
        }
    }

    /// Parse a wire name, degrading to [`Role::DEFAULT`] when it is not a known role
    pub fn parse_or_default(value: &str) -> Role {
        Self::parse(value).unwrap_or(Self::DEFAULT)
    }

    /// Permissions granted to this role
    pub fn permissions(&self) -> &'static [Permission] {
        permissions_for(*self)
    }

    pub fn has_permission(&self, permission: Permission) -> bool {
        self.permissions().contains(&permission)
    }
}

impl Default for Role {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::parse(s).ok_or_else(|| format!("Unknown role: {}", s))
    }
}

/// Permission categories, used for grouping in admin screens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionCategory {
    UserManagement,
    ContentManagement,
    ComplianceReporting,
    SecurityManagement,
    SelfService,
    FinancialCompliance,
}

/// Closed set of portal permissions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    // User management
    ManageUsers,
    ViewAllUsers,
    AssignRoles,

    // Content management
    ManageTraining,
    ManageQuizzes,
    ManagePolicies,

    // Compliance and reporting
    ViewComplianceReports,
    ExportReports,
    ViewAuditLogs,

    // Security management
    ManageSecuritySettings,
    ManageTwoFactor,

    // Employee self-service
    TakeTraining,
    TakeQuizzes,
    AcknowledgePolicies,
    ViewOwnProgress,
    ViewOwnCertificates,

    // Financial-services compliance
    ViewRegulatoryRequirements,
    ManageFinancialCompliance,
}

const ALL_PERMISSIONS: &[Permission] = &[
    Permission::ManageUsers,
    Permission::ViewAllUsers,
    Permission::AssignRoles,
    Permission::ManageTraining,
    Permission::ManageQuizzes,
    Permission::ManagePolicies,
    Permission::ViewComplianceReports,
    Permission::ExportReports,
    Permission::ViewAuditLogs,
    Permission::ManageSecuritySettings,
    Permission::ManageTwoFactor,
    Permission::TakeTraining,
    Permission::TakeQuizzes,
    Permission::AcknowledgePolicies,
    Permission::ViewOwnProgress,
    Permission::ViewOwnCertificates,
    Permission::ViewRegulatoryRequirements,
    Permission::ManageFinancialCompliance,
];

const EMPLOYEE_PERMISSIONS: &[Permission] = &[
    Permission::TakeTraining,
    Permission::TakeQuizzes,
    Permission::AcknowledgePolicies,
    Permission::ViewOwnProgress,
    Permission::ViewOwnCertificates,
    Permission::ViewRegulatoryRequirements,
];

impl Permission {
    pub fn all() -> &'static [Permission] {
        ALL_PERMISSIONS
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::ManageUsers => "manage_users",
            Permission::ViewAllUsers => "view_all_users",
            Permission::AssignRoles => "assign_roles",
            Permission::ManageTraining => "manage_training",
            Permission::ManageQuizzes => "manage_quizzes",
            Permission::ManagePolicies => "manage_policies",
            Permission::ViewComplianceReports => "view_compliance_reports",
            Permission::ExportReports => "export_reports",
            Permission::ViewAuditLogs => "view_audit_logs",
            Permission::ManageSecuritySettings => "manage_security_settings",
            Permission::ManageTwoFactor => "manage_two_factor",
            Permission::TakeTraining => "take_training",
            Permission::TakeQuizzes => "take_quizzes",
            Permission::AcknowledgePolicies => "acknowledge_policies",
            Permission::ViewOwnProgress => "view_own_progress",
            Permission::ViewOwnCertificates => "view_own_certificates",
            Permission::ViewRegulatoryRequirements => "view_regulatory_requirements",
            Permission::ManageFinancialCompliance => "manage_financial_compliance",
        }
    }

    pub fn category(&self) -> PermissionCategory {
        match self {
            Permission::ManageUsers | Permission::ViewAllUsers | Permission::AssignRoles => {
                PermissionCategory::UserManagement
            }
            Permission::ManageTraining | Permission::ManageQuizzes | Permission::ManagePolicies => {
                PermissionCategory::ContentManagement
            }
            Permission::ViewComplianceReports
            | Permission::ExportReports
            | Permission::ViewAuditLogs => PermissionCategory::ComplianceReporting,
            Permission::ManageSecuritySettings | Permission::ManageTwoFactor => {
                PermissionCategory::SecurityManagement
            }
            Permission::TakeTraining
            | Permission::TakeQuizzes
            | Permission::AcknowledgePolicies
            | Permission::ViewOwnProgress
            | Permission::ViewOwnCertificates => PermissionCategory::SelfService,
            Permission::ViewRegulatoryRequirements | Permission::ManageFinancialCompliance => {
                PermissionCategory::FinancialCompliance
            }
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        ALL_PERMISSIONS
            .iter()
            .copied()
            .find(|p| p.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| format!("Unknown permission: {}", s))
    }
}

/// Permissions granted to a role
pub fn permissions_for(role: Role) -> &'static [Permission] {
    match role {
        Role::Admin => ALL_PERMISSIONS,
        Role::Employee => EMPLOYEE_PERMISSIONS,
    }
}

/// Permissions for a role given by wire name; unknown names own nothing
pub fn permissions_for_name(role_name: &str) -> &'static [Permission] {
    match Role::parse(role_name) {
        Some(role) => permissions_for(role),
        None => &[],
    }
}

/// Role permissions as an ordered set, for set arithmetic
pub fn permission_set(role: Role) -> BTreeSet<Permission> {
    permissions_for(role).iter().copied().collect()
}
