//! Compliance policy catalog
//!
//! Per-role training, quiz and two-factor requirements. Static configuration,
//! read-only at runtime.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::roles::Role;

/// Milliseconds in a day, the unit `refresh_period_days` is measured in
pub const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// What a role must have done to count as compliant
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComplianceRequirements {
    /// Training module identifiers, in the order they are presented
    pub required_training: &'static [&'static str],
    /// Quiz identifiers
    pub required_quizzes: &'static [&'static str],
    /// Minimum passing quiz score, 0-100
    pub minimum_score: u8,
    /// Days a training completion stays valid
    pub refresh_period_days: u32,
    /// Whether two-factor authentication is mandatory
    pub requires_2fa: bool,
}

const ADMIN_REQUIREMENTS: ComplianceRequirements = ComplianceRequirements {
    required_training: &[
        "security-fundamentals",
        "phishing-awareness",
        "data-protection",
        "admin-security",
        "incident-response",
    ],
    required_quizzes: &[
        "security-fundamentals-quiz",
        "phishing-awareness-quiz",
        "admin-security-quiz",
    ],
    minimum_score: 90,
    refresh_period_days: 90,
    requires_2fa: true,
};

const EMPLOYEE_REQUIREMENTS: ComplianceRequirements = ComplianceRequirements {
    required_training: &[
        "security-fundamentals",
        "phishing-awareness",
        "data-protection",
    ],
    required_quizzes: &["security-fundamentals-quiz", "phishing-awareness-quiz"],
    minimum_score: 80,
    refresh_period_days: 180,
    requires_2fa: true,
};

impl ComplianceRequirements {
    /// Whether a completion stamped `last_training` is still inside the refresh window at `now`.
    ///
    /// The window is inclusive: exactly `refresh_period_days` old is still fresh.
    pub fn is_training_fresh(&self, last_training: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        let elapsed_ms = (now - last_training).num_milliseconds();
        elapsed_ms <= i64::from(self.refresh_period_days) * MILLIS_PER_DAY
    }

    /// When a completion stamped `last_training` stops counting; `None` past the calendar's end
    pub fn next_due(&self, last_training: DateTime<Utc>) -> Option<DateTime<Utc>> {
        last_training.checked_add_signed(chrono::Duration::days(i64::from(self.refresh_period_days)))
    }

    /// Required training modules not present in `completed`, in catalog order
    pub fn missing_training<S: AsRef<str>>(&self, completed: &[S]) -> Vec<String> {
        self.required_training
            .iter()
            .filter(|module| !completed.iter().any(|c| c.as_ref() == **module))
            .map(|module| module.to_string())
            .collect()
    }
}

/// Requirements for a role
pub fn requirements_for(role: Role) -> &'static ComplianceRequirements {
    match role {
        Role::Admin => &ADMIN_REQUIREMENTS,
        Role::Employee => &EMPLOYEE_REQUIREMENTS,
    }
}

/// Requirements for a role given by wire name, falling back to the default role's
pub fn requirements_for_name(role_name: &str) -> &'static ComplianceRequirements {
    requirements_for(Role::parse_or_default(role_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_every_role_has_sane_requirements() {
        for role in Role::all() {
            let req = requirements_for(*role);
            assert!(req.minimum_score <= 100);
            assert!(req.refresh_period_days > 0);
            assert!(!req.required_training.is_empty());
        }
    }

    #[test]
    fn test_unknown_role_falls_back_to_default() {
        assert_eq!(requirements_for_name("hr"), requirements_for(Role::DEFAULT));
        assert_eq!(requirements_for_name("admin"), requirements_for(Role::Admin));
    }

    #[test]
    fn test_admin_policy_is_stricter() {
        let admin = requirements_for(Role::Admin);
        let employee = requirements_for(Role::Employee);
        assert!(admin.minimum_score >= employee.minimum_score);
        assert!(admin.refresh_period_days <= employee.refresh_period_days);
        for module in employee.required_training {
            assert!(admin.required_training.contains(module));
        }
    }

    #[test]
    fn test_freshness_boundary_is_inclusive() {
        let req = requirements_for(Role::Employee);
        let now = Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap();

        assert!(req.is_training_fresh(now - Duration::days(180), now));
        assert!(!req.is_training_fresh(now - Duration::days(180) - Duration::milliseconds(1), now));
        assert!(!req.is_training_fresh(now - Duration::days(181), now));
        // A stamp in the future is not stale
        assert!(req.is_training_fresh(now + Duration::days(1), now));
    }

    #[test]
    fn test_next_due() {
        let req = requirements_for(Role::Admin);
        let last = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(req.next_due(last), Some(last + Duration::days(90)));
        assert_eq!(req.next_due(DateTime::<Utc>::MAX_UTC), None);
    }

    #[test]
    fn test_missing_training_keeps_catalog_order() {
        let req = requirements_for(Role::Employee);
        let missing = req.missing_training(&["phishing-awareness", "unrelated-module"]);
        assert_eq!(missing, vec!["security-fundamentals", "data-protection"]);
        assert!(req
            .missing_training(&["data-protection", "phishing-awareness", "security-fundamentals"])
            .is_empty());
    }
}
