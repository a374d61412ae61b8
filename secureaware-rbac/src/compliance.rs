//! Compliance evaluation
//!
//! A principal is compliant when, in order:
//! 1. two-factor authentication is enabled, if their role requires it
//! 2. their training is marked complete
//! 3. their last training is inside the role's refresh window
//!
//! A missing training date does not disqualify on its own. Resolution
//! failures are never compliant.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use crate::adapter::IdentityAdapter;
use crate::models::{Principal, Subject};
use crate::policies::{requirements_for, MILLIS_PER_DAY};
use crate::roles::Role;

/// Why a principal is, or is not, compliant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceVerdict {
    Compliant,
    TwoFactorRequired,
    TrainingIncomplete,
    TrainingExpired,
}

impl ComplianceVerdict {
    pub fn is_compliant(&self) -> bool {
        matches!(self, ComplianceVerdict::Compliant)
    }
}

/// Judge a resolved principal against their role's requirements at `now`
pub fn evaluate(principal: &Principal, now: DateTime<Utc>) -> ComplianceVerdict {
    let requirements = requirements_for(principal.role);
    let metadata = &principal.metadata;

    if requirements.requires_2fa && !metadata.has_2fa {
        return ComplianceVerdict::TwoFactorRequired;
    }
    if !metadata.training_complete {
        return ComplianceVerdict::TrainingIncomplete;
    }
    match metadata.last_training_date {
        Some(last) if !requirements.is_training_fresh(last, now) => ComplianceVerdict::TrainingExpired,
        _ => ComplianceVerdict::Compliant,
    }
}

/// Diagnostic compliance breakdown for one principal
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComplianceStatus {
    pub principal_id: String,
    pub role: Role,
    pub is_compliant: bool,
    pub verdict: ComplianceVerdict,
    pub has_2fa: bool,
    pub requires_2fa: bool,
    pub training_complete: bool,
    pub completed_training: Vec<String>,
    pub missing_training: Vec<String>,
    pub required_quizzes: Vec<String>,
    pub minimum_score: u8,
    pub refresh_period_days: u32,
    pub last_training_date: Option<DateTime<Utc>>,
    /// Whole days since the last training, `None` without a training date
    pub days_since_training: Option<i64>,
    pub training_expired: bool,
    pub next_due_date: Option<DateTime<Utc>>,
}

impl ComplianceStatus {
    pub fn for_principal(principal: &Principal, now: DateTime<Utc>) -> Self {
        let requirements = requirements_for(principal.role);
        let metadata = &principal.metadata;
        let verdict = evaluate(principal, now);
        let last = metadata.last_training_date;

        Self {
            principal_id: principal.id.clone(),
            role: principal.role,
            is_compliant: verdict.is_compliant(),
            verdict,
            has_2fa: metadata.has_2fa,
            requires_2fa: requirements.requires_2fa,
            training_complete: metadata.training_complete,
            completed_training: metadata.completed_training.clone(),
            missing_training: requirements.missing_training(&metadata.completed_training),
            required_quizzes: requirements
                .required_quizzes
                .iter()
                .map(|q| q.to_string())
                .collect(),
            minimum_score: requirements.minimum_score,
            refresh_period_days: requirements.refresh_period_days,
            last_training_date: last,
            days_since_training: last.map(|d| (now - d).num_milliseconds() / MILLIS_PER_DAY),
            training_expired: last.is_some_and(|d| !requirements.is_training_fresh(d, now)),
            next_due_date: last.and_then(|d| requirements.next_due(d)),
        }
    }
}

/// Answers compliance questions about principals
#[derive(Clone)]
pub struct ComplianceEvaluator {
    identity: IdentityAdapter,
}

impl ComplianceEvaluator {
    pub fn new(identity: IdentityAdapter) -> Self {
        Self { identity }
    }

    pub async fn is_compliant(&self, subject: Subject<'_>) -> bool {
        self.is_compliant_at(subject, Utc::now()).await
    }

    pub async fn is_compliant_at(&self, subject: Subject<'_>, now: DateTime<Utc>) -> bool {
        match self.identity.resolve(subject).await {
            Ok(principal) => {
                let verdict = evaluate(&principal, now);
                debug!("Compliance for {}: {:?}", principal.id, verdict);
                verdict.is_compliant()
            }
            Err(e) => {
                warn!("Compliance check for {} failed closed: {}", subject.id(), e);
                false
            }
        }
    }

    /// Detailed status for display; not an access decision
    pub async fn user_compliance_status(&self, principal_id: &str) -> Option<ComplianceStatus> {
        self.user_compliance_status_at(principal_id, Utc::now()).await
    }

    pub async fn user_compliance_status_at(
        &self,
        principal_id: &str,
        now: DateTime<Utc>,
    ) -> Option<ComplianceStatus> {
        self.identity
            .principal_by_id(principal_id)
            .await
            .map(|principal| ComplianceStatus::for_principal(&principal, now))
    }
}
