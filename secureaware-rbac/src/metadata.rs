//! Typed view over the identity provider's metadata bag
//!
//! The provider stores an untyped JSON object per user that other
//! subsystems also write to. Fields this crate owns are parsed one by one:
//! a field with an unexpected shape reads as absent instead of failing the
//! whole principal. Writes only ever touch the keys named in a
//! [`MetadataPatch`]; every other key is carried over untouched.

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::roles::Role;

/// The provider's per-user key/value bag
pub type MetadataBag = Map<String, Value>;

/// Version written alongside every patch
pub const METADATA_SCHEMA_VERSION: u64 = 1;

/// Wire keys inside the metadata bag
pub mod keys {
    pub const SCHEMA_VERSION: &str = "schemaVersion";
    pub const ROLE: &str = "role";
    pub const HAS_2FA: &str = "has2FA";
    pub const TRAINING_COMPLETE: &str = "trainingComplete";
    pub const LAST_TRAINING_DATE: &str = "lastTrainingDate";
    pub const COMPLETED_TRAINING: &str = "completedTraining";
    pub const ROLE_ASSIGNED_AT: &str = "roleAssignedAt";
    pub const ROLE_ASSIGNED_BY: &str = "roleAssignedBy";
}

/// Parsed access-control and compliance metadata for one principal
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PrincipalMetadata {
    /// `None` for legacy bags written before versioning
    pub schema_version: Option<u64>,
    /// Stored role; `None` when missing or not a known role
    pub role: Option<Role>,
    pub has_2fa: bool,
    pub training_complete: bool,
    pub last_training_date: Option<DateTime<Utc>>,
    pub completed_training: Vec<String>,
    pub role_assigned_at: Option<DateTime<Utc>>,
    pub role_assigned_by: Option<String>,
}

impl PrincipalMetadata {
    /// Parse the bag, treating every malformed field as absent
    pub fn from_bag(bag: &MetadataBag) -> Self {
        Self {
            schema_version: bag.get(keys::SCHEMA_VERSION).and_then(Value::as_u64),
            role: bag
                .get(keys::ROLE)
                .and_then(Value::as_str)
                .and_then(Role::parse),
            has_2fa: read_flag(bag, keys::HAS_2FA),
            training_complete: read_flag(bag, keys::TRAINING_COMPLETE),
            last_training_date: bag.get(keys::LAST_TRAINING_DATE).and_then(read_timestamp),
            completed_training: bag
                .get(keys::COMPLETED_TRAINING)
                .and_then(Value::as_array)
                .map(|items| {
                    items
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            role_assigned_at: bag.get(keys::ROLE_ASSIGNED_AT).and_then(read_timestamp),
            role_assigned_by: bag
                .get(keys::ROLE_ASSIGNED_BY)
                .and_then(Value::as_str)
                .map(str::to_string),
        }
    }
}

fn read_flag(bag: &MetadataBag, key: &str) -> bool {
    bag.get(key).and_then(Value::as_bool).unwrap_or(false)
}

/// Epoch milliseconds, or an RFC 3339 string from older writers
fn read_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        _ => None,
    }
}

/// A partial update to the metadata bag; unset fields are left as they are
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataPatch {
    pub role: Option<Role>,
    pub has_2fa: Option<bool>,
    pub training_complete: Option<bool>,
    pub last_training_date: Option<DateTime<Utc>>,
    pub completed_training: Option<Vec<String>>,
    pub role_assigned_at: Option<DateTime<Utc>>,
    pub role_assigned_by: Option<String>,
}

impl MetadataPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }

    pub fn has_2fa(mut self, enabled: bool) -> Self {
        self.has_2fa = Some(enabled);
        self
    }

    pub fn training_complete(mut self, complete: bool) -> Self {
        self.training_complete = Some(complete);
        self
    }

    pub fn last_training_date(mut self, at: DateTime<Utc>) -> Self {
        self.last_training_date = Some(at);
        self
    }

    pub fn completed_training<I, S>(mut self, modules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.completed_training = Some(modules.into_iter().map(Into::into).collect());
        self
    }

    pub fn role_assigned(mut self, by: impl Into<String>, at: DateTime<Utc>) -> Self {
        self.role_assigned_by = Some(by.into());
        self.role_assigned_at = Some(at);
        self
    }

    /// True when applying the patch would change nothing but the schema version
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Merge this patch into `bag`, stamping the current schema version
    pub fn apply_to(&self, bag: &mut MetadataBag) {
        if let Some(role) = self.role {
            bag.insert(keys::ROLE.to_string(), Value::from(role.as_str()));
        }
        if let Some(flag) = self.has_2fa {
            bag.insert(keys::HAS_2FA.to_string(), Value::from(flag));
        }
        if let Some(flag) = self.training_complete {
            bag.insert(keys::TRAINING_COMPLETE.to_string(), Value::from(flag));
        }
        if let Some(at) = self.last_training_date {
            bag.insert(keys::LAST_TRAINING_DATE.to_string(), Value::from(at.timestamp_millis()));
        }
        if let Some(modules) = &self.completed_training {
            bag.insert(keys::COMPLETED_TRAINING.to_string(), Value::from(modules.clone()));
        }
        if let Some(at) = self.role_assigned_at {
            bag.insert(keys::ROLE_ASSIGNED_AT.to_string(), Value::from(at.timestamp_millis()));
        }
        if let Some(by) = &self.role_assigned_by {
            bag.insert(keys::ROLE_ASSIGNED_BY.to_string(), Value::from(by.as_str()));
        }
        bag.insert(
            keys::SCHEMA_VERSION.to_string(),
            Value::from(METADATA_SCHEMA_VERSION),
        );
    }
}
