//! Route protection table
//!
//! Patterns use the path-matcher dialect the portal's routes are written
//! in: a literal path where `(.*)` matches any suffix, e.g. `/admin(.*)`.
//! Each pattern is compiled once as an anchored regular expression.

use regex::Regex;
use std::fmt;
use tracing::warn;

use crate::error::{RbacError, RbacResult};
use crate::roles::Role;

const ANY_SUFFIX: &str = "(.*)";

/// A compiled, anchored path pattern
#[derive(Clone)]
pub struct RoutePattern {
    source: String,
    regex: Regex,
}

impl RoutePattern {
    pub fn new(pattern: &str) -> RbacResult<Self> {
        let regex = Regex::new(&format!("^(?:{})$", pattern)).map_err(|e| {
            RbacError::InvalidRoutePattern {
                pattern: pattern.to_string(),
                message: e.to_string(),
            }
        })?;

        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    /// Whether `path` (without query string) matches the whole pattern
    pub fn matches(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// The literal prefix of a `<prefix>(.*)` pattern
    fn literal_prefix(&self) -> Option<&str> {
        self.source
            .strip_suffix(ANY_SUFFIX)
            .filter(|prefix| !prefix.chars().any(|c| "()[]{}.*+?|^$\\".contains(c)))
    }

    /// Best-effort: true when every path `other` matches is also matched by `self`
    fn covers(&self, other: &RoutePattern) -> bool {
        match (self.literal_prefix(), other.literal_prefix()) {
            (Some(mine), Some(theirs)) => theirs.starts_with(mine),
            (Some(mine), None) => other.source.starts_with(mine) && !other.source.contains(ANY_SUFFIX),
            _ => self.source == other.source,
        }
    }
}

impl fmt::Debug for RoutePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RoutePattern").field(&self.source).finish()
    }
}

/// Access requirements for paths matching one pattern
#[derive(Debug, Clone)]
pub struct RouteProtectionRule {
    pub pattern: RoutePattern,
    pub allowed_roles: Vec<Role>,
    pub requires_compliance: bool,
    pub requires_2fa: bool,
    /// Where denied requests are sent
    pub redirect_target: String,
}

impl RouteProtectionRule {
    pub fn new(
        pattern: &str,
        allowed_roles: &[Role],
        redirect_target: impl Into<String>,
    ) -> RbacResult<Self> {
        if allowed_roles.is_empty() {
            return Err(RbacError::invalid_config(format!(
                "route '{}' allows no roles",
                pattern
            )));
        }

        Ok(Self {
            pattern: RoutePattern::new(pattern)?,
            allowed_roles: allowed_roles.to_vec(),
            requires_compliance: false,
            requires_2fa: false,
            redirect_target: redirect_target.into(),
        })
    }

    pub fn requiring_compliance(mut self) -> Self {
        self.requires_compliance = true;
        self
    }

    pub fn requiring_2fa(mut self) -> Self {
        self.requires_2fa = true;
        self
    }

    pub fn allows(&self, role: Role) -> bool {
        self.allowed_roles.contains(&role)
    }

    /// `admin_or_employee` style label for redirect query strings
    pub fn required_roles_label(&self) -> String {
        self.allowed_roles
            .iter()
            .map(Role::as_str)
            .collect::<Vec<_>>()
            .join("_or_")
    }
}

/// Ordered rule list; the first rule whose pattern matches decides
#[derive(Debug, Clone)]
pub struct RouteTable {
    rules: Vec<RouteProtectionRule>,
}

impl RouteTable {
    /// Build a table, warning about rules an earlier rule makes unreachable
    pub fn new(rules: Vec<RouteProtectionRule>) -> Self {
        let table = Self { rules };
        for (earlier, later) in table.shadowed_rules() {
            warn!(
                "Route rule '{}' can never match: '{}' is listed earlier and covers it",
                later.pattern.as_str(),
                earlier.pattern.as_str()
            );
        }
        table
    }

    /// The portal's standard table, redirecting denials to `landing_path`
    pub fn standard(landing_path: &str) -> RbacResult<Self> {
        let both = [Role::Admin, Role::Employee];
        let rules = vec![
            RouteProtectionRule::new("/admin(.*)", &[Role::Admin], landing_path)?,
            RouteProtectionRule::new("/api/admin(.*)", &[Role::Admin], landing_path)?,
            RouteProtectionRule::new("/dashboard(.*)", &both, landing_path)?,
            RouteProtectionRule::new("/training(.*)", &both, landing_path)?,
            RouteProtectionRule::new("/quizzes(.*)", &both, landing_path)?,
            RouteProtectionRule::new("/policies(.*)", &both, landing_path)?,
            RouteProtectionRule::new("/certificates(.*)", &both, landing_path)?,
            RouteProtectionRule::new("/reports(.*)", &[Role::Admin], landing_path)?,
        ];
        Ok(Self::new(rules))
    }

    pub fn rules(&self) -> &[RouteProtectionRule] {
        &self.rules
    }

    pub fn first_match(&self, path: &str) -> Option<&RouteProtectionRule> {
        self.rules.iter().find(|rule| rule.pattern.matches(path))
    }

    /// Pairs of (earlier, later) where the later rule is unreachable
    pub fn shadowed_rules(&self) -> Vec<(&RouteProtectionRule, &RouteProtectionRule)> {
        let mut shadowed = Vec::new();
        for (i, later) in self.rules.iter().enumerate() {
            if let Some(earlier) = self.rules[..i]
                .iter()
                .find(|earlier| earlier.pattern.covers(&later.pattern))
            {
                shadowed.push((earlier, later));
            }
        }
        shadowed
    }
}
