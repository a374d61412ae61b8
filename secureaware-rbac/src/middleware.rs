//! Route guard middleware
//!
//! Runs in front of every request:
//! 1. public paths pass through untouched
//! 2. requests without a valid session are sent to sign-in
//! 3. the first matching route rule decides on the caller's role (and, when
//!    the rule asks for it, on two-factor and compliance state)
//! 4. unmatched paths pass through with the caller's identity attached
//!
//! Allowed requests carry `x-user-id` / `x-user-role` headers and a
//! [`RequestIdentity`] extension. Denials are `303 See Other` redirects.

use axum::{
    extract::{OriginalUri, Request, State},
    http::{HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
    Router,
};
use chrono::{Duration, Utc};
use secureaware_config::{AccessConfig, RoleSource};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::form_urlencoded;

use crate::adapter::IdentityAdapter;
use crate::compliance;
use crate::error::{RbacError, RbacResult};
use crate::models::{Principal, Subject};
use crate::roles::Role;
use crate::routes::{RoutePattern, RouteProtectionRule, RouteTable};
use crate::session::{SessionClaims, SessionVerifier};

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// Caller identity attached to allowed requests
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestIdentity {
    pub user_id: String,
    pub role: Role,
}

/// Why a request was turned away
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    InsufficientPermissions,
    TwoFactorRequired,
    ComplianceRequired,
}

impl DenyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenyReason::InsufficientPermissions => "insufficient_permissions",
            DenyReason::TwoFactorRequired => "two_factor_required",
            DenyReason::ComplianceRequired => "compliance_required",
        }
    }
}

/// What the guard decided for one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Public,
    Allow(RequestIdentity),
    RedirectToSignIn { location: String },
    Deny { location: String, reason: DenyReason },
}

/// Request-time access decisions for the portal
pub struct RouteGuard {
    public_paths: Vec<RoutePattern>,
    sign_in_path: String,
    role_source: RoleSource,
    claims_max_age: Duration,
    routes: RouteTable,
    sessions: SessionVerifier,
    identity: IdentityAdapter,
}

impl RouteGuard {
    pub fn new(config: &AccessConfig, routes: RouteTable, identity: IdentityAdapter) -> RbacResult<Self> {
        let public_paths = config
            .public_paths
            .iter()
            .map(|p| RoutePattern::new(p))
            .collect::<RbacResult<Vec<_>>>()?;

        let claims_max_age = Duration::from_std(config.claims_max_age)
            .map_err(|e| RbacError::invalid_config(format!("claims_max_age out of range: {}", e)))?;

        Ok(Self {
            public_paths,
            sign_in_path: config.sign_in_path.clone(),
            role_source: config.role_source,
            claims_max_age,
            routes,
            sessions: SessionVerifier::new(config.session.clone()),
            identity,
        })
    }

    pub fn sessions(&self) -> &SessionVerifier {
        &self.sessions
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    pub fn is_public(&self, path: &str) -> bool {
        self.public_paths.iter().any(|p| p.matches(path))
    }

    /// Authenticate from request headers, then [`evaluate`](Self::evaluate)
    pub async fn decide(&self, path_and_query: &str, headers: &HeaderMap) -> GuardDecision {
        let path = path_only(path_and_query);
        if self.is_public(path) {
            debug!("Public path {}", path);
            return GuardDecision::Public;
        }

        let claims = self.sessions.claims_from_headers(headers);
        self.evaluate(path_and_query, claims.as_ref()).await
    }

    /// Decide for an already-authenticated (or anonymous) caller
    pub async fn evaluate(&self, path_and_query: &str, claims: Option<&SessionClaims>) -> GuardDecision {
        let path = path_only(path_and_query);
        if self.is_public(path) {
            return GuardDecision::Public;
        }

        let Some(claims) = claims else {
            debug!("No session for {}, redirecting to sign-in", path);
            return GuardDecision::RedirectToSignIn {
                location: with_query(&self.sign_in_path, &[("redirect_url", path_and_query)]),
            };
        };

        let (role, principal) = self.caller_role(claims).await;
        let identity = RequestIdentity {
            user_id: claims.user_id().to_string(),
            role,
        };

        let Some(rule) = self.routes.first_match(path) else {
            return GuardDecision::Allow(identity);
        };

        if !rule.allows(role) {
            info!(
                "Denied {} ({}) on {}: requires {}",
                identity.user_id,
                role,
                path,
                rule.required_roles_label()
            );
            let label = rule.required_roles_label();
            return GuardDecision::Deny {
                location: with_query(
                    &rule.redirect_target,
                    &[
                        ("error", DenyReason::InsufficientPermissions.as_str()),
                        ("required_role", label.as_str()),
                    ],
                ),
                reason: DenyReason::InsufficientPermissions,
            };
        }

        if let Some(reason) = self.check_posture(rule, claims, principal).await {
            info!("Denied {} on {}: {}", identity.user_id, path, reason.as_str());
            return GuardDecision::Deny {
                location: with_query(&rule.redirect_target, &[("error", reason.as_str())]),
                reason,
            };
        }

        debug!("Allowed {} ({}) on {}", identity.user_id, role, path);
        GuardDecision::Allow(identity)
    }

    /// Role for this request plus the principal, when it had to be fetched
    async fn caller_role(&self, claims: &SessionClaims) -> (Role, Option<Principal>) {
        if self.role_source == RoleSource::Claims {
            match claims.age_at(Utc::now()) {
                Some(age) if age <= self.claims_max_age => {
                    return (claims.role_claim().unwrap_or(Role::DEFAULT), None);
                }
                _ => debug!("Role claim for {} too old, asking identity provider", claims.sub),
            }
        }

        match self.identity.resolve(Subject::Session(claims)).await {
            Ok(principal) => (principal.role, Some(principal)),
            Err(e) => {
                warn!("Could not resolve role for {}, using {}: {}", claims.sub, Role::DEFAULT, e);
                (Role::DEFAULT, None)
            }
        }
    }

    /// Two-factor and compliance requirements of `rule`; `None` when satisfied
    async fn check_posture(
        &self,
        rule: &RouteProtectionRule,
        claims: &SessionClaims,
        principal: Option<Principal>,
    ) -> Option<DenyReason> {
        if !rule.requires_2fa && !rule.requires_compliance {
            return None;
        }

        let closed = if rule.requires_2fa {
            DenyReason::TwoFactorRequired
        } else {
            DenyReason::ComplianceRequired
        };

        let principal = match principal {
            Some(principal) => principal,
            None => match self.identity.resolve(Subject::Session(claims)).await {
                Ok(principal) => principal,
                Err(e) => {
                    warn!("Posture check for {} failed closed: {}", claims.sub, e);
                    return Some(closed);
                }
            },
        };

        if rule.requires_2fa && !principal.metadata.has_2fa {
            return Some(DenyReason::TwoFactorRequired);
        }
        if rule.requires_compliance && !compliance::evaluate(&principal, Utc::now()).is_compliant() {
            return Some(DenyReason::ComplianceRequired);
        }
        None
    }
}

fn path_only(path_and_query: &str) -> &str {
    path_and_query
        .split_once('?')
        .map_or(path_and_query, |(path, _)| path)
}

fn with_query(target: &str, params: &[(&str, &str)]) -> String {
    let query = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(params)
        .finish();
    let separator = if target.contains('?') { '&' } else { '?' };
    format!("{}{}{}", target, separator, query)
}

/// Axum middleware applying a [`RouteGuard`] to every request
pub async fn route_guard_middleware(
    State(guard): State<Arc<RouteGuard>>,
    mut request: Request,
    next: Next,
) -> Response {
    // Identity headers are only ever set by the guard
    request.headers_mut().remove(USER_ID_HEADER);
    request.headers_mut().remove(USER_ROLE_HEADER);

    let uri = request
        .extensions()
        .get::<OriginalUri>()
        .map(|original| original.0.clone())
        .unwrap_or_else(|| request.uri().clone());
    let path_and_query = uri
        .path_and_query()
        .map_or_else(|| uri.path().to_string(), |pq| pq.as_str().to_string());

    match guard.decide(&path_and_query, request.headers()).await {
        GuardDecision::Public => next.run(request).await,
        GuardDecision::Allow(identity) => {
            attach_identity(&mut request, identity);
            next.run(request).await
        }
        GuardDecision::RedirectToSignIn { location } | GuardDecision::Deny { location, .. } => {
            Redirect::to(&location).into_response()
        }
    }
}

fn attach_identity(request: &mut Request, identity: RequestIdentity) {
    let headers = request.headers_mut();
    match HeaderValue::from_str(&identity.user_id) {
        Ok(value) => {
            headers.insert(HeaderName::from_static(USER_ID_HEADER), value);
        }
        Err(_) => warn!("Principal id {:?} is not a valid header value", identity.user_id),
    }
    headers.insert(
        HeaderName::from_static(USER_ROLE_HEADER),
        HeaderValue::from_static(identity.role.as_str()),
    );
    request.extensions_mut().insert(identity);
}

/// Put `router` behind `guard`
pub fn protect<S>(router: Router<S>, guard: Arc<RouteGuard>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.layer(axum::middleware::from_fn_with_state(guard, route_guard_middleware))
}
