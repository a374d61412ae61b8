//! Identity provider adapter
//!
//! The identity provider is the single source of truth for who a principal
//! is and which role they hold. Nothing read from it is cached between calls.

use async_trait::async_trait;
use secureaware_config::domains::access::MAX_LIST_PAGE_SIZE;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{IdentityError, RbacError, RbacResult};
use crate::metadata::MetadataPatch;
use crate::models::{IdentityRecord, Principal, Subject};
use crate::roles::Role;
use crate::session::SessionClaims;

pub use crate::metadata::MetadataBag;

/// Operations the external identity provider must offer
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Fetch a user; `Ok(None)` when no such user exists
    async fn get_user(&self, user_id: &str) -> Result<Option<IdentityRecord>, IdentityError>;

    /// Replace the user's whole metadata bag
    async fn update_user_metadata(
        &self,
        user_id: &str,
        metadata: MetadataBag,
    ) -> Result<IdentityRecord, IdentityError>;

    /// One page of users in a stable order
    async fn list_users(
        &self,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<IdentityRecord>, IdentityError>;
}

/// Outcome of a metadata write
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataUpdate {
    Updated(Principal),
    Failed { reason: String },
}

impl MetadataUpdate {
    pub fn is_updated(&self) -> bool {
        matches!(self, MetadataUpdate::Updated(_))
    }
}

/// Typed access to principals held by an [`IdentityProvider`]
#[derive(Clone)]
pub struct IdentityAdapter {
    provider: Arc<dyn IdentityProvider>,
}

impl IdentityAdapter {
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        Self { provider }
    }

    /// The caller identified by a verified session, or `None` if the provider
    /// does not know them or cannot be reached
    pub async fn current_principal(&self, claims: &SessionClaims) -> Option<Principal> {
        self.principal_by_id(claims.user_id()).await
    }

    pub async fn principal_by_id(&self, principal_id: &str) -> Option<Principal> {
        match self.fetch(principal_id).await {
            Ok(principal) => Some(principal),
            Err(e) if e.is_not_found() => {
                debug!("Principal {} not found", principal_id);
                None
            }
            Err(e) => {
                warn!("Failed to load principal {}: {}", principal_id, e);
                None
            }
        }
    }

    /// Resolve a subject, surfacing every failure.
    ///
    /// An already-resolved principal is returned as-is without a provider round trip.
    pub async fn resolve(&self, subject: Subject<'_>) -> RbacResult<Principal> {
        match subject {
            Subject::Principal(principal) => Ok(principal.clone()),
            Subject::Id(id) => self.fetch(id).await,
            Subject::Session(claims) => self.fetch(claims.user_id()).await,
        }
    }

    /// Effective role of a subject; the default role on any failure
    pub async fn role_of(&self, subject: Subject<'_>) -> Role {
        match self.resolve(subject).await {
            Ok(principal) => principal.role,
            Err(e) => {
                warn!(
                    "Could not resolve role for {}, using {}: {}",
                    subject.id(),
                    Role::DEFAULT,
                    e
                );
                Role::DEFAULT
            }
        }
    }

    /// Merge `patch` into the principal's stored metadata.
    ///
    /// Reads the current bag, applies only the patched keys and writes the
    /// merged bag back. Two writers racing on the same principal can still
    /// lose an update; the provider offers no compare-and-swap.
    pub async fn update_metadata(&self, principal_id: &str, patch: MetadataPatch) -> MetadataUpdate {
        match self.try_update_metadata(principal_id, &patch).await {
            Ok(principal) => MetadataUpdate::Updated(principal),
            Err(e) => {
                warn!("Metadata update for {} failed: {}", principal_id, e);
                MetadataUpdate::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }

    pub(crate) async fn try_update_metadata(
        &self,
        principal_id: &str,
        patch: &MetadataPatch,
    ) -> RbacResult<Principal> {
        let record = self.fetch_record(principal_id).await?;

        let mut bag = record.metadata;
        patch.apply_to(&mut bag);

        let updated = self.provider.update_user_metadata(principal_id, bag).await?;
        debug!("Updated metadata for principal {}", principal_id);
        Ok(Principal::from_record(&updated))
    }

    /// Every principal, fetched `page_size` at a time.
    ///
    /// The page size is clamped to `1..=MAX_LIST_PAGE_SIZE`.
    pub async fn list_principals(&self, page_size: usize) -> RbacResult<Vec<Principal>> {
        let limit = page_size.clamp(1, MAX_LIST_PAGE_SIZE);
        let mut principals = Vec::new();
        let mut offset = 0;

        loop {
            let page = self.provider.list_users(offset, limit).await?;
            let fetched = page.len();
            principals.extend(page.iter().map(Principal::from_record));

            if fetched < limit {
                break;
            }
            offset += fetched;
        }

        debug!("Listed {} principals", principals.len());
        Ok(principals)
    }

    async fn fetch_record(&self, principal_id: &str) -> RbacResult<IdentityRecord> {
        self.provider
            .get_user(principal_id)
            .await?
            .ok_or_else(|| RbacError::PrincipalNotFound {
                principal_id: principal_id.to_string(),
            })
    }

    async fn fetch(&self, principal_id: &str) -> RbacResult<Principal> {
        self.fetch_record(principal_id)
            .await
            .map(|record| Principal::from_record(&record))
    }
}
