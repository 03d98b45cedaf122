//! Resource ownership hooks.
//!
//! The access-control core does not own artworks or orders; it asks a
//! [`ResourceOwners`] implementation who owns a given id and applies
//! [`may_act_on`] uniformly.

use std::fmt;

use async_trait::async_trait;
use dashmap::DashMap;
use sqlx::PgPool;
use thiserror::Error;

use crate::models::auth::Principal;

/// Resources whose routes carry an owner check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OwnedResource {
    /// Owned by the artist who listed it.
    Artwork,
    /// Owned by the customer who placed it.
    Order,
    /// A user account is owned by itself.
    UserAccount,
}

impl fmt::Display for OwnedResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OwnedResource::Artwork => "artwork",
            OwnedResource::Order => "order",
            OwnedResource::UserAccount => "user",
        })
    }
}

#[derive(Debug, Error)]
pub enum OwnershipError {
    #[error("Database error: {0}")]
    DbError(#[from] sqlx::Error),
}

/// Admins act on anything; everyone else only on what they own.
pub fn may_act_on(principal: &Principal, owner_subject: &str) -> bool {
    principal.is_admin() || principal.subject == owner_subject
}

/// Lookup of the owning subject for a resource id.
#[async_trait]
pub trait ResourceOwners: Send + Sync {
    /// `Ok(None)` when the resource does not exist.
    async fn owner_of(
        &self,
        resource: OwnedResource,
        id: &str,
    ) -> Result<Option<String>, OwnershipError>;
}

/// Resolve an owner, short-circuiting resources that own themselves.
pub async fn resolve_owner(
    owners: &dyn ResourceOwners,
    resource: OwnedResource,
    id: &str,
) -> Result<Option<String>, OwnershipError> {
    match resource {
        OwnedResource::UserAccount => Ok(Some(id.to_string())),
        _ => owners.owner_of(resource, id).await,
    }
}

// =============================================================================
// Backends
// =============================================================================

/// In-memory ownership registry; collaborators register resources as they
/// create them.
#[derive(Debug, Default)]
pub struct MemoryResourceOwners {
    owners: DashMap<(OwnedResource, String), String>,
}

impl MemoryResourceOwners {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, resource: OwnedResource, id: &str, owner_subject: &str) {
        self.owners
            .insert((resource, id.to_string()), owner_subject.to_string());
    }

    pub fn forget(&self, resource: OwnedResource, id: &str) {
        self.owners.remove(&(resource, id.to_string()));
    }
}

#[async_trait]
impl ResourceOwners for MemoryResourceOwners {
    async fn owner_of(
        &self,
        resource: OwnedResource,
        id: &str,
    ) -> Result<Option<String>, OwnershipError> {
        Ok(self
            .owners
            .get(&(resource, id.to_string()))
            .map(|owner| owner.value().clone()))
    }
}

/// Ownership read from the collaborators' tables
/// (`artworks.artist_id`, `orders.customer_id`).
#[derive(Debug, Clone)]
pub struct PgResourceOwners {
    pool: PgPool,
}

impl PgResourceOwners {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Owner lookup for a resource table. Ids are compared as text: the
/// collaborators store them as varchar.
fn owner_query(resource: OwnedResource) -> Option<&'static str> {
    match resource {
        OwnedResource::Artwork => {
            Some("SELECT artist_id::text FROM artworks WHERE id::text = $1")
        }
        OwnedResource::Order => Some("SELECT customer_id::text FROM orders WHERE id::text = $1"),
        OwnedResource::UserAccount => None,
    }
}

#[async_trait]
impl ResourceOwners for PgResourceOwners {
    async fn owner_of(
        &self,
        resource: OwnedResource,
        id: &str,
    ) -> Result<Option<String>, OwnershipError> {
        let Some(sql) = owner_query(resource) else {
            return Ok(Some(id.to_string()));
        };
        let owner = sqlx::query_scalar::<_, String>(sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(owner)
    }
}
