//! Storage ports consumed by the authorization core.
//!
//! These traits are the core's only view of the relational store. Adapters
//! live in `herdbook-store`; the core never sees a connection pool. All
//! operations are read-only and single round-trip.

use async_trait::async_trait;
use thiserror::Error;

use herdbook_core::{OrganizationId, ResourceId, UserId};

use crate::guard::ResourceKind;
use crate::membership::Membership;

/// Raw user row as stored. `password_hash` never travels past this type;
/// [`crate::UserProfile`] construction drops it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: UserId,
    pub email: String,
    pub name: Option<String>,
    pub password_hash: Option<String>,
}

/// Minimal tenant-scoped resource row used by the generic guard path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceRow {
    pub id: ResourceId,
    pub organization_id: OrganizationId,
}

/// A target user as seen by the user-resource strategy: the user plus the
/// organizations it belongs to (join-table rows, not an owner column).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserDirectoryRecord {
    pub user_id: UserId,
    pub memberships: Vec<Membership>,
}

/// An animal plus its recorded owner and the owner's organizations, fetched
/// in one round trip so the ownership rule needs no second lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnimalRecord {
    pub id: ResourceId,
    pub owner_id: UserId,
    pub owner_organizations: Vec<OrganizationId>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Authoritative source of "user X has role R in organization O".
#[async_trait]
pub trait MembershipStore: Send + Sync {
    /// Minimal profile lookup; the degraded-mode fallback.
    async fn get_user_by_id(&self, id: UserId) -> Result<Option<UserRecord>, StoreError>;

    /// Full profile plus live membership rows.
    async fn get_user_with_memberships(
        &self,
        id: UserId,
    ) -> Result<Option<(UserRecord, Vec<Membership>)>, StoreError>;

    /// Live membership rows only (used for the single per-request refresh).
    async fn get_organization_memberships(
        &self,
        user_id: UserId,
    ) -> Result<Vec<Membership>, StoreError>;
}

/// Per-resource lookups for the access guard. Every query is scoped so that
/// a foreign-tenant row and a missing row are indistinguishable results.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Fetch a generic resource row filtered by id *and* organization.
    async fn find_in_organization(
        &self,
        kind: ResourceKind,
        id: ResourceId,
        organization_id: OrganizationId,
    ) -> Result<Option<ResourceRow>, StoreError>;

    /// Fetch a target user with its organization memberships.
    async fn find_user(&self, id: UserId) -> Result<Option<UserDirectoryRecord>, StoreError>;

    /// Fetch an animal with its owner's organizations.
    async fn find_animal(&self, id: ResourceId) -> Result<Option<AnimalRecord>, StoreError>;
}
