//! In-memory membership and resource stores.
//!
//! Intended for tests/dev. Not optimized for performance. The `fail_*`
//! switches inject backend faults so degraded-identity and storage-error
//! paths can be driven end to end.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;

use herdbook_auth::{
    AnimalRecord, Membership, MembershipStore, ResourceKind, ResourceRow, ResourceStore,
    StoreError, UserDirectoryRecord, UserRecord,
};
use herdbook_core::{OrganizationId, ResourceId, UserId};

fn poisoned() -> StoreError {
    StoreError::Backend("lock poisoned".to_string())
}

fn injected() -> StoreError {
    StoreError::Backend("injected backend failure".to_string())
}

#[derive(Debug, Default)]
pub struct InMemoryMembershipStore {
    users: RwLock<HashMap<UserId, UserRecord>>,
    memberships: RwLock<HashMap<UserId, Vec<Membership>>>,
    fail_enriched: AtomicBool,
    fail_all: AtomicBool,
}

impl InMemoryMembershipStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(self, record: UserRecord, memberships: Vec<Membership>) -> Self {
        {
            let id = record.id;
            self.users.write().unwrap().insert(id, record);
            self.memberships.write().unwrap().insert(id, memberships);
        }
        self
    }

    /// Fail only the enriched lookup; the minimal profile lookup keeps
    /// working. Drives the identity resolver's degraded branch.
    pub fn set_fail_enriched(&self, fail: bool) {
        self.fail_enriched.store(fail, Ordering::SeqCst);
    }

    /// Fail every lookup.
    pub fn set_fail_all(&self, fail: bool) {
        self.fail_all.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl MembershipStore for InMemoryMembershipStore {
    async fn get_user_by_id(&self, id: UserId) -> Result<Option<UserRecord>, StoreError> {
        if self.fail_all.load(Ordering::SeqCst) {
            return Err(injected());
        }
        Ok(self.users.read().map_err(|_| poisoned())?.get(&id).cloned())
    }

    async fn get_user_with_memberships(
        &self,
        id: UserId,
    ) -> Result<Option<(UserRecord, Vec<Membership>)>, StoreError> {
        if self.fail_all.load(Ordering::SeqCst) || self.fail_enriched.load(Ordering::SeqCst) {
            return Err(injected());
        }
        let users = self.users.read().map_err(|_| poisoned())?;
        let Some(user) = users.get(&id).cloned() else {
            return Ok(None);
        };
        let memberships = self
            .memberships
            .read()
            .map_err(|_| poisoned())?
            .get(&id)
            .cloned()
            .unwrap_or_default();
        Ok(Some((user, memberships)))
    }

    async fn get_organization_memberships(
        &self,
        user_id: UserId,
    ) -> Result<Vec<Membership>, StoreError> {
        if self.fail_all.load(Ordering::SeqCst) {
            return Err(injected());
        }
        Ok(self
            .memberships
            .read()
            .map_err(|_| poisoned())?
            .get(&user_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryResourceStore {
    rows: RwLock<HashMap<(ResourceKind, ResourceId), OrganizationId>>,
    users: RwLock<HashMap<UserId, Vec<Membership>>>,
    animals: RwLock<HashMap<ResourceId, AnimalRecord>>,
    fail_all: AtomicBool,
}

impl InMemoryResourceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resource(self, kind: ResourceKind, id: i64, organization_id: i64) -> Self {
        self.rows.write().unwrap().insert(
            (kind, ResourceId::new(id)),
            OrganizationId::new(organization_id),
        );
        self
    }

    pub fn with_user(self, user_id: i64, memberships: Vec<Membership>) -> Self {
        self.users
            .write()
            .unwrap()
            .insert(UserId::new(user_id), memberships);
        self
    }

    pub fn with_animal(self, id: i64, owner_id: i64, owner_organizations: Vec<i64>) -> Self {
        self.animals.write().unwrap().insert(
            ResourceId::new(id),
            AnimalRecord {
                id: ResourceId::new(id),
                owner_id: UserId::new(owner_id),
                owner_organizations: owner_organizations
                    .into_iter()
                    .map(OrganizationId::new)
                    .collect(),
            },
        );
        self
    }

    pub fn set_fail_all(&self, fail: bool) {
        self.fail_all.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl ResourceStore for InMemoryResourceStore {
    async fn find_in_organization(
        &self,
        kind: ResourceKind,
        id: ResourceId,
        organization_id: OrganizationId,
    ) -> Result<Option<ResourceRow>, StoreError> {
        if self.fail_all.load(Ordering::SeqCst) {
            return Err(injected());
        }
        Ok(self
            .rows
            .read()
            .map_err(|_| poisoned())?
            .get(&(kind, id))
            .filter(|org| **org == organization_id)
            .map(|org| ResourceRow {
                id,
                organization_id: *org,
            }))
    }

    async fn find_user(&self, id: UserId) -> Result<Option<UserDirectoryRecord>, StoreError> {
        if self.fail_all.load(Ordering::SeqCst) {
            return Err(injected());
        }
        Ok(self
            .users
            .read()
            .map_err(|_| poisoned())?
            .get(&id)
            .map(|memberships| UserDirectoryRecord {
                user_id: id,
                memberships: memberships.clone(),
            }))
    }

    async fn find_animal(&self, id: ResourceId) -> Result<Option<AnimalRecord>, StoreError> {
        if self.fail_all.load(Ordering::SeqCst) {
            return Err(injected());
        }
        Ok(self.animals.read().map_err(|_| poisoned())?.get(&id).cloned())
    }
}
