//! Resource access guard: does this caller get this resource, in this tenant?
//!
//! Dispatch is a strategy per resource kind. The generic strategy covers
//! tenant-column resources (visit, insemination, bull, herd); users and
//! animals have their own rules (join-table membership and recorded-owner
//! resolution respectively) and replace the generic lookup wholesale.
//!
//! Denials never disclose more than the fixed decision set, and a resource
//! living in a foreign tenant is indistinguishable from one that does not
//! exist.

mod animal;
mod generic;
mod user;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, warn};

use herdbook_core::{OrganizationId, ResourceId};

use crate::principal::Principal;
use crate::roles::Role;
use crate::store::ResourceStore;
use crate::tenancy::{OrgIdSources, TenancyContext};

use animal::AnimalStrategy;
use generic::GenericStrategy;
use user::UserStrategy;

/// HTTP-shaped operation verb, decoupled from any framework's method type.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Verb {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Other,
}

impl Verb {
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_uppercase().as_str() {
            "GET" => Verb::Get,
            "POST" => Verb::Post,
            "PUT" => Verb::Put,
            "PATCH" => Verb::Patch,
            "DELETE" => Verb::Delete,
            _ => Verb::Other,
        }
    }

    /// The superadmin cross-tenant escalation covers read/write verbs but
    /// never DELETE.
    pub fn allows_cross_tenant_superadmin(&self) -> bool {
        matches!(self, Verb::Get | Verb::Post | Verb::Put | Verb::Patch)
    }
}

/// Closed set of guardable resource kinds.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Visit,
    Insemination,
    Bull,
    Herd,
    User,
    Animal,
}

impl ResourceKind {
    /// Backing table for kinds served by the generic organization-column
    /// lookup. `None` for kinds with specialized strategies.
    pub fn table(&self) -> Option<&'static str> {
        match self {
            ResourceKind::Visit => Some("visits"),
            ResourceKind::Insemination => Some("inseminations"),
            ResourceKind::Bull => Some("bulls"),
            ResourceKind::Herd => Some("herds"),
            ResourceKind::User | ResourceKind::Animal => None,
        }
    }

    /// URL path segment under which item ids for this kind appear.
    pub fn path_segment(&self) -> &'static str {
        match self {
            ResourceKind::Visit => "visits",
            ResourceKind::Insemination => "inseminations",
            ResourceKind::Bull => "bulls",
            ResourceKind::Herd => "herds",
            ResourceKind::User => "users",
            ResourceKind::Animal => "animals",
        }
    }
}

impl core::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.path_segment())
    }
}

/// Terminal outcome of one guard check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    Allow {
        organization_id: Option<OrganizationId>,
        role: Option<Role>,
    },
    DenyUnauthenticated,
    DenyMissingOrganization,
    DenyNotMember,
    DenyInsufficientRole,
    DenyResourceNotFound,
    DenyResourceForeignTenant,
    ErrorConfiguration(String),
    ErrorStorage(String),
}

/// Everything a strategy may consult for one decision.
pub struct AccessRequest<'a> {
    pub principal: &'a Principal,
    pub context: &'a TenancyContext,
    pub sources: &'a OrgIdSources,
    pub verb: Verb,
    pub resource_id: Option<ResourceId>,
}

/// Uniform contract each resource kind's rules implement.
#[async_trait]
trait ResourceStrategy: Send + Sync {
    async fn authorize(&self, store: &dyn ResourceStore, req: &AccessRequest<'_>)
        -> AccessDecision;
}

fn strategy_for(kind: ResourceKind) -> Box<dyn ResourceStrategy> {
    match kind {
        k @ (ResourceKind::Visit
        | ResourceKind::Insemination
        | ResourceKind::Bull
        | ResourceKind::Herd) => Box::new(GenericStrategy { kind: k }),
        ResourceKind::User => Box::new(UserStrategy),
        ResourceKind::Animal => Box::new(AnimalStrategy),
    }
}

/// Organization id for a guard decision: context first, then explicit
/// path/query/body sources (no header at this stage), then the caller's
/// first membership.
fn resolve_organization(req: &AccessRequest<'_>) -> Option<OrganizationId> {
    req.context
        .organization_id()
        .or_else(|| req.sources.explicit(false))
        .or_else(|| req.principal.first_membership().map(|m| m.organization_id))
}

/// Steps shared by membership-gated strategies: an organization must resolve
/// and the caller must be a member of it.
fn member_context(req: &AccessRequest<'_>) -> Result<(OrganizationId, Role), AccessDecision> {
    let Some(organization_id) = resolve_organization(req) else {
        return Err(AccessDecision::DenyMissingOrganization);
    };
    let Some(membership) = req.principal.membership_for(organization_id) else {
        return Err(AccessDecision::DenyNotMember);
    };
    Ok((organization_id, membership.role))
}

/// The guard itself: strategy dispatch plus decision logging.
pub struct ResourceAccessGuard {
    store: Arc<dyn ResourceStore>,
}

impl ResourceAccessGuard {
    pub fn new(store: Arc<dyn ResourceStore>) -> Self {
        Self { store }
    }

    pub async fn check(
        &self,
        kind: ResourceKind,
        principal: Option<&Principal>,
        context: &TenancyContext,
        sources: &OrgIdSources,
        verb: Verb,
        resource_id: Option<ResourceId>,
    ) -> AccessDecision {
        let Some(principal) = principal else {
            return AccessDecision::DenyUnauthenticated;
        };

        let req = AccessRequest {
            principal,
            context,
            sources,
            verb,
            resource_id,
        };

        let decision = strategy_for(kind).authorize(self.store.as_ref(), &req).await;

        match &decision {
            AccessDecision::Allow {
                organization_id,
                role,
            } => {
                debug!(
                    resource = %kind,
                    user_id = %principal.user_id,
                    organization_id = ?organization_id,
                    role = ?role,
                    "access allowed"
                );
            }
            AccessDecision::ErrorStorage(detail) => {
                error!(resource = %kind, user_id = %principal.user_id, %detail, "storage error during access check");
            }
            AccessDecision::ErrorConfiguration(detail) => {
                error!(resource = %kind, %detail, "guard misconfiguration");
            }
            other => {
                warn!(
                    resource = %kind,
                    user_id = %principal.user_id,
                    decision = ?other,
                    "access denied"
                );
            }
        }

        decision
    }
}

#[cfg(test)]
pub(crate) mod testutil {
    use std::collections::HashMap;
    use std::sync::RwLock;

    use async_trait::async_trait;

    use herdbook_core::{OrganizationId, ResourceId, UserId};

    use crate::membership::Membership;
    use crate::principal::{IdentitySource, Principal, UserProfile};
    use crate::roles::Role;
    use crate::store::{
        AnimalRecord, ResourceRow, ResourceStore, StoreError, UserDirectoryRecord,
    };

    use super::ResourceKind;

    #[derive(Default)]
    pub struct FakeResourceStore {
        pub rows: RwLock<HashMap<(ResourceKind, ResourceId), OrganizationId>>,
        pub users: RwLock<HashMap<UserId, Vec<Membership>>>,
        pub animals: RwLock<HashMap<ResourceId, AnimalRecord>>,
        pub fail: std::sync::atomic::AtomicBool,
    }

    impl FakeResourceStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_row(self, kind: ResourceKind, id: i64, org: i64) -> Self {
            self.rows.write().unwrap().insert(
                (kind, ResourceId::new(id)),
                OrganizationId::new(org),
            );
            self
        }

        pub fn with_user(self, id: i64, memberships: Vec<Membership>) -> Self {
            self.users.write().unwrap().insert(UserId::new(id), memberships);
            self
        }

        pub fn with_animal(self, id: i64, owner: i64, owner_orgs: Vec<i64>) -> Self {
            self.animals.write().unwrap().insert(
                ResourceId::new(id),
                AnimalRecord {
                    id: ResourceId::new(id),
                    owner_id: UserId::new(owner),
                    owner_organizations: owner_orgs
                        .into_iter()
                        .map(OrganizationId::new)
                        .collect(),
                },
            );
            self
        }

        fn check_fail(&self) -> Result<(), StoreError> {
            if self.fail.load(std::sync::atomic::Ordering::SeqCst) {
                return Err(StoreError::Backend("injected failure".into()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl ResourceStore for FakeResourceStore {
        async fn find_in_organization(
            &self,
            kind: ResourceKind,
            id: ResourceId,
            organization_id: OrganizationId,
        ) -> Result<Option<ResourceRow>, StoreError> {
            self.check_fail()?;
            Ok(self
                .rows
                .read()
                .unwrap()
                .get(&(kind, id))
                .filter(|org| **org == organization_id)
                .map(|org| ResourceRow {
                    id,
                    organization_id: *org,
                }))
        }

        async fn find_user(
            &self,
            id: UserId,
        ) -> Result<Option<UserDirectoryRecord>, StoreError> {
            self.check_fail()?;
            Ok(self.users.read().unwrap().get(&id).map(|m| UserDirectoryRecord {
                user_id: id,
                memberships: m.clone(),
            }))
        }

        async fn find_animal(&self, id: ResourceId) -> Result<Option<AnimalRecord>, StoreError> {
            self.check_fail()?;
            Ok(self.animals.read().unwrap().get(&id).cloned())
        }
    }

    pub fn principal(id: i64, memberships: Vec<(i64, Role)>) -> Principal {
        Principal {
            user_id: UserId::new(id),
            profile: UserProfile {
                id: UserId::new(id),
                email: format!("user{id}@herd.example"),
                name: None,
            },
            memberships: memberships
                .into_iter()
                .map(|(org, role)| Membership::new(OrganizationId::new(org), role))
                .collect(),
            source: IdentitySource::Live,
        }
    }
}
