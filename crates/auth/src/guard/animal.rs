//! Animal strategy: ownership resolved through the recorded owner.
//!
//! Farm data is personally owned even inside a shared organization, so
//! ownership layers a stricter filter on top of tenancy: the owner always
//! passes, a client/farmer who is not the owner never does, and staff pass
//! only when the owner belongs to their organization.

use async_trait::async_trait;

use crate::store::ResourceStore;

use super::{
    member_context, resolve_organization, AccessDecision, AccessRequest, ResourceStrategy,
};

pub(super) struct AnimalStrategy;

#[async_trait]
impl ResourceStrategy for AnimalStrategy {
    async fn authorize(
        &self,
        store: &dyn ResourceStore,
        req: &AccessRequest<'_>,
    ) -> AccessDecision {
        // Collections scope by membership like any tenant listing.
        let Some(resource_id) = req.resource_id else {
            return match member_context(req) {
                Ok((organization_id, role)) => AccessDecision::Allow {
                    organization_id: Some(organization_id),
                    role: Some(role),
                },
                Err(denial) => denial,
            };
        };

        let animal = match store.find_animal(resource_id).await {
            Ok(Some(animal)) => animal,
            Ok(None) => return AccessDecision::DenyResourceNotFound,
            Err(err) => return AccessDecision::ErrorStorage(err.to_string()),
        };

        // The owner passes regardless of any organization membership.
        if animal.owner_id == req.principal.user_id {
            let organization_id = resolve_organization(req);
            let role = organization_id
                .and_then(|org| req.principal.membership_for(org))
                .map(|m| m.role);
            return AccessDecision::Allow {
                organization_id,
                role,
            };
        }

        let (organization_id, role) = match member_context(req) {
            Ok(v) => v,
            Err(denial) => return denial,
        };

        if role.is_client() {
            return AccessDecision::DenyInsufficientRole;
        }

        if animal.owner_organizations.contains(&organization_id) {
            AccessDecision::Allow {
                organization_id: Some(organization_id),
                role: Some(role),
            }
        } else {
            AccessDecision::DenyResourceForeignTenant
        }
    }
}
