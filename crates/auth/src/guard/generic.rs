//! Generic strategy for resources carrying an organization column.

use async_trait::async_trait;

use crate::store::ResourceStore;

use super::{member_context, AccessDecision, AccessRequest, ResourceKind, ResourceStrategy};

/// Visit/insemination/bull/herd: membership plus a single lookup filtered by
/// id *and* organization, so a foreign-tenant row reads as absent.
pub(super) struct GenericStrategy {
    pub kind: ResourceKind,
}

#[async_trait]
impl ResourceStrategy for GenericStrategy {
    async fn authorize(
        &self,
        store: &dyn ResourceStore,
        req: &AccessRequest<'_>,
    ) -> AccessDecision {
        let (organization_id, role) = match member_context(req) {
            Ok(v) => v,
            Err(denial) => return denial,
        };

        // Collection endpoints: membership settles it, no row to check.
        let Some(resource_id) = req.resource_id else {
            return AccessDecision::Allow {
                organization_id: Some(organization_id),
                role: Some(role),
            };
        };

        match store
            .find_in_organization(self.kind, resource_id, organization_id)
            .await
        {
            Ok(Some(_row)) => AccessDecision::Allow {
                organization_id: Some(organization_id),
                role: Some(role),
            },
            Ok(None) => AccessDecision::DenyResourceNotFound,
            Err(err) => AccessDecision::ErrorStorage(err.to_string()),
        }
    }
}
