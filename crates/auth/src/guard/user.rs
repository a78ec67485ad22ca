//! User/client strategy: join-table membership, role-to-role visibility.
//!
//! Rules, in evaluation order:
//! - anyone may access their own user record;
//! - client/farmer callers get nothing else, same tenant or not;
//! - staff may view client/farmer users of their organization, never other
//!   staff;
//! - owner/admin may access any user of their organization;
//! - superadmin may additionally cross tenant boundaries for GET/POST/PUT/
//!   PATCH, never DELETE.

use async_trait::async_trait;

use herdbook_core::UserId;

use crate::roles::Role;
use crate::store::ResourceStore;

use super::{member_context, AccessDecision, AccessRequest, ResourceStrategy};

pub(super) struct UserStrategy;

#[async_trait]
impl ResourceStrategy for UserStrategy {
    async fn authorize(
        &self,
        store: &dyn ResourceStore,
        req: &AccessRequest<'_>,
    ) -> AccessDecision {
        let (organization_id, caller_role) = match member_context(req) {
            Ok(v) => v,
            Err(denial) => return denial,
        };

        let allow = AccessDecision::Allow {
            organization_id: Some(organization_id),
            role: Some(caller_role),
        };

        let Some(resource_id) = req.resource_id else {
            return allow;
        };
        let target_id = UserId::new(resource_id.as_i64());

        // Own record first: this also covers client/farmer self-service.
        if target_id == req.principal.user_id {
            return allow;
        }

        if caller_role.is_client() {
            return AccessDecision::DenyInsufficientRole;
        }

        let target = match store.find_user(target_id).await {
            Ok(Some(record)) => record,
            Ok(None) => return AccessDecision::DenyResourceNotFound,
            Err(err) => return AccessDecision::ErrorStorage(err.to_string()),
        };

        let same_org = target
            .memberships
            .iter()
            .find(|m| m.organization_id == organization_id);

        match caller_role {
            Role::Superadmin => match same_org {
                Some(_) => allow,
                None if req.verb.allows_cross_tenant_superadmin() => allow,
                None => AccessDecision::DenyInsufficientRole,
            },
            Role::Owner | Role::Admin => match same_org {
                Some(_) => allow,
                None => AccessDecision::DenyResourceNotFound,
            },
            role if role.is_staff() => match same_org {
                Some(target_membership) if target_membership.role.is_client() => allow,
                Some(_) => AccessDecision::DenyInsufficientRole,
                None => AccessDecision::DenyResourceNotFound,
            },
            _ => AccessDecision::DenyInsufficientRole,
        }
    }
}
