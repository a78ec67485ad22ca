//! Coarse membership/role gate: no per-resource storage lookups.
//!
//! Unlike the tenancy resolver, the gate does not consult the dedicated
//! organization header. The asymmetry is deliberate and load-bearing: this
//! gate runs earlier in some routes, before header-driven cross-origin
//! clients are in play.

use tracing::warn;

use crate::principal::Principal;
use crate::roles::Role;
use crate::tenancy::{OrgIdSources, TenancyContext};

/// Denials the gate can produce, each with a machine-readable wire code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDenial {
    MissingOrganization,
    NotMember,
    InsufficientRole,
}

impl GateDenial {
    pub fn code(&self) -> &'static str {
        match self {
            GateDenial::MissingOrganization => "ORGANIZATION_REQUIRED",
            GateDenial::NotMember => "NOT_ORGANIZATION_MEMBER",
            GateDenial::InsufficientRole => "ROLE_PERMISSION_DENIED",
        }
    }
}

/// Per-route gate configuration: which roles may pass, and whether an
/// organization context is required at all.
#[derive(Debug, Clone)]
pub struct RoleGate {
    allowed: Vec<Role>,
    require_organization: bool,
}

impl RoleGate {
    /// Gate that requires membership in the active organization with one of
    /// the given roles.
    pub fn allowing(roles: impl IntoIterator<Item = Role>) -> Self {
        Self {
            allowed: roles.into_iter().collect(),
            require_organization: true,
        }
    }

    /// Gate that only requires authentication; membership and role are not
    /// checked at all.
    pub fn authenticated_only() -> Self {
        Self {
            allowed: Vec::new(),
            require_organization: false,
        }
    }

    /// Check the gate. On success the returned context carries the resolved
    /// organization and role for downstream handlers.
    pub fn check(
        &self,
        principal: &Principal,
        ctx: &TenancyContext,
        sources: &OrgIdSources,
    ) -> Result<TenancyContext, GateDenial> {
        if !self.require_organization {
            return Ok(ctx.clone());
        }

        let organization_id = ctx
            .organization_id()
            .or_else(|| sources.explicit(false))
            .or_else(|| principal.first_membership().map(|m| m.organization_id))
            .ok_or(GateDenial::MissingOrganization)?;

        let membership = principal
            .membership_for(organization_id)
            .ok_or(GateDenial::NotMember)?;

        if !self.allowed.contains(&membership.role) {
            warn!(
                user_id = %principal.user_id,
                organization_id = %organization_id,
                role = %membership.role,
                "role not permitted for this route"
            );
            return Err(GateDenial::InsufficientRole);
        }

        let mut out = ctx.clone();
        out.fill(organization_id, Some(membership.role));
        out.fill_role(membership.role);
        Ok(out)
    }
}
