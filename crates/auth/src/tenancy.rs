//! Tenancy context resolution: which organization, with what role.
//!
//! The context is an explicit value threaded through the pipeline, not an
//! ambient mutation on the request: once an earlier stage has filled the
//! organization id, later stages can only read it. Resolution never fails a
//! request; detection lives here, enforcement lives in the gates.

use std::sync::Arc;

use tracing::{debug, warn};

use herdbook_core::OrganizationId;

use crate::principal::Principal;
use crate::roles::Role;
use crate::store::MembershipStore;

/// Request-scoped record of the active organization and the caller's role in
/// it. Write-once per request: `fill` is a no-op when already resolved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TenancyContext {
    organization_id: Option<OrganizationId>,
    role: Option<Role>,
}

impl TenancyContext {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn organization_id(&self) -> Option<OrganizationId> {
        self.organization_id
    }

    pub fn role(&self) -> Option<Role> {
        self.role
    }

    pub fn is_resolved(&self) -> bool {
        self.organization_id.is_some()
    }

    /// Fill the context if and only if no organization is set yet. Returns
    /// whether the write happened.
    pub fn fill(&mut self, organization_id: OrganizationId, role: Option<Role>) -> bool {
        if self.organization_id.is_some() {
            return false;
        }
        self.organization_id = Some(organization_id);
        self.role = role;
        true
    }

    /// Fill only the role, when absent. The organization is untouched.
    pub fn fill_role(&mut self, role: Role) -> bool {
        if self.role.is_some() {
            return false;
        }
        self.role = Some(role);
        true
    }
}

/// Raw organization-id candidates pulled from one request, one per source.
///
/// Values are kept as strings: parsing (and the decision to skip garbage) is
/// the resolver's job, so the HTTP layer stays dumb.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrgIdSources {
    pub path: Option<String>,
    pub query: Option<String>,
    pub body: Option<String>,
    pub header: Option<String>,
}

impl OrgIdSources {
    pub fn none() -> Self {
        Self::default()
    }

    /// First parseable explicit id in precedence order: path, query, body,
    /// then (only where the caller opts in) the dedicated header. Unparsable
    /// candidates are logged and skipped so garbage in one source cannot mask
    /// a well-formed id in a later one.
    pub fn explicit(&self, include_header: bool) -> Option<OrganizationId> {
        let candidates = [
            ("path", self.path.as_deref()),
            ("query", self.query.as_deref()),
            ("body", self.body.as_deref()),
            ("header", include_header.then_some(self.header.as_deref()).flatten()),
        ];

        for (source, candidate) in candidates {
            let Some(raw) = candidate else { continue };
            match raw.parse::<OrganizationId>() {
                Ok(id) => return Some(id),
                Err(_) => {
                    warn!(source, value = raw, "ignoring unparsable organization id");
                }
            }
        }
        None
    }
}

/// Resolves the active organization for one request.
pub struct TenancyResolver {
    store: Arc<dyn MembershipStore>,
}

impl TenancyResolver {
    pub fn new(store: Arc<dyn MembershipStore>) -> Self {
        Self { store }
    }

    /// Resolve the context. At most one live membership lookup; a fresher
    /// list found that way is written through to the principal for the rest
    /// of this request only.
    pub async fn resolve(
        &self,
        mut ctx: TenancyContext,
        principal: &mut Principal,
        sources: &OrgIdSources,
    ) -> TenancyContext {
        if ctx.is_resolved() {
            return ctx;
        }

        if let Some(org) = sources.explicit(true) {
            if let Some(m) = principal.membership_for(org) {
                ctx.fill(org, Some(m.role));
                return ctx;
            }

            // Not in the snapshot: one live re-check before giving up.
            match self.store.get_organization_memberships(principal.user_id).await {
                Ok(fresh) => {
                    principal.replace_memberships(fresh);
                    if let Some(m) = principal.membership_for(org) {
                        ctx.fill(org, Some(m.role));
                        return ctx;
                    }
                    warn!(
                        user_id = %principal.user_id,
                        organization_id = %org,
                        "requested organization is not among caller's memberships"
                    );
                }
                Err(err) => {
                    warn!(user_id = %principal.user_id, error = %err, "membership refresh failed");
                }
            }
            // Leave the context unset; a stricter guard owns the denial.
            return ctx;
        }

        // No explicit id anywhere: default to the first known membership.
        if let Some(m) = principal.first_membership() {
            ctx.fill(m.organization_id, Some(m.role));
            return ctx;
        }

        match self.store.get_organization_memberships(principal.user_id).await {
            Ok(fresh) if !fresh.is_empty() => {
                principal.replace_memberships(fresh);
                if let Some(m) = principal.first_membership() {
                    ctx.fill(m.organization_id, Some(m.role));
                }
            }
            Ok(_) => {
                debug!(user_id = %principal.user_id, "caller has no memberships; request proceeds tenant-less");
            }
            Err(err) => {
                warn!(user_id = %principal.user_id, error = %err, "membership fallback lookup failed");
            }
        }
        ctx
    }
}
