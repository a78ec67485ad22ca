//! Membership value type: the (user, organization, role) grant.

use serde::{Deserialize, Serialize};
use tracing::warn;

use herdbook_core::OrganizationId;

use crate::claims::{Claims, OrganizationClaim};
use crate::roles::Role;

/// A user's membership in one organization.
///
/// Two provenances exist: embedded in a signed token at issuance time, or
/// fetched live from the membership store. Live rows are authoritative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub organization_id: OrganizationId,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl Membership {
    pub fn new(organization_id: OrganizationId, role: Role) -> Self {
        Self {
            organization_id,
            role,
            organization_name: None,
            address: None,
        }
    }

    /// Build a membership from a token snapshot entry. A role string that
    /// names no closed role grants nothing and the entry is dropped.
    pub fn from_claim(claim: &OrganizationClaim) -> Option<Self> {
        match claim.role.parse::<Role>() {
            Ok(role) => Some(Self {
                organization_id: claim.id,
                role,
                organization_name: claim.name.clone(),
                address: None,
            }),
            Err(_) => {
                warn!(
                    organization_id = %claim.id,
                    role = %claim.role,
                    "dropping token membership with unknown role"
                );
                None
            }
        }
    }
}

/// Enforce the one-membership-per-organization invariant, first entry wins.
pub fn dedup_by_organization(list: Vec<Membership>) -> Vec<Membership> {
    let mut seen: Vec<OrganizationId> = Vec::with_capacity(list.len());
    let mut out = Vec::with_capacity(list.len());
    for m in list {
        if seen.contains(&m.organization_id) {
            continue;
        }
        seen.push(m.organization_id);
        out.push(m);
    }
    out
}

/// Fallback membership snapshot carried by a verified token.
pub fn snapshot_from_claims(claims: &Claims) -> Vec<Membership> {
    let list = claims
        .organizations
        .as_deref()
        .unwrap_or_default()
        .iter()
        .filter_map(Membership::from_claim)
        .collect();
    dedup_by_organization(list)
}
