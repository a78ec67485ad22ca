//! The authenticated caller, resolved for exactly one request.

use serde::{Deserialize, Serialize};

use herdbook_core::{OrganizationId, UserId};

use crate::membership::{dedup_by_organization, Membership};
use crate::store::UserRecord;

/// Sanitized user profile attached to a principal.
///
/// Credential secrets are not representable here: construction from a store
/// record discards the password hash, so nothing downstream can leak it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl UserProfile {
    pub fn from_record(record: &UserRecord) -> Self {
        Self {
            id: record.id,
            email: record.email.clone(),
            name: record.name.clone(),
        }
    }
}

/// Where the principal's membership list came from.
///
/// `Live` is the verified happy path; `TokenSnapshot` marks the deliberate
/// degraded mode where the live lookup failed and the signed snapshot is in
/// effect. The distinction is provenance, not trust: both stem from a
/// verified token.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum IdentitySource {
    Live,
    TokenSnapshot,
}

/// The resolved caller: identity, profile, and known memberships.
///
/// Lifetime is one request; principals are never cached across requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: UserId,
    pub profile: UserProfile,
    pub memberships: Vec<Membership>,
    pub source: IdentitySource,
}

impl Principal {
    pub fn membership_for(&self, organization_id: OrganizationId) -> Option<&Membership> {
        self.memberships
            .iter()
            .find(|m| m.organization_id == organization_id)
    }

    pub fn first_membership(&self) -> Option<&Membership> {
        self.memberships.first()
    }

    pub fn is_degraded(&self) -> bool {
        self.source == IdentitySource::TokenSnapshot
    }

    /// Replace the membership list with a fresher one (request-scoped
    /// write-through after a live lookup).
    pub fn replace_memberships(&mut self, fresh: Vec<Membership>) {
        self.memberships = dedup_by_organization(fresh);
        self.source = IdentitySource::Live;
    }
}
