//! `herdbook-auth` — tenancy-aware authorization core (zero-trust).
//!
//! This crate is intentionally decoupled from HTTP and storage: the HTTP layer
//! feeds it raw header/parameter values, and storage is reached only through
//! the ports in [`store`]. Every stage is reconstructed per request; nothing
//! here caches a principal or a membership across requests.

pub mod claims;
pub mod guard;
pub mod identity;
pub mod membership;
pub mod principal;
pub mod role_gate;
pub mod roles;
pub mod store;
pub mod tenancy;

pub use claims::{Claims, OrganizationClaim, TokenCodec, TokenError};
pub use guard::{AccessDecision, ResourceAccessGuard, ResourceKind, Verb};
pub use identity::{extract_bearer, AuthError, IdentityResolver};
pub use membership::Membership;
pub use principal::{IdentitySource, Principal, UserProfile};
pub use role_gate::{GateDenial, RoleGate};
pub use roles::Role;
pub use store::{
    AnimalRecord, MembershipStore, ResourceRow, ResourceStore, StoreError, UserDirectoryRecord,
    UserRecord,
};
pub use tenancy::{OrgIdSources, TenancyContext, TenancyResolver};
