//! Identity resolution: raw bearer header to verified [`Principal`].
//!
//! The resolver prefers live store data and degrades rather than failing when
//! only the enrichment call is broken: a verified token plus a reachable
//! minimal profile keeps the request alive on the signed membership snapshot.
//! It never invents a principal; every degraded outcome still stems from a
//! verified signature.

use std::sync::Arc;

use thiserror::Error;
use tracing::warn;

use crate::claims::{Claims, TokenCodec, TokenError};
use crate::membership::{self, Membership};
use crate::principal::{IdentitySource, Principal, UserProfile};
use crate::store::MembershipStore;

/// Terminal authentication failures, each with a machine-readable wire code.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    #[error("authorization token required")]
    TokenRequired,

    #[error("token has expired")]
    TokenExpired,

    #[error("invalid token")]
    InvalidToken,

    #[error("user not found")]
    UserNotFound,
}

impl AuthError {
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::TokenRequired => "TOKEN_REQUIRED",
            AuthError::TokenExpired => "TOKEN_EXPIRED",
            AuthError::InvalidToken => "INVALID_TOKEN",
            AuthError::UserNotFound => "USER_NOT_FOUND",
        }
    }
}

/// Extract the token from a bearer-scheme `Authorization` header value.
pub fn extract_bearer(header: Option<&str>) -> Result<&str, AuthError> {
    let header = header.ok_or(AuthError::TokenRequired)?;
    let token = header
        .strip_prefix("Bearer ")
        .ok_or(AuthError::TokenRequired)?
        .trim();
    if token.is_empty() {
        return Err(AuthError::TokenRequired);
    }
    Ok(token)
}

/// Turns a raw bearer header into a verified principal.
pub struct IdentityResolver {
    codec: TokenCodec,
    store: Arc<dyn MembershipStore>,
}

impl IdentityResolver {
    pub fn new(codec: TokenCodec, store: Arc<dyn MembershipStore>) -> Self {
        Self { codec, store }
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    /// Resolve one request's principal. Exactly one enrichment attempt, no
    /// retries; an enrichment failure downgrades, it does not fail.
    pub async fn resolve(&self, authorization: Option<&str>) -> Result<Principal, AuthError> {
        let token = extract_bearer(authorization)?;

        let claims = self.codec.verify(token).map_err(|e| match e {
            TokenError::Expired => AuthError::TokenExpired,
            TokenError::Invalid => AuthError::InvalidToken,
        })?;

        let snapshot = membership::snapshot_from_claims(&claims);

        match self.store.get_user_with_memberships(claims.sub).await {
            Ok(Some((record, live))) => Ok(Principal {
                user_id: record.id,
                profile: UserProfile::from_record(&record),
                memberships: membership::dedup_by_organization(live),
                source: IdentitySource::Live,
            }),
            Ok(None) => Err(AuthError::UserNotFound),
            Err(err) => {
                warn!(user_id = %claims.sub, error = %err, "live membership lookup failed, degrading");
                self.degrade(claims, snapshot).await
            }
        }
    }

    /// Degraded path: minimal profile lookup, token snapshot for memberships.
    async fn degrade(
        &self,
        claims: Claims,
        snapshot: Vec<Membership>,
    ) -> Result<Principal, AuthError> {
        let profile = match self.store.get_user_by_id(claims.sub).await {
            Ok(Some(record)) => UserProfile::from_record(&record),
            Ok(None) => return Err(AuthError::UserNotFound),
            Err(err) => {
                warn!(user_id = %claims.sub, error = %err, "minimal profile lookup also failed, using token claims");
                UserProfile {
                    id: claims.sub,
                    email: claims.email.clone().unwrap_or_default(),
                    name: None,
                }
            }
        };

        Ok(Principal {
            user_id: claims.sub,
            profile,
            memberships: snapshot,
            source: IdentitySource::TokenSnapshot,
        })
    }
}
