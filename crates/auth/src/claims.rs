//! Bearer token codec (HS256, shared secret).
//!
//! The token carries the user id plus a snapshot of organization memberships
//! taken at issuance. The snapshot is a fallback only; live membership rows
//! win whenever the store is reachable (see [`crate::identity`]).

use chrono::{Duration, Utc};
use jsonwebtoken::{errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use herdbook_core::{OrganizationId, UserId};

/// One organization entry embedded in a token at issuance time.
///
/// The role is kept as the raw issued string; normalization to [`crate::Role`]
/// happens when the snapshot is turned into memberships.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationClaim {
    pub id: OrganizationId,
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// JWT claims model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the authenticated user id.
    pub sub: UserId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Membership snapshot taken when the token was signed. Optional: tokens
    /// issued before a user's first membership carry none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organizations: Option<Vec<OrganizationClaim>>,

    /// Issued-at (unix seconds).
    pub iat: i64,

    /// Expiration (unix seconds).
    pub exp: i64,
}

/// Verification outcome taxonomy. Expiry is the only defect the caller is
/// told about precisely; every other structural or signature defect collapses
/// into `Invalid`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("token has expired")]
    Expired,

    #[error("invalid token")]
    Invalid,
}

/// Signs and verifies bearer tokens with a shared secret.
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl TokenCodec {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.set_required_spec_claims(&["exp"]);

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Sign a fully-built claims set.
    pub fn sign(&self, claims: &Claims) -> Result<String, TokenError> {
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|_| TokenError::Invalid)
    }

    /// Issue a token for `sub` with a membership snapshot and a lifetime.
    pub fn issue(
        &self,
        sub: UserId,
        email: Option<String>,
        organizations: Vec<OrganizationClaim>,
        lifetime: Duration,
    ) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = Claims {
            sub,
            email,
            organizations: if organizations.is_empty() {
                None
            } else {
                Some(organizations)
            },
            iat: now.timestamp(),
            exp: (now + lifetime).timestamp(),
        };
        self.sign(&claims)
    }

    /// Verify signature and expiry; no side effects.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        match jsonwebtoken::decode::<Claims>(token, &self.decoding, &self.validation) {
            Ok(data) => Ok(data.claims),
            Err(e) => match e.kind() {
                ErrorKind::ExpiredSignature => Err(TokenError::Expired),
                _ => Err(TokenError::Invalid),
            },
        }
    }
}
