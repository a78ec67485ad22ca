//! Postgres-backed membership and resource stores.
//!
//! Every resource query filters by organization id in the WHERE clause, so a
//! row living in another tenant is indistinguishable from a missing row at
//! the SQL level; the guard never has to re-check.
//!
//! ## Error mapping
//!
//! All sqlx errors (connectivity, pool, decode) collapse into
//! `StoreError::Backend` with the display form preserved for server-side
//! logs. The authorization core decides whether that surfaces as a 500 or a
//! degraded principal.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use sqlx::postgres::PgRow;
use tracing::{instrument, warn};

use herdbook_auth::{
    AnimalRecord, Membership, MembershipStore, ResourceKind, ResourceRow, ResourceStore, Role,
    StoreError, UserDirectoryRecord, UserRecord,
};
use herdbook_core::{OrganizationId, ResourceId, UserId};

fn backend(err: sqlx::Error) -> StoreError {
    StoreError::Backend(err.to_string())
}

fn decode(err: sqlx::Error) -> StoreError {
    StoreError::Backend(format!("row decode: {err}"))
}

/// Decode one joined membership row; rows naming no closed role grant
/// nothing and are skipped.
fn decode_membership(row: &PgRow) -> Result<Option<Membership>, StoreError> {
    let Some(organization_id) = row
        .try_get::<Option<i64>, _>("organization_id")
        .map_err(decode)?
    else {
        return Ok(None);
    };

    let raw_role: String = row.try_get("role").map_err(decode)?;
    let role = match raw_role.parse::<Role>() {
        Ok(role) => role,
        Err(_) => {
            warn!(organization_id, role = %raw_role, "skipping membership row with unknown role");
            return Ok(None);
        }
    };

    Ok(Some(Membership {
        organization_id: OrganizationId::new(organization_id),
        role,
        organization_name: row
            .try_get::<Option<String>, _>("organization_name")
            .map_err(decode)?,
        address: row.try_get::<Option<String>, _>("address").map_err(decode)?,
    }))
}

fn decode_user(row: &PgRow) -> Result<UserRecord, StoreError> {
    Ok(UserRecord {
        id: UserId::new(row.try_get::<i64, _>("id").map_err(decode)?),
        email: row.try_get("email").map_err(decode)?,
        name: row.try_get::<Option<String>, _>("name").map_err(decode)?,
        password_hash: row
            .try_get::<Option<String>, _>("password_hash")
            .map_err(decode)?,
    })
}

/// Live source of user profiles and membership rows.
#[derive(Debug, Clone)]
pub struct PostgresMembershipStore {
    pool: Arc<PgPool>,
}

impl PostgresMembershipStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

#[async_trait]
impl MembershipStore for PostgresMembershipStore {
    #[instrument(skip(self))]
    async fn get_user_by_id(&self, id: UserId) -> Result<Option<UserRecord>, StoreError> {
        let row = sqlx::query("SELECT id, email, name, password_hash FROM users WHERE id = $1")
            .bind(id.as_i64())
            .fetch_optional(self.pool.as_ref())
            .await
            .map_err(backend)?;

        row.as_ref().map(decode_user).transpose()
    }

    #[instrument(skip(self))]
    async fn get_user_with_memberships(
        &self,
        id: UserId,
    ) -> Result<Option<(UserRecord, Vec<Membership>)>, StoreError> {
        // One round trip: user row repeated per membership, NULL org columns
        // for a membership-less user.
        let rows = sqlx::query(
            "SELECT u.id, u.email, u.name, u.password_hash, \
                    om.organization_id, om.role, \
                    o.name AS organization_name, o.address \
             FROM users u \
             LEFT JOIN organization_members om ON om.user_id = u.id \
             LEFT JOIN organizations o ON o.id = om.organization_id \
             WHERE u.id = $1 \
             ORDER BY om.organization_id",
        )
        .bind(id.as_i64())
        .fetch_all(self.pool.as_ref())
        .await
        .map_err(backend)?;

        let Some(first) = rows.first() else {
            return Ok(None);
        };

        let user = decode_user(first)?;
        let mut memberships = Vec::with_capacity(rows.len());
        for row in &rows {
            if let Some(m) = decode_membership(row)? {
                memberships.push(m);
            }
        }
        Ok(Some((user, memberships)))
    }

    #[instrument(skip(self))]
    async fn get_organization_memberships(
        &self,
        user_id: UserId,
    ) -> Result<Vec<Membership>, StoreError> {
        let rows = sqlx::query(
            "SELECT om.organization_id, om.role, \
                    o.name AS organization_name, o.address \
             FROM organization_members om \
             JOIN organizations o ON o.id = om.organization_id \
             WHERE om.user_id = $1 \
             ORDER BY om.organization_id",
        )
        .bind(user_id.as_i64())
        .fetch_all(self.pool.as_ref())
        .await
        .map_err(backend)?;

        let mut memberships = Vec::with_capacity(rows.len());
        for row in &rows {
            if let Some(m) = decode_membership(row)? {
                memberships.push(m);
            }
        }
        Ok(memberships)
    }
}

/// Per-resource lookups for the access guard.
#[derive(Debug, Clone)]
pub struct PostgresResourceStore {
    pool: Arc<PgPool>,
}

impl PostgresResourceStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

#[async_trait]
impl ResourceStore for PostgresResourceStore {
    #[instrument(skip(self))]
    async fn find_in_organization(
        &self,
        kind: ResourceKind,
        id: ResourceId,
        organization_id: OrganizationId,
    ) -> Result<Option<ResourceRow>, StoreError> {
        // Table names come from the closed ResourceKind enum, never from
        // request input.
        let Some(table) = kind.table() else {
            return Err(StoreError::Backend(format!(
                "resource kind {kind} has no generic table"
            )));
        };

        let query = format!(
            "SELECT id, organization_id FROM {table} WHERE id = $1 AND organization_id = $2"
        );
        let row = sqlx::query(&query)
            .bind(id.as_i64())
            .bind(organization_id.as_i64())
            .fetch_optional(self.pool.as_ref())
            .await
            .map_err(backend)?;

        row.map(|r| {
            Ok(ResourceRow {
                id: ResourceId::new(r.try_get::<i64, _>("id").map_err(decode)?),
                organization_id: OrganizationId::new(
                    r.try_get::<i64, _>("organization_id").map_err(decode)?,
                ),
            })
        })
        .transpose()
    }

    #[instrument(skip(self))]
    async fn find_user(&self, id: UserId) -> Result<Option<UserDirectoryRecord>, StoreError> {
        let rows = sqlx::query(
            "SELECT u.id, om.organization_id, om.role, \
                    o.name AS organization_name, o.address \
             FROM users u \
             LEFT JOIN organization_members om ON om.user_id = u.id \
             LEFT JOIN organizations o ON o.id = om.organization_id \
             WHERE u.id = $1 \
             ORDER BY om.organization_id",
        )
        .bind(id.as_i64())
        .fetch_all(self.pool.as_ref())
        .await
        .map_err(backend)?;

        if rows.is_empty() {
            return Ok(None);
        }

        let mut memberships = Vec::with_capacity(rows.len());
        for row in &rows {
            if let Some(m) = decode_membership(row)? {
                memberships.push(m);
            }
        }

        Ok(Some(UserDirectoryRecord {
            user_id: id,
            memberships,
        }))
    }

    #[instrument(skip(self))]
    async fn find_animal(&self, id: ResourceId) -> Result<Option<AnimalRecord>, StoreError> {
        let rows = sqlx::query(
            "SELECT a.id, a.owner_id, om.organization_id \
             FROM animals a \
             LEFT JOIN organization_members om ON om.user_id = a.owner_id \
             WHERE a.id = $1 \
             ORDER BY om.organization_id",
        )
        .bind(id.as_i64())
        .fetch_all(self.pool.as_ref())
        .await
        .map_err(backend)?;

        let Some(first) = rows.first() else {
            return Ok(None);
        };

        let owner_id = UserId::new(first.try_get::<i64, _>("owner_id").map_err(decode)?);
        let mut owner_organizations = Vec::with_capacity(rows.len());
        for row in &rows {
            if let Some(org) = row
                .try_get::<Option<i64>, _>("organization_id")
                .map_err(decode)?
            {
                owner_organizations.push(OrganizationId::new(org));
            }
        }

        Ok(Some(AnimalRecord {
            id: ResourceId::new(first.try_get::<i64, _>("id").map_err(decode)?),
            owner_id,
            owner_organizations,
        }))
    }
}
