//! Routes under the authentication prefix.
//!
//! Everything here except `/me` is exempt from tenancy resolution: there is
//! no organization before a session exists. Login/refresh/password flows are
//! owned by a separate service surface.

use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Extension, Json, Router};
use serde_json::json;

use herdbook_auth::{Principal, TenancyContext};

pub fn router() -> Router {
    Router::new().route("/me", get(me))
}

/// GET /api/auth/me - the caller's own sanitized profile plus memberships.
async fn me(
    Extension(principal): Extension<Principal>,
    ctx: Option<Extension<TenancyContext>>,
) -> impl IntoResponse {
    let ctx = ctx.map(|Extension(c)| c).unwrap_or_default();
    Json(json!({
        "user": principal.profile,
        "memberships": principal.memberships,
        "organizationId": ctx.organization_id(),
        "role": ctx.role(),
        "degraded": principal.is_degraded(),
    }))
}
