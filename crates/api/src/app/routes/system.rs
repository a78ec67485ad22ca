use std::sync::Arc;

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Extension, Json, Router};
use serde_json::json;

use herdbook_auth::{Principal, RoleGate, TenancyContext};

use crate::middleware;

/// GET /health - unauthenticated liveness probe.
pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// `/api/whoami` behind an authentication-only gate: membership and role are
/// deliberately not checked.
pub fn whoami_router() -> Router {
    let gate = Arc::new(RoleGate::authenticated_only());

    Router::new()
        .route("/", get(whoami))
        .route_layer(axum::middleware::from_fn(
            move |req: Request, next: Next| {
                let gate = gate.clone();
                async move { middleware::role_gate_middleware(gate, req, next).await }
            },
        ))
}

/// GET /api/whoami - authenticated identity echo; no membership required.
async fn whoami(
    Extension(principal): Extension<Principal>,
    ctx: Option<Extension<TenancyContext>>,
) -> impl IntoResponse {
    let ctx = ctx.map(|Extension(c)| c).unwrap_or_default();
    Json(json!({
        "userId": principal.user_id,
        "email": principal.profile.email,
        "organizationId": ctx.organization_id(),
        "role": ctx.role(),
        "degraded": principal.is_degraded(),
    }))
}
