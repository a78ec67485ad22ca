//! Management reports: role-gated, organization resolvable from any gate
//! source (query, body, or membership fallback) rather than the path.

use std::sync::Arc;

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Extension, Json, Router};
use serde_json::json;

use herdbook_auth::{Role, RoleGate, TenancyContext};

use crate::middleware;

pub fn router() -> Router {
    let gate = Arc::new(RoleGate::allowing([Role::Owner, Role::Admin]));

    Router::new()
        .route("/", get(summary))
        .route_layer(axum::middleware::from_fn(
            move |req: Request, next: Next| {
                let gate = gate.clone();
                async move { middleware::role_gate_middleware(gate, req, next).await }
            },
        ))
}

/// GET /api/reports - per-organization summary stub.
async fn summary(Extension(ctx): Extension<TenancyContext>) -> impl IntoResponse {
    Json(json!({
        "organizationId": ctx.organization_id(),
        "role": ctx.role(),
        "reports": [],
    }))
}
