//! Authorization middleware pipeline.
//!
//! Stage order is load-bearing: identity first, tenancy second, then the
//! per-route gate or guard. Each stage communicates through typed request
//! extensions; a missing upstream extension in the guard is a wiring bug and
//! surfaces as a 500, never as a silent pass.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use tracing::{info_span, Instrument};
use uuid::Uuid;

use herdbook_auth::{
    AccessDecision, OrgIdSources, Principal, ResourceKind, RoleGate, TenancyContext, Verb,
};

use crate::app::AppState;
use crate::errors;
use crate::sources;

/// Identity stage: bearer header → verified principal, or a terminal 401.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let request_id = Uuid::now_v7();
    let span = info_span!(
        "request",
        %request_id,
        method = %req.method(),
        path = %req.uri().path(),
    );

    async move {
        let authorization = req
            .headers()
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        match state.identity.resolve(authorization.as_deref()).await {
            Ok(principal) => {
                req.extensions_mut().insert(principal);
                next.run(req).await
            }
            Err(err) => errors::auth_error_response(err),
        }
    }
    .instrument(span)
    .await
}

/// Tenancy stage: resolves the active organization and stashes the resolved
/// context, the (possibly refreshed) principal, and the extracted sources
/// for the gates downstream.
pub async fn tenancy_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    if sources::bypasses_tenancy(req.uri().path()) {
        return next.run(req).await;
    }

    let Some(mut principal) = req.extensions().get::<Principal>().cloned() else {
        return next.run(req).await;
    };

    let (mut req, body) = match sources::buffer_json_body(req).await {
        Ok(pair) => pair,
        Err(response) => return response,
    };

    let org_sources = sources::org_id_sources(&req, body.as_ref());
    let ctx = req
        .extensions()
        .get::<TenancyContext>()
        .cloned()
        .unwrap_or_default();

    let ctx = state.tenancy.resolve(ctx, &mut principal, &org_sources).await;

    req.extensions_mut().insert(principal);
    req.extensions_mut().insert(ctx);
    req.extensions_mut().insert(org_sources);

    next.run(req).await
}

/// Resource guard stage, parameterized per route with the resource kind.
pub async fn guard_middleware(
    state: AppState,
    kind: ResourceKind,
    mut req: Request,
    next: Next,
) -> Response {
    let principal = req.extensions().get::<Principal>().cloned();

    let Some(ctx) = req.extensions().get::<TenancyContext>().cloned() else {
        return errors::decision_response(&AccessDecision::ErrorConfiguration(
            "tenancy middleware missing before resource guard".to_string(),
        ));
    };

    let org_sources = req
        .extensions()
        .get::<OrgIdSources>()
        .cloned()
        .unwrap_or_default();

    let resource_id = match sources::resource_id(req.uri().path(), kind) {
        Ok(id) => id,
        Err(response) => return response,
    };

    let verb = Verb::from_name(req.method().as_str());

    let decision = state
        .guard
        .check(kind, principal.as_ref(), &ctx, &org_sources, verb, resource_id)
        .await;

    match decision {
        AccessDecision::Allow {
            organization_id,
            role,
        } => {
            let mut ctx = ctx;
            if let Some(org) = organization_id {
                ctx.fill(org, role);
            }
            if let Some(role) = role {
                ctx.fill_role(role);
            }
            req.extensions_mut().insert(ctx);
            next.run(req).await
        }
        denied => errors::decision_response(&denied),
    }
}

/// Role gate stage: membership/role only, no per-resource lookups.
pub async fn role_gate_middleware(gate: Arc<RoleGate>, mut req: Request, next: Next) -> Response {
    let Some(principal) = req.extensions().get::<Principal>().cloned() else {
        return errors::decision_response(&AccessDecision::DenyUnauthenticated);
    };

    let ctx = req
        .extensions()
        .get::<TenancyContext>()
        .cloned()
        .unwrap_or_default();

    // The gate may run on routes the tenancy stage has not decorated yet; it
    // then reads path/query directly (never the body, never the header).
    let org_sources = req
        .extensions()
        .get::<OrgIdSources>()
        .cloned()
        .unwrap_or_else(|| sources::org_id_sources(&req, None));

    match gate.check(&principal, &ctx, &org_sources) {
        Ok(ctx) => {
            req.extensions_mut().insert(ctx);
            next.run(req).await
        }
        Err(denial) => errors::gate_response(denial),
    }
}
