//! Guarded resource routes.
//!
//! All six resource kinds share the same thin shape: a collection route and
//! an item route behind the resource guard for their kind. Handlers echo the
//! resolved authorization context; the CRUD bodies themselves live in the
//! domain services, outside this service's scope.

use axum::extract::{Path, Request, State};
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Extension, Json, Router};
use serde_json::json;

use herdbook_auth::{ResourceKind, TenancyContext};

use crate::app::AppState;
use crate::middleware;

pub fn router(state: AppState, kind: ResourceKind) -> Router {
    Router::new()
        .route("/", get(collection).post(collection))
        .route(
            "/:id",
            get(item).put(item).patch(item).delete(item),
        )
        .route_layer(axum::middleware::from_fn_with_state(
            state,
            move |State(state): State<AppState>, req: Request, next: Next| {
                middleware::guard_middleware(state, kind, req, next)
            },
        ))
}

async fn collection(Extension(ctx): Extension<TenancyContext>) -> impl IntoResponse {
    Json(json!({
        "organizationId": ctx.organization_id(),
        "role": ctx.role(),
        "items": [],
    }))
}

async fn item(
    Path(id): Path<i64>,
    Extension(ctx): Extension<TenancyContext>,
) -> impl IntoResponse {
    Json(json!({
        "id": id,
        "organizationId": ctx.organization_id(),
        "role": ctx.role(),
    }))
}
