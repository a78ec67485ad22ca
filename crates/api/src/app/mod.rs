//! HTTP application wiring (axum router + service construction).
//!
//! `routes/` holds one file per surface area; handlers stay thin because the
//! CRUD bodies live behind the authorization pipeline, which is the point of
//! this service.

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tower::ServiceBuilder;

use herdbook_auth::{
    IdentityResolver, MembershipStore, ResourceAccessGuard, ResourceKind, ResourceStore,
    TenancyResolver, TokenCodec,
};

use crate::middleware;

pub mod routes;

/// Everything the server needs from its environment and collaborators.
pub struct AppConfig {
    pub jwt_secret: String,
    pub membership_store: Arc<dyn MembershipStore>,
    pub resource_store: Arc<dyn ResourceStore>,
}

/// Shared per-process state handed to the middleware pipeline.
#[derive(Clone)]
pub struct AppState {
    pub identity: Arc<IdentityResolver>,
    pub tenancy: Arc<TenancyResolver>,
    pub guard: Arc<ResourceAccessGuard>,
}

impl AppState {
    pub fn from_config(config: AppConfig) -> Self {
        Self {
            identity: Arc::new(IdentityResolver::new(
                TokenCodec::new(config.jwt_secret.as_bytes()),
                config.membership_store.clone(),
            )),
            tenancy: Arc::new(TenancyResolver::new(config.membership_store)),
            guard: Arc::new(ResourceAccessGuard::new(config.resource_store)),
        }
    }
}

/// Build the full HTTP router (public entrypoint used by `main.rs` and the
/// black-box tests).
pub fn build_app(config: AppConfig) -> Router {
    let state = AppState::from_config(config);

    // Protected routes: identity first, then tenancy, then per-route gates.
    let protected = Router::new()
        .nest("/api/auth", routes::auth::router())
        .nest(
            "/api/visits",
            routes::resources::router(state.clone(), ResourceKind::Visit),
        )
        .nest(
            "/api/inseminations",
            routes::resources::router(state.clone(), ResourceKind::Insemination),
        )
        .nest(
            "/api/bulls",
            routes::resources::router(state.clone(), ResourceKind::Bull),
        )
        .nest(
            "/api/herds",
            routes::resources::router(state.clone(), ResourceKind::Herd),
        )
        .nest(
            "/api/animals",
            routes::resources::router(state.clone(), ResourceKind::Animal),
        )
        .nest(
            "/api/users",
            routes::resources::router(state.clone(), ResourceKind::User),
        )
        .nest("/api/organizations", routes::organizations::router())
        .nest("/api/reports", routes::reports::router())
        .nest("/api/whoami", routes::system::whoami_router())
        .layer(
            // ServiceBuilder applies top-down: identity runs before tenancy.
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn_with_state(
                    state.clone(),
                    middleware::auth_middleware,
                ))
                .layer(axum::middleware::from_fn_with_state(
                    state,
                    middleware::tenancy_middleware,
                )),
        );

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(protected)
}
