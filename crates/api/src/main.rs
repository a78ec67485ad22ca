use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;

use herdbook_api::app::{build_app, AppConfig};
use herdbook_store::{PostgresMembershipStore, PostgresResourceStore};

#[tokio::main]
async fn main() {
    herdbook_observability::init();

    let jwt_secret = std::env::var("JWT_SECRET").unwrap_or_else(|_| {
        tracing::warn!("JWT_SECRET not set; using insecure dev default");
        "dev-secret".to_string()
    });

    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await
        .expect("failed to connect to database");

    let app = build_app(AppConfig {
        jwt_secret,
        membership_store: Arc::new(PostgresMembershipStore::new(pool.clone())),
        resource_store: Arc::new(PostgresResourceStore::new(pool)),
    });

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind {bind_addr}: {e}"));

    tracing::info!("listening on {}", listener.local_addr().unwrap());

    axum::serve(listener, app).await.unwrap();
}
