use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;

use herdbook_api::app::{build_app, AppConfig};
use herdbook_auth::{Claims, Membership, OrganizationClaim, Role, UserRecord};
use herdbook_auth::ResourceKind;
use herdbook_core::{OrganizationId, UserId};
use herdbook_store::{InMemoryMembershipStore, InMemoryResourceStore};

const JWT_SECRET: &str = "test-secret";

struct TestServer {
    base_url: String,
    membership: Arc<InMemoryMembershipStore>,
    resources: Arc<InMemoryResourceStore>,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        let membership = Arc::new(seeded_membership_store());
        let resources = Arc::new(seeded_resource_store());

        // Same router as prod, bound to an ephemeral port.
        let app = build_app(AppConfig {
            jwt_secret: JWT_SECRET.to_string(),
            membership_store: membership.clone(),
            resource_store: resources.clone(),
        });

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            membership,
            resources,
            handle,
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn member(org: i64, role: Role) -> Membership {
    Membership::new(OrganizationId::new(org), role)
}

fn user(id: i64) -> UserRecord {
    UserRecord {
        id: UserId::new(id),
        email: format!("user{id}@herd.example"),
        name: Some(format!("User {id}")),
        password_hash: Some("$argon2id$stored-secret".to_string()),
    }
}

// Fixture: organization 5 is a clinic with a superadmin (2), a vet (7), two
// farmers (20, 21) and an owner (40); organization 9 holds a client (17).
// Visit 42 belongs to org 5, visit 43 to org 9. Animal 30 is owned by farmer
// 20; animal 31 by a user of org 9. User 50 has no memberships at all.
fn seeded_membership_store() -> InMemoryMembershipStore {
    InMemoryMembershipStore::new()
        .with_user(user(2), vec![member(5, Role::Superadmin)])
        .with_user(user(7), vec![member(5, Role::Vet)])
        .with_user(user(17), vec![member(9, Role::Client)])
        .with_user(user(20), vec![member(5, Role::Farmer)])
        .with_user(user(21), vec![member(5, Role::Farmer)])
        .with_user(user(40), vec![member(5, Role::Owner)])
        .with_user(user(50), vec![])
        .with_user(user(60), vec![member(9, Role::Farmer)])
}

fn seeded_resource_store() -> InMemoryResourceStore {
    InMemoryResourceStore::new()
        .with_resource(ResourceKind::Visit, 42, 5)
        .with_resource(ResourceKind::Visit, 43, 9)
        .with_resource(ResourceKind::Bull, 12, 5)
        .with_user(2, vec![member(5, Role::Superadmin)])
        .with_user(7, vec![member(5, Role::Vet)])
        .with_user(17, vec![member(9, Role::Client)])
        .with_user(20, vec![member(5, Role::Farmer)])
        .with_user(21, vec![member(5, Role::Farmer)])
        .with_user(40, vec![member(5, Role::Owner)])
        .with_animal(30, 20, vec![5])
        .with_animal(31, 60, vec![9])
}

fn mint_jwt(user_id: i64, organizations: Vec<(i64, &str)>) -> String {
    mint_jwt_with(JWT_SECRET, user_id, organizations, ChronoDuration::minutes(10))
}

fn mint_jwt_with(
    secret: &str,
    user_id: i64,
    organizations: Vec<(i64, &str)>,
    lifetime: ChronoDuration,
) -> String {
    let now = Utc::now();
    let claims = Claims {
        sub: UserId::new(user_id),
        email: Some(format!("user{user_id}@herd.example")),
        organizations: if organizations.is_empty() {
            None
        } else {
            Some(
                organizations
                    .into_iter()
                    .map(|(id, role)| OrganizationClaim {
                        id: OrganizationId::new(id),
                        role: role.to_string(),
                        name: None,
                    })
                    .collect(),
            )
        },
        iat: (now - ChronoDuration::seconds(1)).timestamp(),
        exp: (now + lifetime).timestamp(),
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("failed to encode jwt")
}

async fn get_json(res: reqwest::Response) -> serde_json::Value {
    res.json().await.unwrap()
}

#[tokio::test]
async fn health_is_public() {
    let srv = TestServer::spawn().await;
    let res = reqwest::get(format!("{}/health", srv.base_url)).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn missing_token_is_401_token_required() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/api/visits", srv.base_url))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(get_json(res).await["error"], "TOKEN_REQUIRED");
}

#[tokio::test]
async fn expired_token_is_401_token_expired() {
    let srv = TestServer::spawn().await;
    let token = mint_jwt_with(JWT_SECRET, 7, vec![(5, "vet")], ChronoDuration::minutes(-5));

    let client = reqwest::Client::new();
    let res = client
        .get(format!("{}/api/visits", srv.base_url))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(get_json(res).await["error"], "TOKEN_EXPIRED");
}

#[tokio::test]
async fn tampered_token_is_401_invalid_token() {
    let srv = TestServer::spawn().await;
    let token = mint_jwt_with(
        "wrong-secret",
        7,
        vec![(5, "vet")],
        ChronoDuration::minutes(10),
    );

    let client = reqwest::Client::new();
    let res = client
        .get(format!("{}/api/visits", srv.base_url))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(get_json(res).await["error"], "INVALID_TOKEN");
}

#[tokio::test]
async fn unknown_subject_is_401_user_not_found() {
    let srv = TestServer::spawn().await;
    let token = mint_jwt(999, vec![(5, "vet")]);

    let client = reqwest::Client::new();
    let res = client
        .get(format!("{}/api/visits", srv.base_url))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(get_json(res).await["error"], "USER_NOT_FOUND");
}

#[tokio::test]
async fn same_tenant_visit_is_allowed_with_context() {
    let srv = TestServer::spawn().await;
    let token = mint_jwt(7, vec![(5, "vet")]);

    let client = reqwest::Client::new();
    let res = client
        .get(format!("{}/api/visits/42", srv.base_url))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let body = get_json(res).await;
    assert_eq!(body["id"], 42);
    assert_eq!(body["organizationId"], 5);
    assert_eq!(body["role"], "vet");
}

#[tokio::test]
async fn cross_tenant_visit_is_indistinguishable_from_missing() {
    let srv = TestServer::spawn().await;
    let token = mint_jwt(7, vec![(5, "vet")]);
    let client = reqwest::Client::new();

    // Visit 43 exists, but in organization 9.
    let foreign = client
        .get(format!("{}/api/visits/43", srv.base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let foreign_status = foreign.status();
    let foreign_body = foreign.text().await.unwrap();

    let missing = client
        .get(format!("{}/api/visits/4242", srv.base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let missing_status = missing.status();
    let missing_body = missing.text().await.unwrap();

    assert_eq!(foreign_status, StatusCode::NOT_FOUND);
    assert_eq!(missing_status, StatusCode::NOT_FOUND);
    assert_eq!(foreign_body, missing_body);
    assert!(foreign_body.contains("RESOURCE_NOT_FOUND"));
}

#[tokio::test]
async fn collection_listing_succeeds_on_membership_alone() {
    let srv = TestServer::spawn().await;
    let token = mint_jwt(7, vec![(5, "vet")]);

    let client = reqwest::Client::new();
    let res = client
        .get(format!("{}/api/bulls", srv.base_url))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(get_json(res).await["organizationId"], 5);
}

#[tokio::test]
async fn organization_id_can_come_from_request_body() {
    let srv = TestServer::spawn().await;
    let token = mint_jwt(7, vec![(5, "vet")]);

    let client = reqwest::Client::new();
    let res = client
        .post(format!("{}/api/visits", srv.base_url))
        .bearer_auth(token)
        .json(&serde_json::json!({ "organizationId": 5, "notes": "routine check" }))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(get_json(res).await["organizationId"], 5);
}

#[tokio::test]
async fn organization_header_is_seen_by_resolver_but_not_guard_fallback() {
    let srv = TestServer::spawn().await;
    let token = mint_jwt(7, vec![(5, "vet")]);

    // Header names an organization the caller is not a member of. The
    // resolver refuses it, and the guard falls back to the first membership.
    let client = reqwest::Client::new();
    let res = client
        .get(format!("{}/api/visits", srv.base_url))
        .bearer_auth(token)
        .header("x-organization-id", "9")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(get_json(res).await["organizationId"], 5);
}

#[tokio::test]
async fn role_gate_without_resolvable_organization_is_400() {
    let srv = TestServer::spawn().await;
    // User 50 exists but belongs to no organization.
    let token = mint_jwt(50, vec![]);

    let client = reqwest::Client::new();
    let res = client
        .get(format!("{}/api/reports", srv.base_url))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(get_json(res).await["error"], "ORGANIZATION_REQUIRED");
}

#[tokio::test]
async fn role_gate_denies_non_members_and_wrong_roles() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    // Vet 7 is not a member of organization 9.
    let token = mint_jwt(7, vec![(5, "vet")]);
    let res = client
        .get(format!("{}/api/organizations/9/members", srv.base_url))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert_eq!(get_json(res).await["error"], "NOT_ORGANIZATION_MEMBER");

    // Farmer 21 is a member but not owner/admin.
    let token = mint_jwt(21, vec![(5, "farmer")]);
    let res = client
        .get(format!("{}/api/organizations/5/members", srv.base_url))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert_eq!(get_json(res).await["error"], "ROLE_PERMISSION_DENIED");

    // Owner 40 passes and gets the resolved context.
    let token = mint_jwt(40, vec![(5, "owner")]);
    let res = client
        .get(format!("{}/api/organizations/5/members", srv.base_url))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = get_json(res).await;
    assert_eq!(body["organizationId"], 5);
    assert_eq!(body["role"], "owner");
}

#[tokio::test]
async fn whoami_requires_only_authentication() {
    let srv = TestServer::spawn().await;
    // No memberships at all; the gate must still let the request through.
    let token = mint_jwt(50, vec![]);

    let client = reqwest::Client::new();
    let res = client
        .get(format!("{}/api/whoami", srv.base_url))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let body = get_json(res).await;
    assert_eq!(body["userId"], 50);
    assert_eq!(body["organizationId"], serde_json::Value::Null);
}

#[tokio::test]
async fn superadmin_crosses_tenants_for_reads_but_not_delete() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    // User 17 belongs to organization 9; superadmin 2 belongs to 5.
    let token = mint_jwt(2, vec![(5, "superadmin")]);
    let res = client
        .get(format!("{}/api/users/17", srv.base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .delete(format!("{}/api/users/17", srv.base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert_eq!(get_json(res).await["error"], "INSUFFICIENT_PERMISSIONS");
}

#[tokio::test]
async fn client_role_may_only_touch_own_user_record() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = mint_jwt(21, vec![(5, "farmer")]);

    // Own record passes.
    let res = client
        .get(format!("{}/api/users/21", srv.base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    // Same organization, different user: still denied.
    let res = client
        .get(format!("{}/api/users/20", srv.base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert_eq!(get_json(res).await["error"], "INSUFFICIENT_PERMISSIONS");
}

#[tokio::test]
async fn staff_sees_clients_but_not_other_staff() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = mint_jwt(7, vec![(5, "vet")]);

    // Farmer 20 is a client-level user of the vet's organization.
    let res = client
        .get(format!("{}/api/users/20", srv.base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    // Superadmin 2 is staff-side; role-to-role visibility denies.
    let res = client
        .get(format!("{}/api/users/2", srv.base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn animal_owner_is_allowed_regardless_of_membership() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    // Farmer 20 owns animal 30.
    let token = mint_jwt(20, vec![(5, "farmer")]);
    let res = client
        .get(format!("{}/api/animals/30", srv.base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    // Farmer 21 is in the same organization but does not own it.
    let token = mint_jwt(21, vec![(5, "farmer")]);
    let res = client
        .get(format!("{}/api/animals/30", srv.base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    // Vet 7 passes because the owner belongs to the vet's organization.
    let token = mint_jwt(7, vec![(5, "vet")]);
    let res = client
        .get(format!("{}/api/animals/30", srv.base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    // Animal 31's owner belongs to organization 9: reads as absent.
    let res = client
        .get(format!("{}/api/animals/31", srv.base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(get_json(res).await["error"], "RESOURCE_NOT_FOUND");
}

#[tokio::test]
async fn own_profile_is_sanitized_and_tenancy_aware() {
    let srv = TestServer::spawn().await;
    let token = mint_jwt(7, vec![(5, "vet")]);

    let client = reqwest::Client::new();
    let res = client
        .get(format!("{}/api/auth/me", srv.base_url))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let body = get_json(res).await;
    assert_eq!(body["user"]["id"], 7);
    assert_eq!(body["organizationId"], 5);
    assert_eq!(body["degraded"], false);
    assert!(body["user"].get("password_hash").is_none());
}

#[tokio::test]
async fn enrichment_outage_degrades_to_token_snapshot() {
    let srv = TestServer::spawn().await;
    srv.membership.set_fail_enriched(true);
    let token = mint_jwt(7, vec![(5, "vet")]);

    let client = reqwest::Client::new();
    let res = client
        .get(format!("{}/api/auth/me", srv.base_url))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();

    // The request stays up on the signed snapshot.
    assert_eq!(res.status(), StatusCode::OK);
    let body = get_json(res).await;
    assert_eq!(body["degraded"], true);
    assert_eq!(body["memberships"][0]["organization_id"], 5);
}

#[tokio::test]
async fn resource_storage_outage_is_500_not_a_denial() {
    let srv = TestServer::spawn().await;
    srv.resources.set_fail_all(true);
    let token = mint_jwt(7, vec![(5, "vet")]);

    let client = reqwest::Client::new();
    let res = client
        .get(format!("{}/api/visits/42", srv.base_url))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(get_json(res).await["error"], "INTERNAL_ERROR");
}
