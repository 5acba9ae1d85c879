//! Administration routes against an in-memory SurrealDB.

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use http_body_util::BodyExt;
use portcullis_authz::{DecisionEngine, RegoEvaluator, TenantStore};
use portcullis_db::repository::SurrealOrganizationRepository;
use portcullis_server::app::{ADMIN_TOKEN_HEADER, API_KEY_HEADER, AppState, build_router};
use serde_json::{Value, json};
use surrealdb::Surreal;
use surrealdb::engine::local::Mem;
use tower::ServiceExt;

const TOKEN: &str = "s3cret";

async fn app(admin_token: Option<&str>) -> Router {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    portcullis_db::run_migrations(&db).await.unwrap();

    let repo = SurrealOrganizationRepository::new(db);
    let store = TenantStore::new(repo.clone());
    let engine = DecisionEngine::new(repo, RegoEvaluator::default());
    let mut state = AppState::new(engine, store);
    if let Some(token) = admin_token {
        state = state.with_admin_token(token);
    }
    build_router(state)
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header(ADMIN_TOKEN_HEADER, token);
    }
    let body = body.map_or_else(Body::empty, |b| Body::from(b.to_string()));
    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

async fn admin(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    send(app, method, uri, Some(TOKEN), body).await
}

async fn check(app: &Router, api_key: &str, action: &str) -> bool {
    let request = Request::post("/api/v1/org1/permission/check")
        .header("content-type", "application/json")
        .header(API_KEY_HEADER, api_key)
        .body(Body::from(
            json!({"identifier": "alice", "action": action, "resource": "invoices"}).to_string(),
        ))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    body["allowed"].as_bool().unwrap()
}

fn id(body: &Value) -> String {
    body["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn provisioned_tenant_answers_checks() {
    let app = app(Some(TOKEN)).await;

    let (status, org) = admin(
        &app,
        Method::POST,
        "/admin/v1/organizations",
        Some(json!({"identifier": "org1", "display_name": "Org One"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(org["identifier"], "org1");
    assert!(org.get("users").is_none(), "summary only: {org}");
    let base = format!("/admin/v1/organizations/{}", id(&org));

    let (status, _) = admin(
        &app,
        Method::POST,
        &format!("{base}/resources"),
        Some(json!({
            "identifier": "invoices",
            "display_name": "Invoices",
            "actions": [{"identifier": "read", "display_name": "Read"}]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, role) = admin(
        &app,
        Method::POST,
        &format!("{base}/roles"),
        Some(json!({
            "identifier": "viewer",
            "display_name": "Viewer",
            "permissions": [{"resource": "invoices", "action": "read"}]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let role_id = id(&role);

    let (status, user) = admin(
        &app,
        Method::POST,
        &format!("{base}/users"),
        Some(json!({
            "username": "alice",
            "first_name": "Alice",
            "last_name": "Liddell",
            "roles": [role_id]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let user_id = id(&user);

    let (status, role) = admin(&app, Method::GET, &format!("{base}/roles/{role_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(role["users"], json!([user_id]));

    let (status, issued) = admin(
        &app,
        Method::POST,
        &format!("{base}/api-keys"),
        Some(json!({"name": "ci"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(issued.get("key_hash").is_none());
    let api_key = issued["api_key"].as_str().unwrap().to_string();

    assert!(check(&app, &api_key, "read").await);
    assert!(!check(&app, &api_key, "delete").await);

    let (status, user) = admin(
        &app,
        Method::PATCH,
        &format!("{base}/users/{user_id}"),
        Some(json!({"removed_roles": [role_id]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(user["roles"], json!([]));
    assert!(!check(&app, &api_key, "read").await);

    let (_, role) = admin(&app, Method::GET, &format!("{base}/roles/{role_id}"), None).await;
    assert_eq!(role["users"], json!([]));
}

#[tokio::test]
async fn duplicate_organization_is_409() {
    let app = app(Some(TOKEN)).await;
    let body = json!({"identifier": "org1", "display_name": "Org One"});

    let (status, _) = admin(&app, Method::POST, "/admin/v1/organizations", Some(body.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, err) = admin(&app, Method::POST, "/admin/v1/organizations", Some(body)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(err["code"], "already_exists");

    let (status, list) = admin(&app, Method::GET, "/admin/v1/organizations?limit=10", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["total"], 1);
    assert_eq!(list["limit"], 10);
}

#[tokio::test]
async fn users_can_be_looked_up_by_username() {
    let app = app(Some(TOKEN)).await;
    let (_, org) = admin(
        &app,
        Method::POST,
        "/admin/v1/organizations",
        Some(json!({"identifier": "org1", "display_name": "Org One"})),
    )
    .await;
    let base = format!("/admin/v1/organizations/{}", id(&org));
    admin(
        &app,
        Method::POST,
        &format!("{base}/users"),
        Some(json!({"username": "alice", "first_name": "Alice", "last_name": "Liddell"})),
    )
    .await;

    let (status, page) = admin(&app, Method::GET, &format!("{base}/users?username=alice"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 1);
    assert_eq!(page["items"][0]["username"], "alice");

    let (status, err) = admin(&app, Method::GET, &format!("{base}/users?username=bob"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(err["code"], "not_found");
}

#[tokio::test]
async fn policy_versions_activate_one_at_a_time() {
    let app = app(Some(TOKEN)).await;
    let (_, org) = admin(
        &app,
        Method::POST,
        "/admin/v1/organizations",
        Some(json!({"identifier": "org1", "display_name": "Org One"})),
    )
    .await;
    let base = format!("/admin/v1/organizations/{}", id(&org));

    let (status, policy) = admin(
        &app,
        Method::POST,
        &format!("{base}/policies"),
        Some(json!({
            "identifier": "business-hours",
            "display_name": "Business hours",
            "content": "package portcullis\nallow := true"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let policies = format!("{base}/policies/{}", id(&policy));

    let (status, policy) = admin(
        &app,
        Method::POST,
        &format!("{policies}/versions"),
        Some(json!({"content": "package portcullis\nallow := false"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(policy["versions"][0]["status"], "active");
    assert_eq!(policy["versions"][1]["status"], "inactive");

    let (status, policy) =
        admin(&app, Method::POST, &format!("{policies}/versions/2/activate"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(policy["versions"][0]["status"], "inactive");
    assert_eq!(policy["versions"][1]["status"], "active");

    let (status, _) = admin(&app, Method::DELETE, &policies, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = admin(&app, Method::GET, &policies, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn revoked_key_no_longer_authenticates() {
    let app = app(Some(TOKEN)).await;
    let (_, org) = admin(
        &app,
        Method::POST,
        "/admin/v1/organizations",
        Some(json!({"identifier": "org1", "display_name": "Org One"})),
    )
    .await;
    let base = format!("/admin/v1/organizations/{}", id(&org));
    admin(
        &app,
        Method::POST,
        &format!("{base}/users"),
        Some(json!({"username": "alice", "first_name": "Alice", "last_name": "Liddell"})),
    )
    .await;
    admin(
        &app,
        Method::POST,
        &format!("{base}/resources"),
        Some(json!({"identifier": "invoices", "display_name": "Invoices"})),
    )
    .await;
    let (_, issued) = admin(
        &app,
        Method::POST,
        &format!("{base}/api-keys"),
        Some(json!({"name": "ci"})),
    )
    .await;
    let api_key = issued["api_key"].as_str().unwrap().to_string();
    assert!(!check(&app, &api_key, "read").await);

    let (_, keys) = admin(&app, Method::GET, &format!("{base}/api-keys"), None).await;
    assert_eq!(keys.as_array().unwrap().len(), 1);
    assert!(keys[0].get("key_hash").is_none());

    let (status, _) = admin(
        &app,
        Method::DELETE,
        &format!("{base}/api-keys/{}", id(&issued)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let request = Request::post("/api/v1/org1/permission/check")
        .header("content-type", "application/json")
        .header(API_KEY_HEADER, &api_key)
        .body(Body::from(
            json!({"identifier": "alice", "action": "read", "resource": "invoices"}).to_string(),
        ))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn missing_or_wrong_admin_token_is_401() {
    let app = app(Some(TOKEN)).await;
    for token in [None, Some("wrong")] {
        let (status, err) =
            send(&app, Method::GET, "/admin/v1/organizations", token, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{token:?}");
        assert_eq!(err["code"], "unauthorized");
    }
}

#[tokio::test]
async fn administration_without_a_token_configured_is_404() {
    let app = app(None).await;
    let (status, err) = send(
        &app,
        Method::POST,
        "/admin/v1/organizations",
        Some(TOKEN),
        Some(json!({"identifier": "org1", "display_name": "Org One"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(err["code"], "not_enabled");
}

#[tokio::test]
async fn invalid_admin_body_is_400() {
    let app = app(Some(TOKEN)).await;
    let (status, err) = admin(
        &app,
        Method::POST,
        "/admin/v1/organizations",
        Some(json!({"identifier": "org 1", "display_name": "Org One"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["code"], "validation_error");

    let (status, err) = admin(
        &app,
        Method::POST,
        "/admin/v1/organizations",
        Some(json!({"display_name": "Org One"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["code"], "validation_error");
}
