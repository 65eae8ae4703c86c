use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::{header::LOCATION, redirect, StatusCode};
use serde_json::{json, Value};

use amo_api::config::{AdminSeed, ApiConfig};
use amo_auth::{Role, SessionClaims};
use amo_core::UserId;

const JWT_SECRET: &str = "test-secret";
const ADMIN_EMAIL: &str = "admin@amo.rw";
const ADMIN_PASSWORD: &str = "admin-password";

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod, in-memory stores, ephemeral port.
        let config = ApiConfig {
            jwt_secret: JWT_SECRET.to_string(),
            sync_delay: Duration::ZERO,
            admin_seed: Some(AdminSeed {
                email: ADMIN_EMAIL.to_string(),
                password: ADMIN_PASSWORD.to_string(),
            }),
            ..ApiConfig::default()
        };
        let app = amo_api::app::build_app(&config)
            .await
            .expect("failed to build app");
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Client that reports redirects instead of following them.
fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(redirect::Policy::none())
        .build()
        .unwrap()
}

fn mint_jwt(role: Role, must_change_password: bool, phone_number: Option<&str>) -> String {
    let now = Utc::now();
    let claims = SessionClaims {
        sub: UserId::new(),
        email: "minted@amo.rw".to_string(),
        name: Some("Minted".to_string()),
        role,
        must_change_password,
        phone_number: phone_number.map(str::to_string),
        issued_at: now,
        expires_at: now + ChronoDuration::minutes(10),
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .expect("failed to encode jwt")
}

async fn sign_in(client: &reqwest::Client, srv: &TestServer, email: &str, password: &str) -> Value {
    let res = client
        .post(srv.url("/api/auth/signin"))
        .json(&json!({ "email": email, "password": password }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    res.json().await.unwrap()
}

async fn register(client: &reqwest::Client, srv: &TestServer, email: &str) -> Value {
    let res = client
        .post(srv.url("/api/auth/register"))
        .json(&json!({
            "name": "Owner",
            "email": email,
            "password": "owner-password",
            "phoneNumber": "0788123456",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    res.json().await.unwrap()
}

async fn token_for(client: &reqwest::Client, srv: &TestServer, email: &str, password: &str) -> String {
    sign_in(client, srv, email, password).await["token"]
        .as_str()
        .unwrap()
        .to_string()
}

fn company(tin: &str) -> Value {
    json!({
        "name": "Acme Ltd",
        "tinNumber": tin,
        "phoneNumber": "0788111222",
        "email": "info@acme.rw",
        "address": "KG 7 Ave, Kigali",
        "sdcId": "SDC-001",
        "mrcNumber": "MRC-001",
    })
}

fn location(res: &reqwest::Response) -> &str {
    res.headers().get(LOCATION).unwrap().to_str().unwrap()
}

#[tokio::test]
async fn health_is_public() {
    let srv = TestServer::spawn().await;
    let res = client().get(srv.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn anonymous_requests_are_sent_to_login() {
    let srv = TestServer::spawn().await;
    let client = client();

    for path in ["/dashboard", "/dashboard/users", "/profile/update"] {
        let res = client.get(srv.url(path)).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::TEMPORARY_REDIRECT, "{path}");
        assert_eq!(location(&res), "/login");
    }

    let res = client.get(srv.url("/api/users")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["redirect"], "/login");

    // Tampered tokens count as no token.
    let res = client
        .get(srv.url("/dashboard"))
        .bearer_auth("not.a.jwt")
        .send()
        .await
        .unwrap();
    assert_eq!(location(&res), "/login");

    let res = client.get(srv.url("/login")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn gate_enforces_profile_completion_order() {
    let srv = TestServer::spawn().await;
    let client = client();

    let must_change = mint_jwt(Role::User, true, None);
    let res = client
        .get(srv.url("/dashboard"))
        .bearer_auth(&must_change)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&res), "/profile/change-password");

    let res = client
        .get(srv.url("/profile/change-password"))
        .bearer_auth(&must_change)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let no_phone = mint_jwt(Role::User, false, None);
    let res = client
        .get(srv.url("/dashboard/receipts"))
        .bearer_auth(&no_phone)
        .send()
        .await
        .unwrap();
    assert_eq!(location(&res), "/profile/update");

    // API routes are never redirected for profile flags.
    let res = client
        .get(srv.url("/api/user/dashboard"))
        .bearer_auth(&no_phone)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let complete = mint_jwt(Role::User, false, Some("0788000000"));
    let res = client
        .get(srv.url("/login"))
        .bearer_auth(&complete)
        .send()
        .await
        .unwrap();
    assert_eq!(location(&res), "/dashboard");
}

#[tokio::test]
async fn dashboard_shell_depends_on_role() {
    let srv = TestServer::spawn().await;
    let client = client();

    let user = mint_jwt(Role::CompanyAdmin, false, Some("0788000000"));
    let res = client
        .get(srv.url("/dashboard"))
        .bearer_auth(&user)
        .send()
        .await
        .unwrap();
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["shell"], "user");

    let res = client
        .get(srv.url("/dashboard/licenses"))
        .bearer_auth(&user)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&res), "/dashboard");

    let admin = mint_jwt(Role::Admin, false, Some("0788000000"));
    let res = client
        .get(srv.url("/dashboard/licenses"))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["shell"], "admin");
    assert_eq!(body["path"], "/dashboard/licenses");
}

#[tokio::test]
async fn signin_sets_session_cookie() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::builder()
        .cookie_store(true)
        .redirect(redirect::Policy::none())
        .build()
        .unwrap();

    let res = client
        .post(srv.url("/api/auth/signin"))
        .json(&json!({ "email": ADMIN_EMAIL, "password": "wrong-password" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .post(srv.url("/api/auth/signin"))
        .json(&json!({ "email": ADMIN_EMAIL }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let body = sign_in(&client, &srv, ADMIN_EMAIL, ADMIN_PASSWORD).await;
    assert_eq!(body["user"]["role"], "ADMIN");
    assert!(body["user"].get("passwordHash").is_none());

    let res = client.get(srv.url("/api/auth/session")).send().await.unwrap();
    let session: Value = res.json().await.unwrap();
    assert_eq!(session["session"]["email"], ADMIN_EMAIL);

    client.post(srv.url("/api/auth/signout")).send().await.unwrap();
    let res = client.get(srv.url("/api/users")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn application_is_submitted_and_approved() {
    let srv = TestServer::spawn().await;
    let client = client();

    let registered = register(&client, &srv, "owner@acme.rw").await;
    let owner_id = registered["user"]["id"].as_str().unwrap().to_string();
    let owner = token_for(&client, &srv, "owner@acme.rw", "owner-password").await;
    let admin = token_for(&client, &srv, ADMIN_EMAIL, ADMIN_PASSWORD).await;

    let res = client
        .get(srv.url("/api/desktop-applications/request"))
        .bearer_auth(&owner)
        .send()
        .await
        .unwrap();
    assert_eq!(res.json::<Value>().await.unwrap(), Value::Null);

    let res = client
        .post(srv.url("/api/desktop-applications/request"))
        .bearer_auth(&owner)
        .json(&company("12345"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["message"], "TIN number must be exactly 9 digits");

    let res = client
        .post(srv.url("/api/desktop-applications"))
        .bearer_auth(&owner)
        .json(&json!({ "company": company("123456789") }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let created: Value = res.json().await.unwrap();
    assert_eq!(created["desktopApplication"]["status"], "PENDING");
    let app_id = created["desktopApplication"]["id"].as_str().unwrap().to_string();

    let res = client
        .post(srv.url("/api/desktop-applications/request"))
        .bearer_auth(&owner)
        .json(&company("123456789"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["message"], "Company with this TIN number already exists");

    // Owner cannot review their own application.
    let res = client
        .post(srv.url(&format!("/api/desktop-applications/{app_id}/action")))
        .bearer_auth(&owner)
        .json(&json!({ "action": "APPROVE" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = client
        .post(srv.url(&format!("/api/desktop-applications/{app_id}/action")))
        .bearer_auth(&admin)
        .json(&json!({ "action": "LAUNCH" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = client
        .post(srv.url(&format!("/api/desktop-applications/{app_id}/action")))
        .bearer_auth(&admin)
        .json(&json!({ "action": "APPROVE" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["application"]["status"], "APPROVED");
    assert!(body["application"]["approvedAt"].is_string());
    assert_eq!(body["application"]["company"]["tinNumber"], "123456789");

    let res = client
        .get(srv.url("/api/users"))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    let users: Value = res.json().await.unwrap();
    let promoted = users
        .as_array()
        .unwrap()
        .iter()
        .find(|u| u["id"] == owner_id.as_str())
        .unwrap();
    assert_eq!(promoted["role"], "COMPANY_ADMIN");

    // Status patch shares the same transition rules.
    let res = client
        .patch(srv.url(&format!("/api/desktop-applications/{app_id}")))
        .bearer_auth(&admin)
        .json(&json!({ "status": "PENDING" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let res = client
        .get(srv.url("/api/activities?limit=10"))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    let log: Value = res.json().await.unwrap();
    assert_eq!(log[0]["type"], "DESKTOP_APP_APPROVED");
    assert_eq!(log[0]["newValue"]["status"], "APPROVED");
}

#[tokio::test]
async fn admin_endpoints_reject_other_callers() {
    let srv = TestServer::spawn().await;
    let client = client();

    register(&client, &srv, "plain@amo.rw").await;
    let user = token_for(&client, &srv, "plain@amo.rw", "owner-password").await;
    let admin = token_for(&client, &srv, ADMIN_EMAIL, ADMIN_PASSWORD).await;

    let patch = json!({ "id": UserId::new().to_string(), "status": "REVOKED" });
    let res = client
        .patch(srv.url("/api/licenses"))
        .json(&patch)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .patch(srv.url("/api/licenses"))
        .bearer_auth(&user)
        .json(&patch)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    for path in ["/api/users", "/api/alerts", "/api/messages", "/api/dashboard/stats"] {
        let res = client.get(srv.url(path)).bearer_auth(&user).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::FORBIDDEN, "{path}");
    }

    let res = client
        .get(srv.url("/api/licenses"))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.json::<Value>().await.unwrap(), json!([]));
}

enum Body {
    Json(Value),
    Raw(&'static str),
}

async fn send(
    client: &reqwest::Client,
    srv: &TestServer,
    method: reqwest::Method,
    path: &str,
    token: Option<&str>,
    body: &Body,
) -> (StatusCode, Value) {
    let mut req = client.request(method, srv.url(path));
    if let Some(token) = token {
        req = req.bearer_auth(token);
    }
    req = match body {
        Body::Json(value) => req.json(value),
        Body::Raw(text) => req
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(*text),
    };
    let res = req.send().await.unwrap();
    let status = res.status();
    (status, res.json().await.unwrap())
}

#[tokio::test]
async fn admin_writes_check_the_caller_before_the_body() {
    let srv = TestServer::spawn().await;
    let client = client();

    register(&client, &srv, "nosy@amo.rw").await;
    let user = token_for(&client, &srv, "nosy@amo.rw", "owner-password").await;
    let company_admin = mint_jwt(Role::CompanyAdmin, false, Some("0788123456"));

    use reqwest::Method;
    let endpoints = [
        (Method::POST, "/api/users"),
        (Method::PATCH, "/api/users"),
        (Method::POST, "/api/licenses"),
        (Method::PATCH, "/api/licenses"),
        (Method::PATCH, "/api/alerts"),
        (Method::PATCH, "/api/messages/not-a-uuid"),
        (Method::PATCH, "/api/desktop-applications/not-a-uuid"),
        (Method::POST, "/api/desktop-applications/not-a-uuid/action"),
    ];
    let bodies = [
        Body::Json(json!({})),
        Body::Json(json!({
            "id": "not-a-uuid",
            "userId": "not-a-uuid",
            "status": "BOGUS",
            "action": "BOGUS",
            "role": "BOGUS",
            "maxUsers": 1,
            "expiresAt": "2030-01-01T00:00:00Z",
        })),
        Body::Raw("{not json"),
    ];

    for (method, path) in &endpoints {
        for body in &bodies {
            for token in [&user, &company_admin] {
                let (status, err) = send(&client, &srv, method.clone(), path, Some(token.as_str()), body).await;
                assert_eq!(status, StatusCode::FORBIDDEN, "{method} {path}: {err}");
                assert_eq!(err["error"], "forbidden", "{method} {path}");
            }

            let (status, err) = send(&client, &srv, method.clone(), path, None, body).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{method} {path}: {err}");
            assert_eq!(err["error"], "unauthorized", "{method} {path}");
        }
    }
}

#[tokio::test]
async fn malformed_bodies_are_reported_as_json_validation_errors() {
    let srv = TestServer::spawn().await;
    let client = client();
    let admin = token_for(&client, &srv, ADMIN_EMAIL, ADMIN_PASSWORD).await;

    let (status, err) = send(
        &client,
        &srv,
        reqwest::Method::PATCH,
        "/api/licenses",
        Some(&admin),
        &Body::Raw("{not json"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["error"], "validation_error");
    assert!(err["message"].as_str().unwrap().starts_with("Invalid request body"));

    // Wrong field types fail deserialization the same way.
    let (status, err) = send(
        &client,
        &srv,
        reqwest::Method::POST,
        "/api/licenses",
        Some(&admin),
        &Body::Json(json!({ "userId": 7, "maxUsers": "many" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["error"], "validation_error");

    // Well-formed but incomplete bodies still reach field validation for admins.
    let (status, err) = send(
        &client,
        &srv,
        reqwest::Method::PATCH,
        "/api/licenses",
        Some(&admin),
        &Body::Json(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["message"], "License id is required");

    let (status, err) = send(
        &client,
        &srv,
        reqwest::Method::POST,
        "/api/auth/signin",
        None,
        &Body::Raw("email=a@b.c"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["error"], "validation_error");
}

#[tokio::test]
async fn licenses_alerts_and_messages_round_trip_through_admin() {
    let srv = TestServer::spawn().await;
    let client = client();

    let registered = register(&client, &srv, "licensee@amo.rw").await;
    let user_id = registered["user"]["id"].as_str().unwrap().to_string();
    let user = token_for(&client, &srv, "licensee@amo.rw", "owner-password").await;
    let admin = token_for(&client, &srv, ADMIN_EMAIL, ADMIN_PASSWORD).await;

    let res = client
        .post(srv.url("/api/licenses"))
        .bearer_auth(&admin)
        .json(&json!({ "userId": user_id }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let expires_at = Utc::now() + ChronoDuration::days(30);
    let res = client
        .post(srv.url("/api/licenses"))
        .bearer_auth(&admin)
        .json(&json!({ "userId": user_id, "expiresAt": expires_at, "maxUsers": 5 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let license: Value = res.json().await.unwrap();
    assert_eq!(license["status"], "ACTIVE");
    assert_eq!(license["user"]["email"], "licensee@amo.rw");
    let license_id = license["id"].as_str().unwrap().to_string();

    let res = client
        .patch(srv.url("/api/licenses"))
        .bearer_auth(&admin)
        .json(&json!({ "id": license_id, "status": "REVOKED" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.json::<Value>().await.unwrap()["status"], "REVOKED");

    let res = client
        .patch(srv.url("/api/licenses"))
        .bearer_auth(&admin)
        .json(&json!({ "id": license_id, "status": "ACTIVE" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let res = client
        .post(srv.url("/api/alerts"))
        .bearer_auth(&user)
        .json(&json!({ "type": "WARNING", "message": "Printer offline" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let alert: Value = res.json().await.unwrap();

    let res = client
        .patch(srv.url("/api/alerts"))
        .bearer_auth(&admin)
        .json(&json!({ "id": alert["id"], "status": "RESOLVED", "response": "Replaced" }))
        .send()
        .await
        .unwrap();
    let resolved: Value = res.json().await.unwrap();
    assert_eq!(resolved["status"], "RESOLVED");
    assert!(resolved["resolvedAt"].is_string());

    let res = client
        .post(srv.url("/api/messages"))
        .bearer_auth(&user)
        .json(&json!({ "subject": "Hello", "content": "Need help" }))
        .send()
        .await
        .unwrap();
    let message: Value = res.json().await.unwrap();
    assert_eq!(message["status"], "UNREAD");

    let stats: Value = client
        .get(srv.url("/api/dashboard/stats"))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats["totalUsers"], 2);
    assert_eq!(stats["activeLicenses"], 0);
    assert_eq!(stats["pendingAlerts"], 0);
    assert_eq!(stats["unreadMessages"], 1);
    assert_eq!(stats["degraded"], json!([]));

    let id = message["id"].as_str().unwrap();
    let res = client
        .patch(srv.url(&format!("/api/messages/{id}")))
        .bearer_auth(&admin)
        .json(&json!({ "status": "READ" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.json::<Value>().await.unwrap()["status"], "READ");
}

#[tokio::test]
async fn sync_reports_it_is_not_integrated() {
    let srv = TestServer::spawn().await;
    let client = client();
    let admin = token_for(&client, &srv, ADMIN_EMAIL, ADMIN_PASSWORD).await;

    let res = client
        .post(srv.url("/api/sync"))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["integrated"], false);
    assert_eq!(body["stats"]["totalRecords"], 1);
    assert_eq!(body["stats"]["syncedRecords"], 0);
    assert_eq!(body["stats"]["failedRecords"], 1);
}

#[tokio::test]
async fn receipts_are_recorded_and_verified() {
    let srv = TestServer::spawn().await;
    let client = client();
    let admin = token_for(&client, &srv, ADMIN_EMAIL, ADMIN_PASSWORD).await;

    register(&client, &srv, "buyer@amo.rw").await;
    let buyer = token_for(&client, &srv, "buyer@amo.rw", "owner-password").await;

    let receipt = json!({ "code": "abc-123", "amount": 11800, "vatAmount": 1800, "items": [] });
    let res = client
        .post(srv.url("/api/receipts"))
        .bearer_auth(&buyer)
        .json(&receipt)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = client
        .post(srv.url("/api/receipts"))
        .bearer_auth(&admin)
        .json(&receipt)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);

    let res = client
        .post(srv.url("/api/receipts"))
        .bearer_auth(&admin)
        .json(&receipt)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let res = client
        .post(srv.url("/api/receipt/verify"))
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = client
        .post(srv.url("/api/receipt/verify"))
        .json(&json!({ "code": "missing" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = client
        .post(srv.url("/api/receipt/verify"))
        .bearer_auth(&buyer)
        .json(&json!({ "code": "ABC-123" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["amount"], 11800);
    assert_eq!(body["user"]["email"], ADMIN_EMAIL);

    let dashboard: Value = client
        .get(srv.url("/api/user/dashboard"))
        .bearer_auth(&buyer)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(dashboard["totalScans"], 1);
    assert_eq!(dashboard["totalReceipts"], 0);
    assert_eq!(dashboard["applicationStatus"], Value::Null);
}

#[tokio::test]
async fn profile_update_reissues_session() {
    let srv = TestServer::spawn().await;
    let client = client();
    let admin = token_for(&client, &srv, ADMIN_EMAIL, ADMIN_PASSWORD).await;

    let res = client
        .post(srv.url("/api/users"))
        .bearer_auth(&admin)
        .json(&json!({ "email": "staff@amo.rw", "password": "temporary-pass" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let created: Value = res.json().await.unwrap();
    assert_eq!(created["mustChangePassword"], true);

    let staff = token_for(&client, &srv, "staff@amo.rw", "temporary-pass").await;
    let res = client
        .post(srv.url("/api/profile/change-password"))
        .bearer_auth(&staff)
        .json(&json!({ "currentPassword": "nope-nope", "newPassword": "permanent-pass" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = client
        .post(srv.url("/api/profile/change-password"))
        .bearer_auth(&staff)
        .json(&json!({ "currentPassword": "temporary-pass", "newPassword": "permanent-pass" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["user"]["mustChangePassword"], false);
    let staff = body["token"].as_str().unwrap().to_string();

    // Phone still missing, so pages go to profile update.
    let res = client
        .get(srv.url("/dashboard"))
        .bearer_auth(&staff)
        .send()
        .await
        .unwrap();
    assert_eq!(location(&res), "/profile/update");

    let res = client
        .post(srv.url("/api/profile/update"))
        .bearer_auth(&staff)
        .json(&json!({ "name": "Staff", "phoneNumber": "0788999000" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let staff = res.json::<Value>().await.unwrap()["token"]
        .as_str()
        .unwrap()
        .to_string();

    let res = client
        .get(srv.url("/dashboard"))
        .bearer_auth(&staff)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}
