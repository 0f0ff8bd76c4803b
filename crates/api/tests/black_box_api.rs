use std::sync::Arc;

use reqwest::StatusCode;
use serde_json::json;

use warden_api::app::{AppContext, build_app};
use warden_auth::{Identity, MemoryAdapter, PolicyRule, hash_password};
use warden_core::{TenantId, UserId};
use warden_infra::{AppConfig, InMemoryIdentityStore};

const PASSWORD: &str = "s3cret-pass";

struct TestServer {
    base_url: String,
    tenant_id: TenantId,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    /// Seeded with `alice` (editor in her tenant) and `root` (super role).
    async fn spawn() -> Self {
        let tenant_id = TenantId::new();
        let hash = hash_password(PASSWORD).unwrap();
        let user = |username: &str, roles: &str| Identity {
            id: UserId::new(),
            tenant_id,
            username: username.to_string(),
            password_hash: hash.clone(),
            roles: roles.to_string(),
            real_name: username.to_uppercase(),
            home_path: String::new(),
        };
        let identities = Arc::new(InMemoryIdentityStore::with_identities([
            user("alice", r#"["editor"]"#),
            user("root", "super"),
        ]));

        let dom = tenant_id.to_string();
        let policies = Arc::new(MemoryAdapter::with_rules([
            PolicyRule::grant("editor", dom.clone(), "/whoami", "get"),
            PolicyRule::grant("editor", dom.clone(), "/auth/logout", "post"),
            PolicyRule::grant("editor", dom.clone(), "/auth/codes", "get"),
        ]));

        let mut config = AppConfig::default();
        config.auth.jwt_secret = "black-box-access".to_string();
        config.auth.refresh_secret = "black-box-refresh".to_string();

        // Build app (same router as prod), but bind to an ephemeral port.
        let app = build_app(Arc::new(AppContext::new(config, identities, policies)));
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
            tenant_id,
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn login(&self, client: &reqwest::Client, username: &str) -> serde_json::Value {
        let res = client
            .post(self.url("/auth/login"))
            .json(&json!({ "username": username, "password": PASSWORD }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        res.json().await.unwrap()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn set_cookie(res: &reqwest::Response) -> String {
    res.headers()
        .get(reqwest::header::SET_COOKIE)
        .expect("missing Set-Cookie")
        .to_str()
        .unwrap()
        .to_string()
}

#[tokio::test]
async fn health_is_public() {
    let srv = TestServer::spawn().await;

    let res = reqwest::get(srv.url("/health")).await.unwrap();

    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn auth_required_for_protected_endpoints() {
    let srv = TestServer::spawn().await;

    let client = reqwest::Client::new();
    let res = client.get(srv.url("/whoami")).send().await.unwrap();

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "unauthorized");
    assert_eq!(body["code"], 1003);

    let res = client
        .get(srv.url("/whoami"))
        .bearer_auth("not-a-jwt")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn login_failures_are_distinguished() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .post(srv.url("/auth/login"))
        .json(&json!({ "username": "nobody", "password": PASSWORD }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["code"], 1001);

    let res = client
        .post(srv.url("/auth/login"))
        .json(&json!({ "username": "alice", "password": "wrong" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["code"], 1002);

    let res = client
        .post(srv.url("/auth/login"))
        .json(&json!({ "username": "alice" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn login_returns_tokens_user_info_and_cookie() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .post(srv.url("/auth/login"))
        .json(&json!({ "username": "alice", "password": PASSWORD }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let cookie = set_cookie(&res);
    assert!(cookie.starts_with("jwt="));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("SameSite=None"));
    assert!(cookie.contains(&format!("Max-Age={}", 30 * 24 * 3600)));

    let body: serde_json::Value = res.json().await.unwrap();
    assert!(!body["accessToken"].as_str().unwrap().is_empty());
    assert!(!body["refreshToken"].as_str().unwrap().is_empty());
    assert_eq!(body["userInfo"]["username"], "alice");
    assert_eq!(body["userInfo"]["realName"], "ALICE");
    assert_eq!(body["userInfo"]["homePath"], "/dashboard");
    assert_eq!(body["userInfo"]["roles"], json!(["editor"]));
}

#[tokio::test]
async fn tenant_context_is_derived_from_token() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let session = srv.login(&client, "alice").await;
    let token = session["accessToken"].as_str().unwrap();

    let res = client
        .get(srv.url("/whoami"))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["tenant_id"].as_str().unwrap(), srv.tenant_id.to_string());
    assert_eq!(body["domain"].as_str().unwrap(), srv.tenant_id.to_string());
    assert!(body["roles"].as_array().unwrap().iter().any(|r| r == "editor"));
}

#[tokio::test]
async fn ungranted_action_is_forbidden() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let session = srv.login(&client, "alice").await;
    let token = session["accessToken"].as_str().unwrap();

    let res = client
        .post(srv.url("/whoami"))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["message"], "unauthorized: permission denied");
}

#[tokio::test]
async fn super_role_may_switch_tenant() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let session = srv.login(&client, "root").await;
    let token = session["accessToken"].as_str().unwrap();
    let other = TenantId::new();

    let res = client
        .get(srv.url("/whoami"))
        .bearer_auth(token)
        .header("X-Tenant-Id", other.to_string())
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["tenant_id"].as_str().unwrap(), other.to_string());
}

#[tokio::test]
async fn refresh_rotates_and_rejects_stale_token() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let session = srv.login(&client, "alice").await;
    let first = session["refreshToken"].as_str().unwrap().to_string();

    let res = client
        .post(srv.url("/auth/refresh"))
        .json(&json!({ "refreshToken": first }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let rotated: serde_json::Value = res.json().await.unwrap();
    let second = rotated["refreshToken"].as_str().unwrap().to_string();
    assert_ne!(second, first);

    let res = client
        .post(srv.url("/auth/refresh"))
        .json(&json!({ "refreshToken": first }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["code"], 1005);

    // Cookie is accepted when the body carries no token.
    let res = client
        .post(srv.url("/auth/refresh"))
        .header(reqwest::header::COOKIE, format!("jwt={second}"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn refresh_without_token_is_rejected() {
    let srv = TestServer::spawn().await;

    let res = reqwest::Client::new()
        .post(srv.url("/auth/refresh"))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["code"], 1004);
}

#[tokio::test]
async fn logout_clears_cookie_and_revokes_refresh_token() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let session = srv.login(&client, "alice").await;
    let access = session["accessToken"].as_str().unwrap();
    let refresh = session["refreshToken"].as_str().unwrap();

    let res = client
        .post(srv.url("/auth/logout"))
        .bearer_auth(access)
        .json(&json!({ "refreshToken": refresh }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(set_cookie(&res).contains("Max-Age=0"));

    let res = client
        .post(srv.url("/auth/refresh"))
        .json(&json!({ "refreshToken": refresh }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["code"], 1005);
}

#[tokio::test]
async fn access_codes_come_from_role_grants() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let session = srv.login(&client, "alice").await;
    let token = session["accessToken"].as_str().unwrap();

    let res = client
        .get(srv.url("/auth/codes"))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["codes"], json!(["/auth/codes", "/auth/logout", "/whoami"]));
}
