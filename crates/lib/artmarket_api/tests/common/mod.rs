//! Shared harness: in-memory backends behind the full router.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use artmarket_api::config::ApiConfig;
use artmarket_api::{AppState, router_with};
use artmarket_core::denylist::{Denylist, DenylistError, MemoryDenylist};
use artmarket_core::directory::{MemoryUserDirectory, UserDirectory};
use artmarket_core::models::auth::Role;
use artmarket_core::models::user::NewUser;
use artmarket_core::ownership::{MemoryResourceOwners, ResourceOwners};
use async_trait::async_trait;
use axum::body::Body;
use axum::extract::Path;
use axum::http::{HeaderMap, Method, Request, StatusCode};
use axum::response::Response;
use axum::routing::{get, put};
use axum::{Json, Router};
use serde_json::{Value, json};
use tower::ServiceExt;

pub const SECRET: &str = "integration-test-secret-at-least-32-bytes";
pub const PASSWORD: &str = "P@ssw0rd!";

/// Limits high enough that only the rate-limit tests ever hit them.
pub fn relaxed_env() -> Vec<(&'static str, &'static str)> {
    vec![
        ("RATE_LIMIT_AUTH_CAPACITY", "1000"),
        ("RATE_LIMIT_LOGIN_CAPACITY", "1000"),
    ]
}

pub fn config(overrides: &[(&str, &str)]) -> ApiConfig {
    let mut env: HashMap<String, String> = HashMap::new();
    env.insert("JWT_SECRET".into(), SECRET.into());
    for (k, v) in overrides {
        env.insert((*k).to_string(), (*v).to_string());
    }
    ApiConfig::from_lookup(|k| env.get(k).cloned()).expect("test config")
}

/// A shared denylist that is down.
pub struct DownDenylist;

#[async_trait]
impl Denylist for DownDenylist {
    async fn revoke(&self, _token: &str, _ttl: Duration) -> Result<(), DenylistError> {
        Err(DenylistError::Unavailable("connection refused".into()))
    }

    async fn is_revoked(&self, _token: &str) -> Result<bool, DenylistError> {
        Err(DenylistError::Unavailable("connection refused".into()))
    }
}

/// Stand-ins for the marketplace routes owned by other services.
fn collaborators() -> Router<AppState> {
    async fn ok() -> Json<Value> {
        Json(json!({ "ok": true }))
    }

    Router::new()
        .route("/api/cart", get(ok))
        .route("/api/dashboard/admin/overview", get(ok))
        .route("/api/dashboard/artist/overview", get(ok))
        .route("/api/artworks/my-artworks", get(ok))
        .route(
            "/api/artworks/{id}",
            put(|Path(id): Path<String>| async move { Json(json!({ "id": id })) }),
        )
        .route(
            "/api/orders/{id}",
            get(|Path(id): Path<String>| async move { Json(json!({ "id": id })) }),
        )
        .route(
            "/api/users/{id}",
            put(|Path(id): Path<String>| async move { Json(json!({ "id": id })) }),
        )
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub directory: Arc<MemoryUserDirectory>,
    pub owners: Arc<MemoryResourceOwners>,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub json: Value,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with(&relaxed_env(), Arc::new(MemoryDenylist::new()))
    }

    pub fn with(env: &[(&str, &str)], denylist: Arc<dyn Denylist>) -> Self {
        let directory = Arc::new(MemoryUserDirectory::new());
        let owners = Arc::new(MemoryResourceOwners::new());
        let state = AppState::new(
            config(env),
            Arc::clone(&directory) as Arc<dyn UserDirectory>,
            denylist,
            Arc::clone(&owners) as Arc<dyn ResourceOwners>,
        )
        .expect("app state");
        let router = router_with(state.clone(), collaborators());
        Self {
            router,
            state,
            directory,
            owners,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.expect("request")
    }

    pub async fn call(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request builder");
        into_test_response(self.send(request).await).await
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.call(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> TestResponse {
        self.call(Method::POST, uri, token, Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: Option<&str>, body: Value) -> TestResponse {
        self.call(Method::PUT, uri, token, Some(body)).await
    }

    /// Register through the API and return the response body.
    pub async fn register(&self, email: &str, role: &str) -> Value {
        let resp = self
            .post(
                "/api/auth/register",
                None,
                json!({
                    "email": email,
                    "password": PASSWORD,
                    "firstName": "Test",
                    "lastName": "User",
                    "role": role,
                }),
            )
            .await;
        assert_eq!(resp.status, StatusCode::CREATED, "register {email}: {}", resp.json);
        resp.json
    }

    /// Create an administrator directly in the directory and log in.
    pub async fn admin_session(&self) -> Session {
        let password_hash = self.state.passwords.hash(PASSWORD).await.expect("hash");
        self.directory
            .create(NewUser {
                email: "admin@x.com".into(),
                password_hash,
                first_name: "Ada".into(),
                last_name: "Admin".into(),
                role: Role::Admin,
            })
            .await
            .expect("create admin");
        self.login("admin@x.com", PASSWORD).await
    }

    pub async fn login(&self, email: &str, password: &str) -> Session {
        let resp = self
            .post(
                "/api/auth/login",
                None,
                json!({ "email": email, "password": password }),
            )
            .await;
        assert_eq!(resp.status, StatusCode::OK, "login {email}: {}", resp.json);
        Session::from_body(&resp.json)
    }

    /// Register and return the session it opened.
    pub async fn session(&self, email: &str, role: &str) -> Session {
        Session::from_body(&self.register(email, role).await)
    }
}

/// Tokens and identity returned by register or login.
#[derive(Debug, Clone)]
pub struct Session {
    pub subject: String,
    pub access: String,
    pub refresh: String,
}

impl Session {
    pub fn from_body(body: &Value) -> Self {
        Self {
            subject: body["user"]["id"].as_str().expect("user.id").to_string(),
            access: body["tokens"]["accessToken"]
                .as_str()
                .expect("accessToken")
                .to_string(),
            refresh: body["tokens"]["refreshToken"]
                .as_str()
                .expect("refreshToken")
                .to_string(),
        }
    }
}

pub async fn into_test_response(resp: Response) -> TestResponse {
    let status = resp.status();
    let headers = resp.headers().clone();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("read body");
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    TestResponse {
        status,
        headers,
        json,
    }
}
