#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    extract::ConnectInfo,
    http::{Request, Response},
};
use keyturn::{
    ServerConfig,
    cli::seed_users,
    clock::ManualClock,
    create_app,
    jwt::{AccessClaims, JwtConfig},
    service::AuthOptions,
    store::{Backend, MemoryBackend},
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceExt;

pub const JWT_SECRET: &[u8] = b"test-jwt-secret-that-is-long-enough";

/// Fixed start time so expiry arithmetic is predictable.
pub const START: u64 = 1_700_000_000;

pub const TEST_IP: [u8; 4] = [127, 0, 0, 1];

pub struct TestApp<B = MemoryBackend> {
    pub app: Router,
    pub backend: B,
    pub clock: Arc<ManualClock>,
}

pub async fn setup() -> TestApp {
    TestSetup::new().build().await
}

/// Builder for test setup with various options
pub struct TestSetup {
    revoke_chain_on_reuse: bool,
    login_attempts_per_minute: u32,
    secure_cookies: bool,
}

impl TestSetup {
    pub fn new() -> Self {
        Self {
            revoke_chain_on_reuse: false,
            login_attempts_per_minute: 1000,
            secure_cookies: false,
        }
    }

    pub fn with_revoke_chain(mut self) -> Self {
        self.revoke_chain_on_reuse = true;
        self
    }

    pub fn with_login_limit(mut self, per_minute: u32) -> Self {
        self.login_attempts_per_minute = per_minute;
        self
    }

    pub fn with_secure_cookies(mut self) -> Self {
        self.secure_cookies = true;
        self
    }

    pub async fn build(self) -> TestApp {
        self.build_with(MemoryBackend::new()).await
    }

    /// Build on the given backend, seeded with the demo user john:123456.
    pub async fn build_with<B: Backend>(self, backend: B) -> TestApp<B> {
        seed_users(&backend, &[]).await.expect("Failed to seed users");

        let clock = Arc::new(ManualClock::new(START));
        let mut config = ServerConfig::new(backend.clone(), JWT_SECRET);
        config.clock = clock.clone();
        config.secure_cookies = self.secure_cookies;
        config.login_attempts_per_minute = self.login_attempts_per_minute;
        config.options = AuthOptions {
            revoke_chain_on_reuse: self.revoke_chain_on_reuse,
        };

        TestApp {
            app: create_app(&config),
            backend,
            clock,
        }
    }
}

impl<B> TestApp<B> {
    /// Send a request as if it came from `TEST_IP`.
    pub async fn send(&self, mut request: Request<Body>) -> Response<Body> {
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from((TEST_IP, 40000))));
        self.send_raw(request).await
    }

    /// Send a request without connection info.
    pub async fn send_raw(&self, request: Request<Body>) -> Response<Body> {
        self.app.clone().oneshot(request).await.unwrap()
    }

    pub async fn login(&self, username: &str, password: &str) -> Response<Body> {
        self.send(login_request(username, password)).await
    }

    /// Log in as the seeded demo user and return the issued cookies.
    pub async fn login_john(&self) -> Session {
        let response = self.login("john", "123456").await;
        assert_eq!(response.status(), 200, "john should be able to log in");
        Session::from_response(&response)
    }

    /// POST /auth/refresh with the given `jid` cookie value.
    pub async fn refresh(&self, jid: &str) -> Response<Body> {
        self.send(
            Request::builder()
                .method("POST")
                .uri("/auth/refresh")
                .header("cookie", format!("jid={}", jid))
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    /// GET /protected with a bearer token.
    pub async fn protected(&self, access: &str) -> Response<Body> {
        self.send(
            Request::builder()
                .method("GET")
                .uri("/protected")
                .header("authorization", format!("Bearer {}", access))
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }
}

pub fn login_request(username: &str, password: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/login")
        .header("content-type", "application/json")
        .body(Body::from(
            serde_json::json!({ "username": username, "password": password }).to_string(),
        ))
        .unwrap()
}

/// The cookies a successful login or refresh hands out.
#[derive(Debug, Clone)]
pub struct Session {
    pub access: String,
    pub refresh: String,
}

impl Session {
    pub fn from_response(response: &Response<Body>) -> Self {
        let cookies = extract_set_cookies(response);
        Self {
            access: cookie_value(&cookies, "at").expect("missing access cookie"),
            refresh: cookie_value(&cookies, "jid").expect("missing refresh cookie"),
        }
    }

    pub fn refresh_id(&self) -> &str {
        self.refresh.split_once('.').map(|(id, _)| id).unwrap()
    }
}

/// Extract Set-Cookie headers from response
pub fn extract_set_cookies(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .collect()
}

/// Value of the named cookie among Set-Cookie headers.
pub fn cookie_value(cookies: &[String], name: &str) -> Option<String> {
    let prefix = format!("{}=", name);
    cookies
        .iter()
        .find_map(|c| c.strip_prefix(&prefix))
        .and_then(|rest| rest.split(';').next())
        .map(|v| v.to_string())
}

/// Check if cookies contain a token being cleared (Max-Age=0)
pub fn has_cleared_cookie(cookies: &[String], cookie_name: &str) -> bool {
    cookies
        .iter()
        .any(|c| c.starts_with(&format!("{}=;", cookie_name)) && c.contains("Max-Age=0"))
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).expect("response body is not JSON")
}

pub fn decode_access(token: &str, now: u64) -> AccessClaims {
    JwtConfig::new(JWT_SECRET)
        .validate_access_token(token, now)
        .expect("access token should validate")
}
