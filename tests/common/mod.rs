#![allow(dead_code)]

use std::{net::SocketAddr, sync::Arc};

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{header, Request, Response, StatusCode},
    Router,
};
use chrono::{Duration, TimeZone, Utc};
use parking_lot::Mutex;
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use gatekeeper::{
    build_router,
    config::Config,
    models::{auth::TokenType, user::Role},
    services::{
        mail::Mailer,
        token::{ManualClock, TokenService},
        users::{InMemoryUserDirectory, UserDirectory},
    },
    AppState,
};

pub const SECRET: &str = "integration-test-secret-0123456789abcdef";

/// Mailer that keeps every link it is handed, so tests can follow them.
#[derive(Default)]
pub struct CapturingMailer {
    pub verification: Mutex<Vec<(String, String)>>,
    pub reset: Mutex<Vec<(String, String)>>,
}

impl Mailer for CapturingMailer {
    fn send_verification(&self, to: &str, link: &str) {
        self.verification.lock().push((to.to_string(), link.to_string()));
    }

    fn send_password_reset(&self, to: &str, link: &str) {
        self.reset.lock().push((to.to_string(), link.to_string()));
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub clock: Arc<ManualClock>,
    pub mailer: Arc<CapturingMailer>,
    pub users: Arc<InMemoryUserDirectory>,
}

impl TestApp {
    pub fn new() -> Self {
        let config = Arc::new(Config::for_tests(SECRET));
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap()));
        let tokens = Arc::new(TokenService::with_clock(SECRET, config.cookie, clock.clone()).unwrap());
        let users = Arc::new(InMemoryUserDirectory::new());
        let mailer = Arc::new(CapturingMailer::default());

        let state = AppState::new(config, tokens, users.clone(), mailer.clone());
        let router = build_router(state.clone());
        Self { router, state, clock, mailer, users }
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// Creates a verified user directly in the directory.
    pub fn seed_user(&self, email: &str, password: &str, role: Role) -> Uuid {
        let hash = bcrypt::hash(password, 4).unwrap();
        let user = self.users.create(email, hash, role).unwrap();
        self.users.mark_verified(user.id);
        user.id
    }

    pub fn session_cookie(&self, user_id: Uuid, role: Role) -> String {
        let token = self
            .state
            .tokens
            .issue(TokenType::Access, Duration::hours(1), user_id, role)
            .unwrap();
        format!("jwt={token}")
    }
}

pub fn get(uri: &str, ip: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri).header("X-Real-IP", ip);
    if let Some(c) = cookie {
        builder = builder.header(header::COOKIE, c);
    }
    builder.body(Body::empty()).unwrap()
}

pub fn post_json(uri: &str, ip: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("X-Real-IP", ip)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// JSON POST with no proxy headers, arriving from `peer` as the server would see it.
pub fn post_json_from_peer(uri: &str, peer: SocketAddr, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .extension(ConnectInfo(peer))
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn delete(uri: &str, ip: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("DELETE").uri(uri).header("X-Real-IP", ip);
    if let Some(c) = cookie {
        builder = builder.header(header::COOKIE, c);
    }
    builder.body(Body::empty()).unwrap()
}

pub async fn json_body(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn set_cookie(response: &Response<Body>) -> String {
    response
        .headers()
        .get(header::SET_COOKIE)
        .expect("Set-Cookie header")
        .to_str()
        .unwrap()
        .to_string()
}

/// `jwt=<value>` part of a Set-Cookie header, ready to send back as `Cookie`.
pub fn cookie_pair(set_cookie: &str) -> String {
    set_cookie.split(';').next().unwrap().to_string()
}

pub fn token_from_link(link: &str) -> String {
    link.split("token=").nth(1).unwrap().to_string()
}

pub fn assert_status(response: &Response<Body>, expected: StatusCode) {
    assert_eq!(response.status(), expected, "unexpected status");
}
