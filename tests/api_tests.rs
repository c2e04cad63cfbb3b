mod common;

use axum::http::StatusCode;
use chrono::Duration;
use serde_json::json;

use common::*;
use gatekeeper::{
    models::{auth::TokenType, user::Role},
    services::users::UserDirectory,
};

#[tokio::test]
async fn test_ping_is_public() {
    let app = TestApp::new();
    let res = app.send(get("/api/ping", "10.0.0.1", None)).await;
    assert_status(&res, StatusCode::OK);
    assert_eq!(json_body(res).await, json!({ "status": "ok" }));
}

#[tokio::test]
async fn test_secured_route_without_cookie_is_401() {
    let app = TestApp::new();
    let res = app.send(get("/api/auth/me", "10.0.0.2", None)).await;
    assert_status(&res, StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(res).await, json!({ "error": "Unauthorized" }));
}

#[tokio::test]
async fn test_register_then_verify_email() {
    let app = TestApp::new();

    let res = app
        .send(post_json(
            "/api/auth/register",
            "10.0.1.1",
            json!({ "email": "Ada@Example.com", "password": "correct-horse" }),
        ))
        .await;
    assert_status(&res, StatusCode::CREATED);
    let id = json_body(res).await["id"].as_str().unwrap().to_string();

    let sent = app.mailer.verification.lock().clone();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "ada@example.com");
    let token = token_from_link(&sent[0].1);

    let user = app.users.find_by_email("ada@example.com").unwrap();
    assert_eq!(user.id.to_string(), id);
    assert!(!user.verified);

    let res = app
        .send(get(&format!("/api/auth/verify-email?token={token}"), "10.0.1.1", None))
        .await;
    assert_status(&res, StatusCode::OK);
    assert!(app.users.find_by_email("ada@example.com").unwrap().verified);
}

#[tokio::test]
async fn test_register_duplicate_and_invalid() {
    let app = TestApp::new();
    app.seed_user("taken@example.com", "password123", Role::User);

    let res = app
        .send(post_json(
            "/api/auth/register",
            "10.0.1.2",
            json!({ "email": "TAKEN@example.com", "password": "password123" }),
        ))
        .await;
    assert_status(&res, StatusCode::CONFLICT);

    let res = app
        .send(post_json(
            "/api/auth/register",
            "10.0.1.2",
            json!({ "email": "new@example.com", "password": "short" }),
        ))
        .await;
    assert_status(&res, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_login_sets_cookie_that_opens_me() {
    let app = TestApp::new();
    app.seed_user("grace@example.com", "hopper-1906", Role::Editor);

    let res = app
        .send(post_json(
            "/api/auth/login",
            "10.0.2.1",
            json!({ "email": "grace@example.com", "password": "hopper-1906" }),
        ))
        .await;
    assert_status(&res, StatusCode::NO_CONTENT);
    let cookie = set_cookie(&res);
    assert!(cookie.starts_with("jwt="));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("Path=/"));
    assert!(cookie.contains("Max-Age=86400"));

    let res = app
        .send(get("/api/auth/me", "10.0.2.1", Some(&cookie_pair(&cookie))))
        .await;
    assert_status(&res, StatusCode::OK);
    let body = json_body(res).await;
    assert_eq!(body["email"], "grace@example.com");
    assert_eq!(body["role"], "editor");
    assert!(body.get("password_hash").is_none());
}

#[tokio::test]
async fn test_login_wrong_password() {
    let app = TestApp::new();
    app.seed_user("linus@example.com", "penguins!", Role::User);

    let res = app
        .send(post_json(
            "/api/auth/login",
            "10.0.2.2",
            json!({ "email": "linus@example.com", "password": "walruses" }),
        ))
        .await;
    assert_status(&res, StatusCode::UNAUTHORIZED);
    assert!(res.headers().get("set-cookie").is_none());
}

#[tokio::test]
async fn test_login_rate_limited_per_client() {
    let app = TestApp::new();
    let attempt = |ip: &'static str| {
        post_json(
            "/api/auth/login",
            ip,
            json!({ "email": "nobody@example.com", "password": "whatever1" }),
        )
    };

    assert_status(&app.send(attempt("10.0.3.1")).await, StatusCode::UNAUTHORIZED);
    assert_status(&app.send(attempt("10.0.3.1")).await, StatusCode::UNAUTHORIZED);

    let res = app.send(attempt("10.0.3.1")).await;
    assert_status(&res, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(json_body(res).await, json!({ "error": "Too many requests" }));

    // A different client has its own bucket.
    assert_status(&app.send(attempt("10.0.3.2")).await, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_forgot_password_shares_login_budget() {
    let app = TestApp::new();
    let ip = "10.0.3.3";
    let forgot = || post_json("/api/auth/forgot-password", ip, json!({ "email": "x@example.com" }));

    assert_status(&app.send(forgot()).await, StatusCode::NO_CONTENT);
    assert_status(&app.send(forgot()).await, StatusCode::NO_CONTENT);
    let res = app
        .send(post_json(
            "/api/auth/login",
            ip,
            json!({ "email": "x@example.com", "password": "whatever1" }),
        ))
        .await;
    assert_status(&res, StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_verify_email_limited_before_token_check() {
    let app = TestApp::new();
    let res = app
        .send(get("/api/auth/verify-email?token=garbage", "10.0.4.1", None))
        .await;
    assert_status(&res, StatusCode::UNAUTHORIZED);

    let res = app
        .send(get("/api/auth/verify-email?token=garbage", "10.0.4.1", None))
        .await;
    assert_status(&res, StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_admin_route_matrix() {
    let app = TestApp::new();
    let admin = app.seed_user("root@example.com", "rootroot", Role::Admin);
    let user = app.seed_user("user@example.com", "useruser", Role::User);

    let res = app.send(get("/api/users", "10.0.5.1", None)).await;
    assert_status(&res, StatusCode::UNAUTHORIZED);

    let user_cookie = app.session_cookie(user, Role::User);
    let res = app.send(get("/api/users", "10.0.5.1", Some(&user_cookie))).await;
    assert_status(&res, StatusCode::FORBIDDEN);
    assert_eq!(json_body(res).await, json!({ "error": "Forbidden" }));

    let admin_cookie = app.session_cookie(admin, Role::Admin);
    let res = app.send(get("/api/users", "10.0.5.1", Some(&admin_cookie))).await;
    assert_status(&res, StatusCode::OK);
    assert_eq!(json_body(res).await.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_admin_delete_user() {
    let app = TestApp::new();
    let admin = app.seed_user("root@example.com", "rootroot", Role::Admin);
    let user = app.seed_user("gone@example.com", "useruser", Role::User);
    let cookie = app.session_cookie(admin, Role::Admin);

    let res = app
        .send(delete(&format!("/api/users/{admin}"), "10.0.5.2", Some(&cookie)))
        .await;
    assert_status(&res, StatusCode::BAD_REQUEST);

    let res = app
        .send(delete(&format!("/api/users/{user}"), "10.0.5.2", Some(&cookie)))
        .await;
    assert_status(&res, StatusCode::NO_CONTENT);
    assert!(app.users.find_by_id(user).is_none());

    let res = app
        .send(delete(&format!("/api/users/{user}"), "10.0.5.2", Some(&cookie)))
        .await;
    assert_status(&res, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_purpose_token_is_not_a_session() {
    let app = TestApp::new();
    let id = app.seed_user("eve@example.com", "password123", Role::Admin);
    let token = app
        .state
        .tokens
        .issue(TokenType::PasswordReset, Duration::hours(1), id, Role::Admin)
        .unwrap();

    let res = app
        .send(get("/api/users", "10.0.6.1", Some(&format!("jwt={token}"))))
        .await;
    assert_status(&res, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_session_expires_with_clock() {
    let app = TestApp::new();
    let id = app.seed_user("tick@example.com", "password123", Role::User);
    let cookie = app.session_cookie(id, Role::User);

    let res = app.send(get("/api/auth/me", "10.0.6.2", Some(&cookie))).await;
    assert_status(&res, StatusCode::OK);

    app.clock.advance(Duration::hours(1));
    let res = app.send(get("/api/auth/me", "10.0.6.2", Some(&cookie))).await;
    assert_status(&res, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_clears_cookie() {
    let app = TestApp::new();
    let id = app.seed_user("bye@example.com", "password123", Role::User);
    let cookie = app.session_cookie(id, Role::User);

    let res = app.send(get("/api/auth/logout", "10.0.7.1", Some(&cookie))).await;
    assert_status(&res, StatusCode::NO_CONTENT);
    let cleared = set_cookie(&res);
    assert!(cleared.starts_with("jwt=;"));
    assert!(cleared.contains("Max-Age=0"));
    assert!(cleared.contains("Expires=Thu, 01 Jan 1970 00:00:00 GMT"));

    let res = app.send(get("/api/auth/logout", "10.0.7.1", None)).await;
    assert_status(&res, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_password_reset_flow() {
    let app = TestApp::new();
    app.seed_user("reset@example.com", "old-password", Role::User);

    let res = app
        .send(post_json(
            "/api/auth/forgot-password",
            "10.0.8.1",
            json!({ "email": "reset@example.com" }),
        ))
        .await;
    assert_status(&res, StatusCode::NO_CONTENT);
    let token = token_from_link(&app.mailer.reset.lock()[0].1);

    // An email-verify endpoint will not take a reset token.
    let res = app
        .send(get(&format!("/api/auth/verify-email?token={token}"), "10.0.8.2", None))
        .await;
    assert_status(&res, StatusCode::UNAUTHORIZED);

    let res = app
        .send(post_json(
            "/api/auth/reset-password",
            "10.0.8.3",
            json!({ "token": token, "new_password": "new-password" }),
        ))
        .await;
    assert_status(&res, StatusCode::NO_CONTENT);

    let res = app
        .send(post_json(
            "/api/auth/login",
            "10.0.8.4",
            json!({ "email": "reset@example.com", "password": "new-password" }),
        ))
        .await;
    assert_status(&res, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_forgot_password_unknown_email_sends_nothing() {
    let app = TestApp::new();
    let res = app
        .send(post_json(
            "/api/auth/forgot-password",
            "10.0.8.5",
            json!({ "email": "ghost@example.com" }),
        ))
        .await;
    assert_status(&res, StatusCode::NO_CONTENT);
    assert!(app.mailer.reset.lock().is_empty());
}

#[tokio::test]
async fn test_metrics_endpoint_reports_decisions() {
    let app = TestApp::new();
    app.send(get("/api/auth/me", "10.0.9.1", None)).await;

    let res = app.send(get("/metrics", "10.0.9.1", None)).await;
    assert_status(&res, StatusCode::OK);
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("auth_decisions_total"));
}

#[tokio::test]
async fn test_login_limit_keys_on_peer_address_without_proxy_headers() {
    let app = TestApp::new();
    let attempt = |peer: &str| {
        post_json_from_peer(
            "/api/auth/login",
            peer.parse().unwrap(),
            json!({ "email": "nobody@example.com", "password": "whatever1" }),
        )
    };

    assert_status(&app.send(attempt("192.0.2.10:40001")).await, StatusCode::UNAUTHORIZED);
    assert_status(&app.send(attempt("192.0.2.10:40002")).await, StatusCode::UNAUTHORIZED);

    // Same host from yet another source port still shares the bucket.
    assert_status(&app.send(attempt("192.0.2.10:40003")).await, StatusCode::TOO_MANY_REQUESTS);

    assert_status(&app.send(attempt("192.0.2.11:40001")).await, StatusCode::UNAUTHORIZED);
    assert_status(&app.send(attempt("[2001:db8::1]:40001")).await, StatusCode::UNAUTHORIZED);

    let buckets = app.state.limiters.login.len();
    assert_eq!(buckets, 3);
    assert!(app.state.limiters.login.get_or_create_bucket("192.0.2.10").available < 1.0);
}
