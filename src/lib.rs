// Library exports for the binaries and tests
pub mod config;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use std::sync::Arc;

use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, post},
    Router,
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use middleware::{
    auth::{require_auth, RouteGuard},
    client_ip::resolve_client,
    rate_limit::rate_limit,
};
use models::user::Role;
use services::{
    mail::Mailer,
    rate_limiter::RateLimiterRegistry,
    token::TokenService,
    users::UserDirectory,
};

/// One registry per gated endpoint family, so login attempts never spend the
/// verification budget and vice versa.
#[derive(Clone)]
pub struct RateLimiters {
    pub login: Arc<RateLimiterRegistry>,
    pub verify: Arc<RateLimiterRegistry>,
}

impl RateLimiters {
    pub fn from_config(config: &Config) -> Self {
        Self {
            login: Arc::new(RateLimiterRegistry::new("login", config.login_rate, config.rate_limit_idle)),
            verify: Arc::new(RateLimiterRegistry::new("verify", config.verify_rate, config.rate_limit_idle)),
        }
    }

    pub fn all(&self) -> [&Arc<RateLimiterRegistry>; 2] {
        [&self.login, &self.verify]
    }
}

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub tokens: Arc<TokenService>,
    pub users: Arc<dyn UserDirectory>,
    pub mailer: Arc<dyn Mailer>,
    pub limiters: RateLimiters,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        tokens: Arc<TokenService>,
        users: Arc<dyn UserDirectory>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        let limiters = RateLimiters::from_config(&config);
        Self { config, tokens, users, mailer, limiters }
    }
}

fn cors(config: &Config) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            header::ACCEPT,
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static("x-csrf-token"),
        ])
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .max_age(std::time::Duration::from_secs(300))
}

/// Request pipeline: client ip → rate limit (gated routes) → auth guard
/// (secured routes) → handler.
pub fn build_router(state: AppState) -> Router {
    let authenticated = RouteGuard::authenticated(state.tokens.clone());
    let admin = RouteGuard::roles(state.tokens.clone(), [Role::Admin]);
    let login_limit = state.limiters.login.clone();
    let verify_limit = state.limiters.verify.clone();

    Router::new()
        .route("/api/ping", get(routes::health::ping))
        .route("/metrics", get(routes::metrics::metrics_handler))
        // Auth
        .route("/api/auth/register", post(routes::auth::register))
        .route(
            "/api/auth/login",
            post(routes::auth::login)
                .route_layer(from_fn_with_state(login_limit.clone(), rate_limit)),
        )
        .route(
            "/api/auth/forgot-password",
            post(routes::auth::forgot_password)
                .route_layer(from_fn_with_state(login_limit, rate_limit)),
        )
        .route(
            "/api/auth/verify-email",
            get(routes::auth::verify_email)
                .route_layer(from_fn_with_state(verify_limit.clone(), rate_limit)),
        )
        .route(
            "/api/auth/reset-password",
            post(routes::auth::reset_password)
                .route_layer(from_fn_with_state(verify_limit, rate_limit)),
        )
        .route(
            "/api/auth/me",
            get(routes::auth::me)
                .route_layer(from_fn_with_state(authenticated.clone(), require_auth)),
        )
        .route(
            "/api/auth/logout",
            get(routes::auth::logout)
                .route_layer(from_fn_with_state(authenticated, require_auth)),
        )
        // Users (admin)
        .route(
            "/api/users",
            get(routes::users::list_users)
                .route_layer(from_fn_with_state(admin.clone(), require_auth)),
        )
        .route(
            "/api/users/{id}",
            delete(routes::users::delete_user)
                .route_layer(from_fn_with_state(admin, require_auth)),
        )
        .layer(from_fn(resolve_client))
        .layer(TraceLayer::new_for_http())
        .layer(cors(&state.config))
        .with_state(state)
}
