pub mod auth;
pub mod health;
pub mod metrics;
pub mod users;

use axum::{http::StatusCode, Json};
use serde_json::{json, Value};

use crate::error::AuthError;

pub type ApiError = (StatusCode, Json<Value>);

pub fn api_error(status: StatusCode, message: &str) -> ApiError {
    (status, Json(json!({ "error": message })))
}

/// Same body the middleware would produce; the underlying cause stays server-side.
pub fn auth_error(e: AuthError) -> ApiError {
    if e.status().is_server_error() {
        tracing::error!(error = %e, "auth core failure");
    }
    api_error(e.status(), e.public_message())
}
