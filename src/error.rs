use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Every way a request can be turned away by the auth core.
///
/// Responses carry only a generic message; the concrete cause of an
/// `InvalidToken` (expired, wrong purpose, bad signature) is logged, never sent.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("no session cookie")]
    Unauthenticated,
    #[error("invalid token")]
    InvalidToken,
    #[error("insufficient role")]
    Forbidden,
    #[error("rate limit exceeded")]
    RateLimited,
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("token signing failed: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::Unauthenticated | AuthError::InvalidToken => StatusCode::UNAUTHORIZED,
            AuthError::Forbidden => StatusCode::FORBIDDEN,
            AuthError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AuthError::Configuration(_) | AuthError::Signing(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn public_message(&self) -> &'static str {
        match self {
            AuthError::Unauthenticated | AuthError::InvalidToken => "Unauthorized",
            AuthError::Forbidden => "Forbidden",
            AuthError::RateLimited => "Too many requests",
            AuthError::Configuration(_) | AuthError::Signing(_) => "Internal server error",
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        if self.status().is_server_error() {
            tracing::error!(error = %self, "auth core failure");
        }
        (self.status(), Json(json!({ "error": self.public_message() }))).into_response()
    }
}
