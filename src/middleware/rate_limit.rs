use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::{error::AuthError, middleware::client_ip::client_ip_of, services::rate_limiter::RateLimiterRegistry};

/// Route-level gate: one token per request from the caller's bucket, 429 once
/// the bucket is empty. Runs before authentication, whatever its outcome.
///
/// Attach with `route_layer(from_fn_with_state(limiter, rate_limit))`.
pub async fn rate_limit(
    State(limiter): State<Arc<RateLimiterRegistry>>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let key = client_ip_of(&request);

    if !limiter.allow(&key) {
        tracing::warn!(limiter = limiter.name(), client = %key, "rate limit exceeded");
        return Err(AuthError::RateLimited);
    }

    Ok(next.run(request).await)
}
