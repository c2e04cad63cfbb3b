use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};

use crate::{
    error::AuthError,
    models::{
        auth::{AuthenticatedUser, SecurityRequirement, TokenType},
        user::Role,
    },
    services::{
        metrics,
        token::{TokenService, JWT_COOKIE_NAME},
    },
};

/// Handlers take `AuthenticatedUser` as an argument to read the identity bound
/// by `require_auth`. Missing identity means the route was not guarded.
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .copied()
            .ok_or(AuthError::Unauthenticated)
    }
}

/// Security configuration for one route, fixed at registration time.
#[derive(Clone)]
pub struct RouteGuard {
    tokens: Arc<TokenService>,
    requirement: Option<SecurityRequirement>,
}

impl RouteGuard {
    pub fn new(tokens: Arc<TokenService>, requirement: Option<SecurityRequirement>) -> Self {
        Self { tokens, requirement }
    }

    pub fn public(tokens: Arc<TokenService>) -> Self {
        Self::new(tokens, None)
    }

    pub fn authenticated(tokens: Arc<TokenService>) -> Self {
        Self::new(tokens, Some(SecurityRequirement::authenticated()))
    }

    pub fn roles(tokens: Arc<TokenService>, roles: impl IntoIterator<Item = Role>) -> Self {
        Self::new(tokens, Some(SecurityRequirement::any_of(roles)))
    }

    pub fn requirement(&self) -> Option<&SecurityRequirement> {
        self.requirement.as_ref()
    }

    /// The per-request decision. `Ok(None)` lets an unguarded request through
    /// untouched; `Ok(Some(_))` carries the identity to bind.
    pub fn decide(&self, headers: &HeaderMap) -> Result<Option<AuthenticatedUser>, AuthError> {
        let Some(requirement) = &self.requirement else {
            return Ok(None);
        };

        let Some(token) = read_cookie(headers, JWT_COOKIE_NAME).filter(|v| !v.is_empty()) else {
            metrics::record_decision("unauthenticated");
            return Err(AuthError::Unauthenticated);
        };

        let claims = self.tokens.verify(token, TokenType::Access).inspect_err(|_| {
            metrics::record_decision("invalid_token");
        })?;
        let user = AuthenticatedUser::from(&claims);

        if !requirement.permits(user.role) {
            tracing::warn!(
                user_id = %user.user_id,
                role = %user.role,
                required = ?requirement.roles(),
                "role not permitted on route"
            );
            metrics::record_decision("forbidden");
            return Err(AuthError::Forbidden);
        }

        metrics::record_decision("allowed");
        Ok(Some(user))
    }
}

/// Authorization stage. Attach with
/// `route_layer(from_fn_with_state(RouteGuard::roles(..), require_auth))`.
pub async fn require_auth(
    State(guard): State<RouteGuard>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    if let Some(user) = guard.decide(request.headers())? {
        request.extensions_mut().insert(user);
    }
    Ok(next.run(request).await)
}

/// Extract a named cookie value from request headers.
pub fn read_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .find_map(|part| {
            let (k, v) = part.trim().split_once('=')?;
            (k == name).then_some(v.trim())
        })
}
