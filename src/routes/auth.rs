use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde_json::{json, Value};

use crate::{
    error::AuthError,
    models::{
        auth::{AuthenticatedUser, TokenType},
        user::{
            ForgotPasswordRequest, LoginRequest, RegisterRequest, ResetPasswordRequest, Role,
            UserProfile, VerifyEmailQuery,
        },
    },
    services::{mail::render_link, users::DirectoryError},
    AppState,
};

use super::{api_error, auth_error, ApiError};

const MIN_PASSWORD_LEN: usize = 8;

fn validate_credentials(email: &str, password: &str) -> Result<(), ApiError> {
    let email = email.trim();
    if email.len() < 3 || !email.contains('@') {
        return Err(api_error(StatusCode::BAD_REQUEST, "Invalid email address"));
    }
    validate_password(password)
}

fn validate_password(password: &str) -> Result<(), ApiError> {
    if password.len() < MIN_PASSWORD_LEN {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "Password must be at least 8 characters",
        ));
    }
    Ok(())
}

fn hash_password(password: &str, cost: u32) -> Result<String, ApiError> {
    bcrypt::hash(password, cost).map_err(|e| {
        tracing::error!(error = %e, "password hashing failed");
        api_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
    })
}

/// POST /api/auth/register: creates the account and mails an email-verify link.
pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_credentials(&body.email, &body.password)?;

    let hash = hash_password(&body.password, state.config.bcrypt_cost)?;
    let user = state
        .users
        .create(&body.email, hash, Role::User)
        .map_err(|e: DirectoryError| api_error(StatusCode::CONFLICT, &e.to_string()))?;

    let token = state
        .tokens
        .issue(TokenType::EmailVerify, state.config.email_token_ttl, user.id, user.role)
        .map_err(auth_error)?;
    state
        .mailer
        .send_verification(&user.email, &render_link(&state.config.verify_url, &token));

    tracing::info!(user_id = %user.id, "user registered");
    Ok((StatusCode::CREATED, Json(json!({ "id": user.id }))))
}

/// POST /api/auth/login: sets the `jwt` session cookie on success.
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let wrong = || api_error(StatusCode::UNAUTHORIZED, "Wrong password or email");

    let user = state.users.find_by_email(&body.email).ok_or_else(wrong)?;
    let valid = bcrypt::verify(&body.password, &user.password_hash).map_err(|_| wrong())?;
    if !valid {
        return Err(wrong());
    }

    let cookie = state
        .tokens
        .issue_as_cookie(TokenType::Access, state.config.access_token_ttl, user.id, user.role)
        .map_err(auth_error)?;

    tracing::info!(user_id = %user.id, "login succeeded");
    Ok((StatusCode::NO_CONTENT, [(header::SET_COOKIE, cookie.to_string())]))
}

/// GET /api/auth/logout: clears the cookie; the token itself is not revoked.
pub async fn logout(State(state): State<AppState>, user: AuthenticatedUser) -> impl IntoResponse {
    tracing::info!(user_id = %user.user_id, "logout");
    (
        StatusCode::NO_CONTENT,
        [(header::SET_COOKIE, state.tokens.delete_cookie().to_string())],
    )
}

/// GET /api/auth/me
pub async fn me(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<UserProfile>, ApiError> {
    state
        .users
        .find_by_id(user.user_id)
        .map(|u| Json(u.into()))
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "User not found"))
}

/// GET /api/auth/verify-email?token=
pub async fn verify_email(
    State(state): State<AppState>,
    Query(query): Query<VerifyEmailQuery>,
) -> Result<Json<Value>, ApiError> {
    let claims = state
        .tokens
        .verify(&query.token, TokenType::EmailVerify)
        .map_err(auth_error)?;

    if !state.users.mark_verified(claims.sub) {
        return Err(auth_error(AuthError::InvalidToken));
    }

    tracing::info!(user_id = %claims.sub, "email verified");
    Ok(Json(json!({ "status": "verified" })))
}

/// POST /api/auth/forgot-password: 204 whether or not the email is registered.
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(body): Json<ForgotPasswordRequest>,
) -> Result<StatusCode, ApiError> {
    if let Some(user) = state.users.find_by_email(&body.email) {
        let token = state
            .tokens
            .issue(TokenType::PasswordReset, state.config.password_reset_ttl, user.id, user.role)
            .map_err(auth_error)?;
        state
            .mailer
            .send_password_reset(&user.email, &render_link(&state.config.reset_url, &token));
        tracing::info!(user_id = %user.id, "password reset requested");
    }
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/auth/reset-password
pub async fn reset_password(
    State(state): State<AppState>,
    Json(body): Json<ResetPasswordRequest>,
) -> Result<StatusCode, ApiError> {
    let claims = state
        .tokens
        .verify(&body.token, TokenType::PasswordReset)
        .map_err(auth_error)?;
    validate_password(&body.new_password)?;

    let hash = hash_password(&body.new_password, state.config.bcrypt_cost)?;
    if !state.users.set_password(claims.sub, hash) {
        return Err(auth_error(AuthError::InvalidToken));
    }

    tracing::info!(user_id = %claims.sub, "password reset");
    Ok(StatusCode::NO_CONTENT)
}
