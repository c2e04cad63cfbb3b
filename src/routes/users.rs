use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::{
    models::{auth::AuthenticatedUser, user::UserProfile},
    AppState,
};

use super::{api_error, ApiError};

/// GET /api/users: admin only (enforced by the route guard).
pub async fn list_users(State(state): State<AppState>) -> Json<Vec<UserProfile>> {
    Json(state.users.list().into_iter().map(UserProfile::from).collect())
}

/// DELETE /api/users/{id}: admin only.
pub async fn delete_user(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if id == user.user_id {
        return Err(api_error(StatusCode::BAD_REQUEST, "Cannot delete your own account"));
    }
    if !state.users.delete(id) {
        return Err(api_error(StatusCode::NOT_FOUND, "User not found"));
    }
    tracing::info!(admin_id = %user.user_id, deleted = %id, "user deleted");
    Ok(StatusCode::NO_CONTENT)
}
