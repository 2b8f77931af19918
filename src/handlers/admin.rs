// Admin handlers
// User management, reachable only behind the auth + admin gates.
// No additional authorization happens here.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use tracing::info;

use crate::{error::ApiError, models::user::AdminUpdateUserRequest, AppState};

/// List all users
/// GET /admin/users
pub async fn get_all_users(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let users = state.db.get_all_users().await?;

    info!("Retrieved {} users", users.len());
    Ok((StatusCode::OK, Json(users)))
}

/// Show one user for editing
/// GET /admin/users/:id
pub async fn get_user_by_id(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state.db.get_user_by_id(&user_id).await?;

    Ok((StatusCode::OK, Json(user)))
}

/// Update profile fields and/or role
/// PATCH /admin/users/:id
pub async fn update_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(request): Json<AdminUpdateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    info!("Admin updating user {}", user_id);

    let user = state.db.admin_update_user(&user_id, request).await?;

    Ok((StatusCode::OK, Json(user)))
}

/// Delete a user and their study history
/// DELETE /admin/users/:id
pub async fn delete_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    info!("Admin deleting user {}", user_id);

    state.db.delete_user(&user_id).await?;

    Ok(StatusCode::NO_CONTENT)
}
