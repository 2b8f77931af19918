// Auth handlers
// Token lifecycle around the access-control boundary

use axum::{extract::State, http::StatusCode, response::IntoResponse, Extension, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::{
    auth::{new_password_hash, verify_password, AuthToken},
    error::ApiError,
    models::user::{LoginRequest, RegisterRequest, User},
    AppState,
};

#[derive(Debug, Serialize)]
struct AuthResponse {
    user: User,
    token: Uuid,
    expires_at: DateTime<Utc>,
}

/// Create a member account and issue a session token
/// POST /auth/register
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    request.validate().map_err(ApiError::Validation)?;

    let name = request.get_normalized_name();
    let email = request.get_normalized_email();
    let password_hash = new_password_hash(&request.password);

    let user = state.db.create_user(&name, &email, &password_hash).await?;
    let (token, expires_at) = state
        .db
        .create_auth_session(user.id, state.study.session_ttl)
        .await?;

    info!("Registered user with id: {}", user.id);
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            user,
            token,
            expires_at,
        }),
    ))
}

/// Issue a session token for an existing account
/// POST /auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = request.email.trim().to_lowercase();

    let user = state.db.find_user_by_email(&email).await?;

    // Same error for unknown email and wrong password
    let user = match user {
        Some(user) if verify_password(&request.password, &user.password_hash) => user,
        _ => return Err(ApiError::validation("Invalid email or password")),
    };

    let (token, expires_at) = state
        .db
        .create_auth_session(user.id, state.study.session_ttl)
        .await?;

    info!("User {} logged in", user.id);
    Ok((
        StatusCode::OK,
        Json(AuthResponse {
            user,
            token,
            expires_at,
        }),
    ))
}

/// Revoke the current session token
/// DELETE /auth/logout
pub async fn logout(
    State(state): State<AppState>,
    Extension(AuthToken(token)): Extension<AuthToken>,
) -> Result<impl IntoResponse, ApiError> {
    state.db.delete_auth_session(token).await?;

    info!("Session token revoked");
    Ok(StatusCode::NO_CONTENT)
}
