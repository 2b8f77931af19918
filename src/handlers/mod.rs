// Handlers module
// HTTP handlers mapping routes to domain service calls

pub mod admin;
pub mod auth;
pub mod study;
pub mod study_sessions;
pub mod words;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Extension, Json};
use serde_json::json;

use crate::{auth::CurrentUser, error::ApiError, AppState};

/// Health check handler
/// Returns "OK" with 200 status for monitoring purposes
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Landing payload for the login flow; unauthenticated requests get
/// redirected here.
/// GET /login
pub async fn login_page() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "message": "Authentication required. POST /auth/login with email and password."
        })),
    )
}

/// Per-user summary shown after login
/// GET /dashboard
pub async fn dashboard(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    let summary = state
        .db
        .dashboard_summary(user.id, state.study.review_cooldown_days)
        .await?;

    Ok((StatusCode::OK, Json(summary)))
}
