// Study handlers
// Review queues for the automatic and per-session study flows

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use tracing::info;

use crate::{auth::CurrentUser, error::ApiError, AppState};

/// Auto-selected review queue across all of the user's words
/// GET /study
pub async fn auto_review_index(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    let words = state
        .db
        .auto_review_queue(
            user.id,
            state.study.review_cooldown_days,
            state.study.review_queue_limit,
        )
        .await?;

    info!(
        "Auto review queue for user {} has {} words",
        user.id,
        words.len()
    );
    Ok((StatusCode::OK, Json(words)))
}

/// Words of one session still needing review, in session order
/// GET /study-sessions/:id/review
pub async fn session_review(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let words = state.db.session_review_queue(user.id, &session_id).await?;

    info!(
        "Session {} review queue has {} words",
        session_id,
        words.len()
    );
    Ok((StatusCode::OK, Json(words)))
}
