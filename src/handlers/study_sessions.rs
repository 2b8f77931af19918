// Study session handlers
// Resource operations plus detach and CSV export

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use tracing::info;

use crate::{
    auth::CurrentUser,
    error::ApiError,
    models::study_session::{CreateStudySessionRequest, UpdateStudySessionRequest},
    transfer, AppState,
};

/// List the requesting user's study sessions
/// GET /study-sessions
pub async fn get_all_sessions(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    let sessions = state.db.list_sessions(user.id).await?;

    info!(
        "Retrieved {} study sessions for user {}",
        sessions.len(),
        user.id
    );
    Ok((StatusCode::OK, Json(sessions)))
}

/// Create a study session with an optional initial word set
/// POST /study-sessions
pub async fn create_session(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(request): Json<CreateStudySessionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    info!("Creating study session for user {}", user.id);

    let detail = state.db.create_session(user.id, request).await?;

    Ok((StatusCode::CREATED, Json(detail)))
}

/// Show one session with its words in order
/// GET /study-sessions/:id
pub async fn get_session_by_id(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let detail = state.db.get_session(user.id, &session_id).await?;

    Ok((StatusCode::OK, Json(detail)))
}

/// Update session name and/or replace its word set
/// PUT /study-sessions/:id
pub async fn update_session(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(session_id): Path<String>,
    Json(request): Json<UpdateStudySessionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    info!("Updating study session {} for user {}", session_id, user.id);

    let detail = state.db.update_session(user.id, &session_id, request).await?;

    Ok((StatusCode::OK, Json(detail)))
}

/// Delete a session; its words and review history remain
/// DELETE /study-sessions/:id
pub async fn delete_session(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    info!("Deleting study session {} for user {}", session_id, user.id);

    state.db.delete_session(user.id, &session_id).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Remove one word from the session's word set
/// DELETE /study-sessions/:id/words/:word_id/detach
pub async fn detach_word(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path((session_id, word_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    state.db.detach_word(user.id, &session_id, &word_id).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Export one session's words as a CSV download
/// GET /study-sessions/:id/export-csv
pub async fn export_csv(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let (session, rows) = state
        .db
        .session_words_for_export(user.id, &session_id)
        .await?;

    let csv = transfer::export_session_csv(&rows)?;

    info!(
        "Exported {} words from study session {}",
        rows.len(),
        session.id
    );

    let headers = [
        (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"study-session-{}.csv\"", session.id),
        ),
    ];

    Ok((StatusCode::OK, headers, csv))
}
