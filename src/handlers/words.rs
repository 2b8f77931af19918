// Word handlers
// HTTP handlers for word management operations

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use tracing::info;

use crate::{
    auth::CurrentUser,
    db::ImportOutcome,
    error::ApiError,
    models::word::{CreateWordRequest, RecordStudyRequest, SaveNotesRequest, UpdateWordRequest},
    transfer::{self, ImportReport, SkippedRow},
    AppState,
};

/// List the requesting user's words
/// GET /words
pub async fn get_all_words(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    let words = state.db.list_words(user.id).await?;

    info!("Retrieved {} words for user {}", words.len(), user.id);
    Ok((StatusCode::OK, Json(words)))
}

/// Create a new word
/// POST /words
pub async fn create_word(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(request): Json<CreateWordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    info!("Creating new word for user {}", user.id);

    let word = state.db.create_word(user.id, request).await?;

    Ok((StatusCode::CREATED, Json(word)))
}

/// Get one word for editing
/// GET /words/:id
pub async fn get_word_by_id(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(word_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let word = state.db.get_word(user.id, &word_id).await?;

    Ok((StatusCode::OK, Json(word)))
}

/// Full update of text, notes and the tag set
/// PUT /words/:id
pub async fn update_word(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(word_id): Path<String>,
    Json(request): Json<UpdateWordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    info!("Updating word {} for user {}", word_id, user.id);

    let word = state.db.update_word(user.id, &word_id, request).await?;

    Ok((StatusCode::OK, Json(word)))
}

/// Delete a word
/// DELETE /words/:id
pub async fn delete_word(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(word_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    info!("Deleting word {} for user {}", word_id, user.id);

    state.db.delete_word(user.id, &word_id).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Partial update of the notes field only
/// POST /words/:id/save-notes
pub async fn save_notes(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(word_id): Path<String>,
    Json(request): Json<SaveNotesRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let word = state.db.save_notes(user.id, &word_id, request).await?;

    Ok((StatusCode::OK, Json(word)))
}

/// Append a review record for a word
/// POST /words/:id/record-study
pub async fn record_study(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(word_id): Path<String>,
    Json(request): Json<RecordStudyRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let record = state.db.record_study(user.id, &word_id, request).await?;

    Ok((StatusCode::CREATED, Json(record)))
}

/// Bulk import words from an uploaded CSV body
/// POST /words/import-csv
pub async fn import_csv(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let (rows, mut skipped) = transfer::parse_import_csv(&body)?;
    info!(
        "Importing {} CSV rows for user {} ({} skipped by parser)",
        rows.len(),
        user.id,
        skipped.len()
    );

    let mut created = 0;
    let mut updated = 0;

    for row in rows {
        let result = state
            .db
            .upsert_imported_word(user.id, &row.text, row.notes.as_deref(), &row.tags)
            .await;

        match result {
            Ok(ImportOutcome::Created) => created += 1,
            Ok(ImportOutcome::Updated) => updated += 1,
            // Row-level problems are reported, not fatal to the batch
            Err(ApiError::Validation(reason)) | Err(ApiError::Conflict(reason)) => {
                skipped.push(SkippedRow {
                    line: row.line,
                    reason,
                });
            }
            Err(other) => return Err(other),
        }
    }

    skipped.sort_by_key(|row| row.line);

    info!(
        "CSV import for user {} finished: {} created, {} updated, {} skipped",
        user.id,
        created,
        updated,
        skipped.len()
    );

    Ok((
        StatusCode::OK,
        Json(ImportReport {
            created,
            updated,
            skipped,
        }),
    ))
}
