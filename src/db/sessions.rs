use tokio_postgres::Row;
use tracing::info;
use uuid::Uuid;

use super::words::{row_to_word_with_tags, WORD_WITH_TAGS_COLUMNS, WORD_WITH_TAGS_JOINS};
use super::{parse_uuid, Database};
use crate::error::ApiError;
use crate::models::study_session::{
    CreateStudySessionRequest, StudySession, StudySessionDetail, StudySessionSummary,
    UpdateStudySessionRequest,
};
use crate::models::word::WordWithTags;
use crate::transfer::ExportWordRow;

const SESSION_COLUMNS: &str = "id, user_id, name, created_at, updated_at";

fn row_to_session(row: &Row) -> StudySession {
    StudySession {
        id: row.get(0),
        user_id: row.get(1),
        name: row.get(2),
        created_at: row.get(3),
        updated_at: row.get(4),
    }
}

/// セッションへ単語を position 付きで登録する。`word_ids` は重複除去済み前提。
async fn insert_session_words(
    tx: &deadpool_postgres::Transaction<'_>,
    session_id: Uuid,
    word_ids: &[Uuid],
) -> Result<(), ApiError> {
    for (position, word_id) in word_ids.iter().enumerate() {
        let position = position as i32;
        tx.execute(
            r#"
            INSERT INTO study_session_word (study_session_id, word_id, position)
            VALUES ($1, $2, $3)
            ON CONFLICT (study_session_id, word_id) DO UPDATE SET position = EXCLUDED.position
            "#,
            &[&session_id, &word_id, &position],
        )
        .await
        .map_err(ApiError::from)?;
    }

    Ok(())
}

/// 指定の単語がすべて該当ユーザー所有か検証する。
async fn verify_words_owned(
    tx: &deadpool_postgres::Transaction<'_>,
    user_id: Uuid,
    word_ids: &[Uuid],
) -> Result<(), ApiError> {
    if word_ids.is_empty() {
        return Ok(());
    }

    let row = tx
        .query_one(
            "SELECT COUNT(*) FROM words WHERE id = ANY($1) AND user_id = $2",
            &[&word_ids, &user_id],
        )
        .await
        .map_err(ApiError::from)?;

    let owned: i64 = row.get(0);
    if owned != word_ids.len() as i64 {
        return Err(ApiError::Validation(
            "One or more words do not exist".to_string(),
        ));
    }

    Ok(())
}

impl Database {
    /// セッション一覧 (所属単語数付き)。
    pub async fn list_sessions(&self, user_id: Uuid) -> Result<Vec<StudySessionSummary>, ApiError> {
        let client = self.get_connection().await?;

        let query = r#"
            SELECT s.id, s.user_id, s.name, s.created_at, s.updated_at,
                   COUNT(ssw.word_id) AS word_count
            FROM study_sessions s
            LEFT JOIN study_session_word ssw ON ssw.study_session_id = s.id
            WHERE s.user_id = $1
            GROUP BY s.id, s.user_id, s.name, s.created_at, s.updated_at
            ORDER BY s.created_at DESC
        "#;

        let rows = client
            .query(query, &[&user_id])
            .await
            .map_err(ApiError::from)?;

        let sessions = rows
            .iter()
            .map(|row| StudySessionSummary {
                id: row.get(0),
                user_id: row.get(1),
                name: row.get(2),
                created_at: row.get(3),
                updated_at: row.get(4),
                word_count: row.get(5),
            })
            .collect();

        Ok(sessions)
    }

    /// セッション作成。本体と単語集合を 1 トランザクションで登録する。
    pub async fn create_session(
        &self,
        user_id: Uuid,
        request: CreateStudySessionRequest,
    ) -> Result<StudySessionDetail, ApiError> {
        request.validate().map_err(ApiError::Validation)?;

        let name = request.get_normalized_name();
        let word_ids = request.get_word_ids();

        let mut client = self.get_connection().await?;
        let tx = client.transaction().await.map_err(ApiError::from)?;

        verify_words_owned(&tx, user_id, &word_ids).await?;

        let query = format!(
            "INSERT INTO study_sessions (user_id, name) VALUES ($1, $2) RETURNING {}",
            SESSION_COLUMNS
        );

        let row = tx
            .query_one(&query, &[&user_id, &name])
            .await
            .map_err(ApiError::from)?;
        let session = row_to_session(&row);

        insert_session_words(&tx, session.id, &word_ids).await?;
        tx.commit().await.map_err(ApiError::from)?;

        info!("Created study session with id: {}", session.id);

        let words = self.session_words(&client, session.id).await?;
        Ok(StudySessionDetail { session, words })
    }

    /// セッション詳細 (position 順の単語リスト付き)。
    pub async fn get_session(
        &self,
        user_id: Uuid,
        session_id: &str,
    ) -> Result<StudySessionDetail, ApiError> {
        let uuid = parse_uuid(session_id, "study session ID")?;
        let client = self.get_connection().await?;

        let session = self
            .find_session(&client, user_id, uuid)
            .await?
            .ok_or_else(|| {
                ApiError::NotFound(format!("Study session with id {}", session_id))
            })?;

        let words = self.session_words(&client, session.id).await?;
        Ok(StudySessionDetail { session, words })
    }

    /// セッション更新。`word_ids` が来たときだけ単語集合を丸ごと差し替える。
    pub async fn update_session(
        &self,
        user_id: Uuid,
        session_id: &str,
        request: UpdateStudySessionRequest,
    ) -> Result<StudySessionDetail, ApiError> {
        request.validate().map_err(ApiError::Validation)?;

        let uuid = parse_uuid(session_id, "study session ID")?;
        let name = request.get_normalized_name();
        let word_ids = request.get_word_ids();

        let mut client = self.get_connection().await?;
        let tx = client.transaction().await.map_err(ApiError::from)?;

        let rows_affected = match name {
            Some(ref name) => tx
                .execute(
                    r#"
                    UPDATE study_sessions SET name = $1, updated_at = NOW()
                    WHERE id = $2 AND user_id = $3
                    "#,
                    &[name, &uuid, &user_id],
                )
                .await
                .map_err(ApiError::from)?,
            None => tx
                .execute(
                    "UPDATE study_sessions SET updated_at = NOW() WHERE id = $1 AND user_id = $2",
                    &[&uuid, &user_id],
                )
                .await
                .map_err(ApiError::from)?,
        };

        if rows_affected == 0 {
            return Err(ApiError::NotFound(format!(
                "Study session with id {}",
                session_id
            )));
        }

        if let Some(ref word_ids) = word_ids {
            verify_words_owned(&tx, user_id, word_ids).await?;

            tx.execute(
                "DELETE FROM study_session_word WHERE study_session_id = $1",
                &[&uuid],
            )
            .await
            .map_err(ApiError::from)?;

            insert_session_words(&tx, uuid, word_ids).await?;
        }

        tx.commit().await.map_err(ApiError::from)?;

        info!("Updated study session with id: {}", session_id);

        let session = self
            .find_session(&client, user_id, uuid)
            .await?
            .ok_or_else(|| {
                ApiError::NotFound(format!("Study session with id {}", session_id))
            })?;
        let words = self.session_words(&client, uuid).await?;
        Ok(StudySessionDetail { session, words })
    }

    /// セッション削除。所属関係は CASCADE、単語本体とレビュー履歴は残る。
    pub async fn delete_session(&self, user_id: Uuid, session_id: &str) -> Result<(), ApiError> {
        let uuid = parse_uuid(session_id, "study session ID")?;
        let client = self.get_connection().await?;

        let rows_affected = client
            .execute(
                "DELETE FROM study_sessions WHERE id = $1 AND user_id = $2",
                &[&uuid, &user_id],
            )
            .await
            .map_err(ApiError::from)?;

        if rows_affected == 0 {
            Err(ApiError::NotFound(format!(
                "Study session with id {}",
                session_id
            )))
        } else {
            info!("Deleted study session with id: {}", session_id);
            Ok(())
        }
    }

    /// セッションから単語 1 件を外す。単語もセッションも削除しない。
    /// 所属していない単語 (2 回目の detach を含む) は NotFound。
    pub async fn detach_word(
        &self,
        user_id: Uuid,
        session_id: &str,
        word_id: &str,
    ) -> Result<(), ApiError> {
        let session_uuid = parse_uuid(session_id, "study session ID")?;
        let word_uuid = parse_uuid(word_id, "word ID")?;

        let client = self.get_connection().await?;

        let session = self.find_session(&client, user_id, session_uuid).await?;
        if session.is_none() {
            return Err(ApiError::NotFound(format!(
                "Study session with id {}",
                session_id
            )));
        }

        let rows_affected = client
            .execute(
                "DELETE FROM study_session_word WHERE study_session_id = $1 AND word_id = $2",
                &[&session_uuid, &word_uuid],
            )
            .await
            .map_err(ApiError::from)?;

        if rows_affected == 0 {
            Err(ApiError::NotFound(format!(
                "Word with id {} in study session",
                word_id
            )))
        } else {
            info!(
                "Detached word {} from study session {}",
                word_id, session_id
            );
            Ok(())
        }
    }

    /// 自動復習キュー。未レビュー → 直近失敗 → クールダウン超過の順で選ぶ。
    pub async fn auto_review_queue(
        &self,
        user_id: Uuid,
        review_cooldown_days: i64,
        limit: i64,
    ) -> Result<Vec<WordWithTags>, ApiError> {
        let client = self.get_connection().await?;
        let cooldown = review_cooldown_days as i32;

        let query = format!(
            r#"
            SELECT {} FROM words w {}
            WHERE w.user_id = $1
              AND (
                  last.reviewed_at IS NULL
                  OR last.passed = FALSE
                  OR last.reviewed_at < NOW() - make_interval(days => $2)
              )
            ORDER BY last.reviewed_at ASC NULLS FIRST, w.created_at ASC
            LIMIT $3
            "#,
            WORD_WITH_TAGS_COLUMNS, WORD_WITH_TAGS_JOINS
        );

        let rows = client
            .query(&query, &[&user_id, &cooldown, &limit])
            .await
            .map_err(ApiError::from)?;

        Ok(rows.iter().map(row_to_word_with_tags).collect())
    }

    /// セッション内でまだ合格していない単語を position 順で返す。
    pub async fn session_review_queue(
        &self,
        user_id: Uuid,
        session_id: &str,
    ) -> Result<Vec<WordWithTags>, ApiError> {
        let uuid = parse_uuid(session_id, "study session ID")?;
        let client = self.get_connection().await?;

        let session = self.find_session(&client, user_id, uuid).await?;
        if session.is_none() {
            return Err(ApiError::NotFound(format!(
                "Study session with id {}",
                session_id
            )));
        }

        let query = format!(
            r#"
            SELECT {} FROM study_session_word ssw
            JOIN words w ON w.id = ssw.word_id
            {}
            WHERE ssw.study_session_id = $1
              AND NOT EXISTS (
                  SELECT 1 FROM review_records r
                  WHERE r.word_id = w.id
                    AND r.study_session_id = $1
                    AND r.passed = TRUE
              )
            ORDER BY ssw.position ASC
            "#,
            WORD_WITH_TAGS_COLUMNS, WORD_WITH_TAGS_JOINS
        );

        let rows = client
            .query(&query, &[&uuid])
            .await
            .map_err(ApiError::from)?;

        Ok(rows.iter().map(row_to_word_with_tags).collect())
    }

    /// CSV エクスポート用の行を position 順で返す。レビュー結果はセッション内の直近のもの。
    pub async fn session_words_for_export(
        &self,
        user_id: Uuid,
        session_id: &str,
    ) -> Result<(StudySession, Vec<ExportWordRow>), ApiError> {
        let uuid = parse_uuid(session_id, "study session ID")?;
        let client = self.get_connection().await?;

        let session = self
            .find_session(&client, user_id, uuid)
            .await?
            .ok_or_else(|| {
                ApiError::NotFound(format!("Study session with id {}", session_id))
            })?;

        let query = r#"
            SELECT w.text, w.notes,
                   COALESCE(t.tags, ARRAY[]::VARCHAR[]) AS tags,
                   last.passed, last.reviewed_at
            FROM study_session_word ssw
            JOIN words w ON w.id = ssw.word_id
            LEFT JOIN (
                SELECT wt.word_id, ARRAY_AGG(tg.name ORDER BY tg.name) AS tags
                FROM word_tag wt
                JOIN tags tg ON tg.id = wt.tag_id
                GROUP BY wt.word_id
            ) t ON t.word_id = w.id
            LEFT JOIN LATERAL (
                SELECT r.passed, r.reviewed_at
                FROM review_records r
                WHERE r.word_id = w.id AND r.study_session_id = ssw.study_session_id
                ORDER BY r.reviewed_at DESC
                LIMIT 1
            ) last ON TRUE
            WHERE ssw.study_session_id = $1
            ORDER BY ssw.position ASC
        "#;

        let rows = client
            .query(query, &[&uuid])
            .await
            .map_err(ApiError::from)?;

        let export_rows = rows
            .iter()
            .map(|row| ExportWordRow {
                text: row.get(0),
                notes: row.get(1),
                tags: row.get(2),
                last_passed: row.get(3),
                last_reviewed_at: row.get(4),
            })
            .collect();

        Ok((session, export_rows))
    }

    /// セッションの全単語を position 順で返す (内部ヘルパー)。
    async fn session_words(
        &self,
        client: &tokio_postgres::Client,
        session_id: Uuid,
    ) -> Result<Vec<WordWithTags>, ApiError> {
        let query = format!(
            r#"
            SELECT {} FROM study_session_word ssw
            JOIN words w ON w.id = ssw.word_id
            {}
            WHERE ssw.study_session_id = $1
            ORDER BY ssw.position ASC
            "#,
            WORD_WITH_TAGS_COLUMNS, WORD_WITH_TAGS_JOINS
        );

        let rows = client
            .query(&query, &[&session_id])
            .await
            .map_err(ApiError::from)?;

        Ok(rows.iter().map(row_to_word_with_tags).collect())
    }

    /// 所有チェック込みのセッション取得 (内部ヘルパー)。
    async fn find_session(
        &self,
        client: &tokio_postgres::Client,
        user_id: Uuid,
        session_id: Uuid,
    ) -> Result<Option<StudySession>, ApiError> {
        let query = format!(
            "SELECT {} FROM study_sessions WHERE id = $1 AND user_id = $2",
            SESSION_COLUMNS
        );

        let row = client
            .query_opt(&query, &[&session_id, &user_id])
            .await
            .map_err(ApiError::from)?;

        Ok(row.map(|r| row_to_session(&r)))
    }
}
