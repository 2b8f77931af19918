use tokio_postgres::Row;
use tracing::info;
use uuid::Uuid;

use super::{parse_uuid, Database};
use crate::error::ApiError;
use crate::models::review::ReviewRecord;
use crate::models::word::{
    CreateWordRequest, RecordStudyRequest, SaveNotesRequest, UpdateWordRequest, WordWithTags,
};

/// 単語 1 行ぶんの SELECT 列。タグ配列と直近レビューの LATERAL を含む。
pub(crate) const WORD_WITH_TAGS_COLUMNS: &str = r#"
    w.id, w.user_id, w.text, w.notes, w.created_at, w.updated_at,
    COALESCE(t.tags, ARRAY[]::VARCHAR[]) AS tags,
    last.passed, last.reviewed_at
"#;

/// タグと直近レビューを引っ掛ける JOIN 句。WHERE / ORDER は呼び出し側で付ける。
pub(crate) const WORD_WITH_TAGS_JOINS: &str = r#"
    LEFT JOIN (
        SELECT wt.word_id, ARRAY_AGG(tg.name ORDER BY tg.name) AS tags
        FROM word_tag wt
        JOIN tags tg ON tg.id = wt.tag_id
        GROUP BY wt.word_id
    ) t ON t.word_id = w.id
    LEFT JOIN LATERAL (
        SELECT r.passed, r.reviewed_at
        FROM review_records r
        WHERE r.word_id = w.id
        ORDER BY r.reviewed_at DESC
        LIMIT 1
    ) last ON TRUE
"#;

pub(crate) fn row_to_word_with_tags(row: &Row) -> WordWithTags {
    WordWithTags {
        id: row.get(0),
        user_id: row.get(1),
        text: row.get(2),
        notes: row.get(3),
        created_at: row.get(4),
        updated_at: row.get(5),
        tags: row.get(6),
        last_passed: row.get(7),
        last_reviewed_at: row.get(8),
    }
}

/// タグ名から ID を取得、無ければ作る。既存名との競合は no-op 扱い。
pub(crate) async fn upsert_tag(
    tx: &deadpool_postgres::Transaction<'_>,
    name: &str,
) -> Result<Uuid, ApiError> {
    let row = tx
        .query_one(
            r#"
            INSERT INTO tags (name) VALUES ($1)
            ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
            RETURNING id
            "#,
            &[&name],
        )
        .await
        .map_err(ApiError::from)?;

    Ok(row.get(0))
}

/// 単語にタグ集合を関連付ける。既に付いているタグは `ON CONFLICT DO NOTHING`。
pub(crate) async fn attach_tags(
    tx: &deadpool_postgres::Transaction<'_>,
    word_id: Uuid,
    tags: &[String],
) -> Result<(), ApiError> {
    for name in tags {
        let tag_id = upsert_tag(tx, name).await?;
        tx.execute(
            "INSERT INTO word_tag (word_id, tag_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            &[&word_id, &tag_id],
        )
        .await
        .map_err(ApiError::from)?;
    }

    Ok(())
}

/// CSV インポート 1 行の適用結果。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportOutcome {
    Created,
    Updated,
}

impl Database {
    /// 自分の単語を登録日時降順で列挙する。
    pub async fn list_words(&self, user_id: Uuid) -> Result<Vec<WordWithTags>, ApiError> {
        let client = self.get_connection().await?;

        let query = format!(
            "SELECT {} FROM words w {} WHERE w.user_id = $1 ORDER BY w.created_at DESC",
            WORD_WITH_TAGS_COLUMNS, WORD_WITH_TAGS_JOINS
        );

        let rows = client
            .query(&query, &[&user_id])
            .await
            .map_err(ApiError::from)?;

        Ok(rows.iter().map(row_to_word_with_tags).collect())
    }

    /// 単語 1 件を取得する。他ユーザーの単語は存在しないものとして扱う。
    pub async fn get_word(&self, user_id: Uuid, word_id: &str) -> Result<WordWithTags, ApiError> {
        let uuid = parse_uuid(word_id, "word ID")?;
        let client = self.get_connection().await?;

        self.fetch_word_with_tags(&client, user_id, uuid)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Word with id {}", word_id)))
    }

    /// 単語作成。本体 INSERT とタグ関連付けを 1 トランザクションで行う。
    pub async fn create_word(
        &self,
        user_id: Uuid,
        request: CreateWordRequest,
    ) -> Result<WordWithTags, ApiError> {
        request.validate().map_err(ApiError::Validation)?;

        let text = request.get_normalized_text();
        let notes = request.get_normalized_notes();
        let tags = request.get_normalized_tags();

        let mut client = self.get_connection().await?;
        let tx = client.transaction().await.map_err(ApiError::from)?;

        let row = tx
            .query_one(
                "INSERT INTO words (user_id, text, notes) VALUES ($1, $2, $3) RETURNING id",
                &[&user_id, &text, &notes],
            )
            .await
            .map_err(ApiError::from)?;
        let word_id: Uuid = row.get(0);

        attach_tags(&tx, word_id, &tags).await?;
        tx.commit().await.map_err(ApiError::from)?;

        info!("Created word with id: {}", word_id);

        self.fetch_word_with_tags(&client, user_id, word_id)
            .await?
            .ok_or_else(|| ApiError::Database("Word vanished after insert".to_string()))
    }

    /// 全置換の更新。テキスト・ノート・タグ集合を同一トランザクションで差し替え、
    /// 同時編集による lost update を避ける。
    pub async fn update_word(
        &self,
        user_id: Uuid,
        word_id: &str,
        request: UpdateWordRequest,
    ) -> Result<WordWithTags, ApiError> {
        request.validate().map_err(ApiError::Validation)?;

        let uuid = parse_uuid(word_id, "word ID")?;
        let text = request.get_normalized_text();
        let notes = request.get_normalized_notes();
        let tags = request.get_normalized_tags();

        let mut client = self.get_connection().await?;
        let tx = client.transaction().await.map_err(ApiError::from)?;

        let rows_affected = tx
            .execute(
                r#"
                UPDATE words SET text = $1, notes = $2, updated_at = NOW()
                WHERE id = $3 AND user_id = $4
                "#,
                &[&text, &notes, &uuid, &user_id],
            )
            .await
            .map_err(ApiError::from)?;

        if rows_affected == 0 {
            return Err(ApiError::NotFound(format!("Word with id {}", word_id)));
        }

        // Full replace of the tag set: drop existing links, attach the new set
        tx.execute("DELETE FROM word_tag WHERE word_id = $1", &[&uuid])
            .await
            .map_err(ApiError::from)?;
        attach_tags(&tx, uuid, &tags).await?;

        tx.commit().await.map_err(ApiError::from)?;

        info!("Updated word with id: {}", word_id);

        self.fetch_word_with_tags(&client, user_id, uuid)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Word with id {}", word_id)))
    }

    /// ノートだけの部分更新 (専用エンドポイント)。
    pub async fn save_notes(
        &self,
        user_id: Uuid,
        word_id: &str,
        request: SaveNotesRequest,
    ) -> Result<WordWithTags, ApiError> {
        request.validate().map_err(ApiError::Validation)?;

        let uuid = parse_uuid(word_id, "word ID")?;
        let notes = request.get_normalized_notes();

        let client = self.get_connection().await?;

        let rows_affected = client
            .execute(
                "UPDATE words SET notes = $1, updated_at = NOW() WHERE id = $2 AND user_id = $3",
                &[&notes, &uuid, &user_id],
            )
            .await
            .map_err(ApiError::from)?;

        if rows_affected == 0 {
            return Err(ApiError::NotFound(format!("Word with id {}", word_id)));
        }

        self.fetch_word_with_tags(&client, user_id, uuid)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Word with id {}", word_id)))
    }

    /// 単語削除。word_tag / review_records は CASCADE、タグ本体は残る。
    pub async fn delete_word(&self, user_id: Uuid, word_id: &str) -> Result<(), ApiError> {
        let uuid = parse_uuid(word_id, "word ID")?;
        let client = self.get_connection().await?;

        let rows_affected = client
            .execute(
                "DELETE FROM words WHERE id = $1 AND user_id = $2",
                &[&uuid, &user_id],
            )
            .await
            .map_err(ApiError::from)?;

        if rows_affected == 0 {
            Err(ApiError::NotFound(format!("Word with id {}", word_id)))
        } else {
            info!("Deleted word with id: {}", word_id);
            Ok(())
        }
    }

    /// 学習イベントを 1 件追記する。単語行そのものは一切変更しない。
    /// セッション ID が渡された場合、その単語がセッションに所属していることを要求する。
    pub async fn record_study(
        &self,
        user_id: Uuid,
        word_id: &str,
        request: RecordStudyRequest,
    ) -> Result<ReviewRecord, ApiError> {
        let word_uuid = parse_uuid(word_id, "word ID")?;
        let client = self.get_connection().await?;

        let owned = client
            .query_opt(
                "SELECT 1 FROM words WHERE id = $1 AND user_id = $2",
                &[&word_uuid, &user_id],
            )
            .await
            .map_err(ApiError::from)?;

        if owned.is_none() {
            return Err(ApiError::NotFound(format!("Word with id {}", word_id)));
        }

        if let Some(session_id) = request.study_session_id {
            let session = client
                .query_opt(
                    "SELECT 1 FROM study_sessions WHERE id = $1 AND user_id = $2",
                    &[&session_id, &user_id],
                )
                .await
                .map_err(ApiError::from)?;

            if session.is_none() {
                return Err(ApiError::NotFound(format!(
                    "Study session with id {}",
                    session_id
                )));
            }

            let member = client
                .query_opt(
                    "SELECT 1 FROM study_session_word WHERE study_session_id = $1 AND word_id = $2",
                    &[&session_id, &word_uuid],
                )
                .await
                .map_err(ApiError::from)?;

            if member.is_none() {
                return Err(ApiError::Validation(
                    "Word is not part of the given study session".to_string(),
                ));
            }
        }

        let row = client
            .query_one(
                r#"
                INSERT INTO review_records (word_id, study_session_id, user_id, passed)
                VALUES ($1, $2, $3, $4)
                RETURNING id, word_id, study_session_id, user_id, passed, reviewed_at
                "#,
                &[&word_uuid, &request.study_session_id, &user_id, &request.passed],
            )
            .await
            .map_err(ApiError::from)?;

        let record = ReviewRecord {
            id: row.get(0),
            word_id: row.get(1),
            study_session_id: row.get(2),
            user_id: row.get(3),
            passed: row.get(4),
            reviewed_at: row.get(5),
        };

        info!(
            "Recorded study event {} for word {} (passed: {})",
            record.id, word_id, record.passed
        );
        Ok(record)
    }

    /// CSV インポート 1 行ぶんの create-or-update。キーは (user_id, text)。
    pub async fn upsert_imported_word(
        &self,
        user_id: Uuid,
        text: &str,
        notes: Option<&str>,
        tags: &[String],
    ) -> Result<ImportOutcome, ApiError> {
        let mut client = self.get_connection().await?;
        let tx = client.transaction().await.map_err(ApiError::from)?;

        let existing = tx
            .query_opt(
                "SELECT id FROM words WHERE user_id = $1 AND text = $2",
                &[&user_id, &text],
            )
            .await
            .map_err(ApiError::from)?;

        let (word_id, outcome) = match existing {
            Some(row) => {
                let id: Uuid = row.get(0);
                if notes.is_some() {
                    tx.execute(
                        "UPDATE words SET notes = $1, updated_at = NOW() WHERE id = $2",
                        &[&notes, &id],
                    )
                    .await
                    .map_err(ApiError::from)?;
                }
                (id, ImportOutcome::Updated)
            }
            None => {
                let row = tx
                    .query_one(
                        "INSERT INTO words (user_id, text, notes) VALUES ($1, $2, $3) RETURNING id",
                        &[&user_id, &text, &notes],
                    )
                    .await
                    .map_err(ApiError::from)?;
                (row.get(0), ImportOutcome::Created)
            }
        };

        attach_tags(&tx, word_id, tags).await?;
        tx.commit().await.map_err(ApiError::from)?;

        Ok(outcome)
    }

    /// タグ・直近レビュー付きの単語 1 件取得 (内部ヘルパー)。
    async fn fetch_word_with_tags(
        &self,
        client: &tokio_postgres::Client,
        user_id: Uuid,
        word_id: Uuid,
    ) -> Result<Option<WordWithTags>, ApiError> {
        let query = format!(
            "SELECT {} FROM words w {} WHERE w.id = $1 AND w.user_id = $2",
            WORD_WITH_TAGS_COLUMNS, WORD_WITH_TAGS_JOINS
        );

        let row = client
            .query_opt(&query, &[&word_id, &user_id])
            .await
            .map_err(ApiError::from)?;

        Ok(row.map(|r| row_to_word_with_tags(&r)))
    }
}
