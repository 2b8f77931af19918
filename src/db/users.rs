use chrono::{DateTime, Utc};
use tokio_postgres::Row;
use tracing::info;
use uuid::Uuid;

use super::{parse_uuid, Database};
use crate::error::ApiError;
use crate::models::dashboard::DashboardSummary;
use crate::models::user::{AdminUpdateUserRequest, Role, User};

const USER_COLUMNS: &str = "id, name, email, password_hash, role, created_at, updated_at";

/// `tokio_postgres::Row` からユーザーを組み立てる。role の TEXT 値もここで検証する。
fn row_to_user(row: &Row) -> Result<User, ApiError> {
    let role_value: String = row.get(4);
    let role = Role::parse(&role_value)
        .map_err(|e| ApiError::Database(format!("Corrupt role column: {}", e)))?;

    Ok(User {
        id: row.get(0),
        name: row.get(1),
        email: row.get(2),
        password_hash: row.get(3),
        role,
        created_at: row.get(5),
        updated_at: row.get(6),
    })
}

impl Database {
    /// ユーザー作成。登録経由のユーザーは常に `member` ロールになる。
    pub async fn create_user(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<User, ApiError> {
        let client = self.get_connection().await?;

        let query = format!(
            r#"
            INSERT INTO users (name, email, password_hash, role)
            VALUES ($1, $2, $3, 'member')
            RETURNING {}
            "#,
            USER_COLUMNS
        );

        let row = client
            .query_one(&query, &[&name, &email, &password_hash])
            .await
            .map_err(ApiError::from)?;

        let user = row_to_user(&row)?;
        info!("Created user with id: {}", user.id);
        Ok(user)
    }

    /// ログイン用のメールアドレス検索。見つからなければ `Ok(None)`。
    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, ApiError> {
        let client = self.get_connection().await?;
        let query = format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS);

        let row = client
            .query_opt(&query, &[&email])
            .await
            .map_err(ApiError::from)?;

        row.map(|r| row_to_user(&r)).transpose()
    }

    pub async fn get_user_by_id(&self, user_id: &str) -> Result<User, ApiError> {
        let uuid = parse_uuid(user_id, "user ID")?;

        let client = self.get_connection().await?;
        let query = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);

        let row = client
            .query_opt(&query, &[&uuid])
            .await
            .map_err(ApiError::from)?;

        match row {
            Some(row) => row_to_user(&row),
            None => Err(ApiError::NotFound(format!(
                "User with id {}",
                user_id
            ))),
        }
    }

    /// 登録日時降順で全ユーザーを取得する (管理画面用)。
    pub async fn get_all_users(&self) -> Result<Vec<User>, ApiError> {
        let client = self.get_connection().await?;
        let query = format!(
            "SELECT {} FROM users ORDER BY created_at DESC",
            USER_COLUMNS
        );

        let rows = client.query(&query, &[]).await.map_err(ApiError::from)?;

        rows.iter().map(row_to_user).collect()
    }

    /// 管理者によるユーザー更新。渡された Option 値に応じて動的に SQL を組み立てる。
    pub async fn admin_update_user(
        &self,
        user_id: &str,
        request: AdminUpdateUserRequest,
    ) -> Result<User, ApiError> {
        request.validate().map_err(ApiError::Validation)?;

        let uuid = parse_uuid(user_id, "user ID")?;
        let client = self.get_connection().await?;

        let mut query_parts = Vec::new();
        let mut params: Vec<&(dyn tokio_postgres::types::ToSql + Sync)> = Vec::new();
        let mut param_count = 1;

        let updated_at = Utc::now();
        let normalized_name = request.get_normalized_name();
        let normalized_email = request.get_normalized_email();
        let role_value = request.role.map(|r| r.as_str().to_string());

        if let Some(ref name) = normalized_name {
            query_parts.push(format!("name = ${}", param_count));
            params.push(name);
            param_count += 1;
        }

        if let Some(ref email) = normalized_email {
            query_parts.push(format!("email = ${}", param_count));
            params.push(email);
            param_count += 1;
        }

        if let Some(ref role) = role_value {
            query_parts.push(format!("role = ${}", param_count));
            params.push(role);
            param_count += 1;
        }

        query_parts.push(format!("updated_at = ${}", param_count));
        params.push(&updated_at);
        param_count += 1;

        params.push(&uuid);

        let query = format!(
            "UPDATE users SET {} WHERE id = ${} RETURNING {}",
            query_parts.join(", "),
            param_count,
            USER_COLUMNS
        );

        let row = client
            .query_opt(&query, &params)
            .await
            .map_err(ApiError::from)?;

        match row {
            Some(row) => {
                let user = row_to_user(&row)?;
                info!("Updated user with id: {}", user.id);
                Ok(user)
            }
            None => Err(ApiError::NotFound(format!("User with id {}", user_id))),
        }
    }

    /// ユーザー削除。単語・セッション・学習履歴は `ON DELETE CASCADE` で一緒に消える。
    pub async fn delete_user(&self, user_id: &str) -> Result<(), ApiError> {
        let uuid = parse_uuid(user_id, "user ID")?;

        let client = self.get_connection().await?;
        let rows_affected = client
            .execute("DELETE FROM users WHERE id = $1", &[&uuid])
            .await
            .map_err(ApiError::from)?;

        if rows_affected == 0 {
            Err(ApiError::NotFound(format!("User with id {}", user_id)))
        } else {
            info!("Deleted user with id: {} (study history cascaded)", user_id);
            Ok(())
        }
    }

    // Auth session operations

    /// 新しいセッショントークンを発行する。
    pub async fn create_auth_session(
        &self,
        user_id: Uuid,
        ttl: std::time::Duration,
    ) -> Result<(Uuid, DateTime<Utc>), ApiError> {
        let token = Uuid::new_v4();
        let expires_at = Utc::now()
            + chrono::Duration::from_std(ttl)
                .map_err(|e| ApiError::Internal(anyhow::anyhow!("Invalid session TTL: {}", e)))?;

        let client = self.get_connection().await?;
        client
            .execute(
                "INSERT INTO auth_sessions (token, user_id, expires_at) VALUES ($1, $2, $3)",
                &[&token, &user_id, &expires_at],
            )
            .await
            .map_err(ApiError::from)?;

        info!("Issued auth session for user: {}", user_id);
        Ok((token, expires_at))
    }

    /// トークンから現在のユーザーを引く。期限切れ・未知のトークンは `Ok(None)`。
    pub async fn find_user_by_session_token(
        &self,
        token: Uuid,
    ) -> Result<Option<User>, ApiError> {
        let client = self.get_connection().await?;
        let query = format!(
            r#"
            SELECT {} FROM users u
            JOIN auth_sessions s ON s.user_id = u.id
            WHERE s.token = $1 AND s.expires_at > NOW()
            "#,
            USER_COLUMNS
                .split(", ")
                .map(|c| format!("u.{}", c))
                .collect::<Vec<_>>()
                .join(", ")
        );

        let row = client
            .query_opt(&query, &[&token])
            .await
            .map_err(ApiError::from)?;

        row.map(|r| row_to_user(&r)).transpose()
    }

    /// ログアウト。トークンが既に無くてもエラーにしない。
    pub async fn delete_auth_session(&self, token: Uuid) -> Result<(), ApiError> {
        let client = self.get_connection().await?;
        client
            .execute("DELETE FROM auth_sessions WHERE token = $1", &[&token])
            .await
            .map_err(ApiError::from)?;

        Ok(())
    }

    // Dashboard

    /// ログイン直後のランディング用サマリー。1 クエリで数値をまとめて取る。
    pub async fn dashboard_summary(
        &self,
        user_id: Uuid,
        review_cooldown_days: i64,
    ) -> Result<DashboardSummary, ApiError> {
        let client = self.get_connection().await?;
        let cooldown = review_cooldown_days as i32;

        let query = r#"
            SELECT
                (SELECT COUNT(*) FROM words w WHERE w.user_id = $1) AS word_count,
                (
                    SELECT COUNT(*)
                    FROM words w
                    LEFT JOIN LATERAL (
                        SELECT r.passed, r.reviewed_at
                        FROM review_records r
                        WHERE r.word_id = w.id
                        ORDER BY r.reviewed_at DESC
                        LIMIT 1
                    ) last ON TRUE
                    WHERE w.user_id = $1
                      AND (
                          last.reviewed_at IS NULL
                          OR last.passed = FALSE
                          OR last.reviewed_at < NOW() - make_interval(days => $2)
                      )
                ) AS words_due,
                (SELECT COUNT(*) FROM study_sessions s WHERE s.user_id = $1) AS session_count,
                (SELECT COUNT(*) FROM review_records r WHERE r.user_id = $1) AS review_count
        "#;

        let row = client
            .query_one(query, &[&user_id, &cooldown])
            .await
            .map_err(ApiError::from)?;

        Ok(DashboardSummary {
            word_count: row.get(0),
            words_due: row.get(1),
            study_session_count: row.get(2),
            review_count: row.get(3),
        })
    }
}
