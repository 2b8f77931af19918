mod sessions;
mod users;
mod words;

pub use words::ImportOutcome;

use crate::config::DatabaseConfig;
use crate::error::ApiError;
use deadpool_postgres::{Config, Object, Pool, Runtime};
use native_tls::TlsConnector;
use postgres_native_tls::MakeTlsConnector;
use tracing::{error, info, warn};

/// PostgreSQL への接続プールを握るリポジトリ層。
/// Deadpool の `Pool` を内部に保持し、単語・セッション・ユーザーの
/// 各ドメイン操作をメソッドとして提供する (実装は db/ 配下のサブモジュール)。
#[derive(Clone)]
pub struct Database {
    pool: Pool,
}

impl Database {
    /// 接続プールを構築し、起動時に疎通確認まで実施する。
    pub async fn new(config: DatabaseConfig) -> Result<Self, ApiError> {
        info!(
            "Creating PostgreSQL connection pool for host: {}:{}",
            config.host, config.port
        );

        let pool = Self::create_pool(config)?;

        let db = Database { pool };
        db.test_connection().await?;

        Ok(db)
    }

    /// Deadpool 用の `Config` を組み立ててプールを生成する。
    fn create_pool(config: DatabaseConfig) -> Result<Pool, ApiError> {
        let mut pg_config = Config::new();

        pg_config.host = Some(config.host);
        pg_config.port = Some(config.port);
        pg_config.dbname = Some(config.database);
        pg_config.user = Some(config.username);
        pg_config.password = Some(config.password);

        pg_config.ssl_mode = Some(match config.ssl_mode.as_str() {
            "disable" => deadpool_postgres::SslMode::Disable,
            "prefer" => deadpool_postgres::SslMode::Prefer,
            "require" => deadpool_postgres::SslMode::Require,
            other => {
                warn!("Unknown SSL mode '{}', defaulting to 'require'", other);
                deadpool_postgres::SslMode::Require
            }
        });

        pg_config.manager = Some(deadpool_postgres::ManagerConfig {
            recycling_method: deadpool_postgres::RecyclingMethod::Fast,
        });

        pg_config.pool = Some(deadpool_postgres::PoolConfig::new(
            config.max_connections as usize,
        ));

        let tls_connector = TlsConnector::builder().build().map_err(|e| {
            error!("Failed to create TLS connector: {}", e);
            ApiError::Database(format!("TLS connector creation failed: {}", e))
        })?;
        let tls = MakeTlsConnector::new(tls_connector);

        pg_config
            .create_pool(Some(Runtime::Tokio1), tls)
            .map_err(|e| {
                error!("Failed to create connection pool: {}", e);
                ApiError::Database(format!("Connection pool creation failed: {}", e))
            })
    }

    /// プールから接続を借りる小さなラッパー。
    pub(crate) async fn get_connection(&self) -> Result<Object, ApiError> {
        self.pool.get().await.map_err(ApiError::from)
    }

    /// `SELECT 1` を投げて DB が生きているか確認する (ヘルスチェック用)。
    pub async fn health_check(&self) -> Result<(), ApiError> {
        let client = self.get_connection().await?;

        client.execute("SELECT 1", &[]).await.map_err(|e| {
            error!("Database health check failed: {}", e);
            ApiError::Database(format!("Health check failed: {}", e))
        })?;

        Ok(())
    }

    /// `Database::new` 直後にプール全体が機能するかの確認に使う。
    pub async fn test_connection(&self) -> Result<(), ApiError> {
        let client = self.get_connection().await?;

        client.execute("SELECT 1", &[]).await.map_err(|e| {
            error!("Database connection test failed: {}", e);
            ApiError::Database(format!("Connection test failed: {}", e))
        })?;

        info!("Database connection test successful");
        Ok(())
    }

    /// アプリ起動時にテーブル群を CREATE する簡易マイグレーター。
    /// SQL をリテラル文字列で保持し、順番に流す。
    pub async fn migrate(&self) -> Result<(), ApiError> {
        info!("Running database migrations");

        let client = self.get_connection().await?;

        let statements: &[(&str, &str)] = &[
            (
                "uuid extension",
                r#"CREATE EXTENSION IF NOT EXISTS "uuid-ossp""#,
            ),
            (
                "users table",
                r#"
                CREATE TABLE IF NOT EXISTS users (
                    id UUID PRIMARY KEY DEFAULT uuid_generate_v4(),
                    name VARCHAR(100) NOT NULL,
                    email VARCHAR(255) UNIQUE NOT NULL,
                    password_hash TEXT NOT NULL,
                    role VARCHAR(20) NOT NULL DEFAULT 'member'
                        CHECK (role IN ('admin', 'member')),
                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                )
                "#,
            ),
            (
                "users email index",
                "CREATE INDEX IF NOT EXISTS idx_users_email ON users(email)",
            ),
            (
                "auth_sessions table",
                r#"
                CREATE TABLE IF NOT EXISTS auth_sessions (
                    token UUID PRIMARY KEY,
                    user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    expires_at TIMESTAMPTZ NOT NULL
                )
                "#,
            ),
            (
                "auth_sessions user index",
                "CREATE INDEX IF NOT EXISTS idx_auth_sessions_user_id ON auth_sessions(user_id)",
            ),
            (
                "words table",
                r#"
                CREATE TABLE IF NOT EXISTS words (
                    id UUID PRIMARY KEY DEFAULT uuid_generate_v4(),
                    user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    text VARCHAR(200) NOT NULL,
                    notes TEXT,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    CONSTRAINT words_user_text_key UNIQUE (user_id, text)
                )
                "#,
            ),
            (
                "words user index",
                "CREATE INDEX IF NOT EXISTS idx_words_user_id ON words(user_id)",
            ),
            (
                "tags table",
                r#"
                CREATE TABLE IF NOT EXISTS tags (
                    id UUID PRIMARY KEY DEFAULT uuid_generate_v4(),
                    name VARCHAR(100) NOT NULL,
                    CONSTRAINT tags_name_key UNIQUE (name)
                )
                "#,
            ),
            (
                "word_tag table",
                r#"
                CREATE TABLE IF NOT EXISTS word_tag (
                    word_id UUID NOT NULL REFERENCES words(id) ON DELETE CASCADE,
                    tag_id UUID NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
                    PRIMARY KEY (word_id, tag_id)
                )
                "#,
            ),
            (
                "study_sessions table",
                r#"
                CREATE TABLE IF NOT EXISTS study_sessions (
                    id UUID PRIMARY KEY DEFAULT uuid_generate_v4(),
                    user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    name VARCHAR(200) NOT NULL,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                )
                "#,
            ),
            (
                "study_sessions user index",
                "CREATE INDEX IF NOT EXISTS idx_study_sessions_user_id ON study_sessions(user_id)",
            ),
            (
                "study_session_word table",
                r#"
                CREATE TABLE IF NOT EXISTS study_session_word (
                    study_session_id UUID NOT NULL REFERENCES study_sessions(id) ON DELETE CASCADE,
                    word_id UUID NOT NULL REFERENCES words(id) ON DELETE CASCADE,
                    position INT NOT NULL DEFAULT 0,
                    PRIMARY KEY (study_session_id, word_id)
                )
                "#,
            ),
            (
                "review_records table",
                r#"
                CREATE TABLE IF NOT EXISTS review_records (
                    id UUID PRIMARY KEY DEFAULT uuid_generate_v4(),
                    word_id UUID NOT NULL REFERENCES words(id) ON DELETE CASCADE,
                    study_session_id UUID REFERENCES study_sessions(id) ON DELETE SET NULL,
                    user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    passed BOOLEAN NOT NULL,
                    reviewed_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                )
                "#,
            ),
            (
                "review_records word index",
                "CREATE INDEX IF NOT EXISTS idx_review_records_word_id ON review_records(word_id, reviewed_at DESC)",
            ),
            (
                "review_records user index",
                "CREATE INDEX IF NOT EXISTS idx_review_records_user_id ON review_records(user_id, reviewed_at DESC)",
            ),
        ];

        for (label, sql) in statements {
            client.execute(*sql, &[]).await.map_err(|e| {
                error!("Migration step '{}' failed: {}", label, e);
                ApiError::Database(format!("Migration step '{}' failed: {}", label, e))
            })?;
        }

        info!("Database migrations completed successfully");
        Ok(())
    }
}

/// UUID 文字列のパース。失敗時は `ApiError::Validation` を返す。
pub(crate) fn parse_uuid(value: &str, field: &str) -> Result<uuid::Uuid, ApiError> {
    uuid::Uuid::parse_str(value)
        .map_err(|_| ApiError::Validation(format!("Invalid {} format", field)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_uuid() {
        assert!(parse_uuid("123e4567-e89b-12d3-a456-426614174000", "word ID").is_ok());

        let err = parse_uuid("not-a-uuid", "word ID").unwrap_err();
        match err {
            ApiError::Validation(message) => assert!(message.contains("word ID")),
            other => panic!("expected validation error, got {:?}", other),
        }
    }
}
