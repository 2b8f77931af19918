use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};

use super::word::WordWithTags;

/// 学習セッション。1 ユーザーが所有し、復習対象の単語集合を束ねる。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudySession {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 一覧表示用: セッション本体と所属単語数。
#[derive(Debug, Clone, Serialize)]
pub struct StudySessionSummary {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub word_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 詳細表示用: セッションと position 順の単語リスト。
#[derive(Debug, Serialize)]
pub struct StudySessionDetail {
    #[serde(flatten)]
    pub session: StudySession,
    pub words: Vec<WordWithTags>,
}

#[derive(Debug, Deserialize)]
pub struct CreateStudySessionRequest {
    pub name: String,
    #[serde(default)]
    pub word_ids: Vec<Uuid>,
}

/// セッション更新。`word_ids` が `Some` のときだけ単語集合を丸ごと差し替える。
#[derive(Debug, Deserialize)]
pub struct UpdateStudySessionRequest {
    pub name: Option<String>,
    pub word_ids: Option<Vec<Uuid>>,
}

fn validate_name(name: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err("Session name cannot be empty".to_string());
    }

    if name.len() > 200 {
        return Err("Session name cannot exceed 200 characters".to_string());
    }

    Ok(())
}

/// 重複を取り除き、渡された順序を保つ。position 列はこの順序で振られる。
pub fn dedupe_word_ids(word_ids: &[Uuid]) -> Vec<Uuid> {
    let mut seen = Vec::new();

    for id in word_ids {
        if !seen.contains(id) {
            seen.push(*id);
        }
    }

    seen
}

impl CreateStudySessionRequest {
    pub fn validate(&self) -> Result<(), String> {
        validate_name(&self.name)
    }

    pub fn get_normalized_name(&self) -> String {
        self.name.trim().to_string()
    }

    pub fn get_word_ids(&self) -> Vec<Uuid> {
        dedupe_word_ids(&self.word_ids)
    }
}

impl UpdateStudySessionRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.name.is_none() && self.word_ids.is_none() {
            return Err(
                "At least one field (name or word_ids) must be provided for update".to_string(),
            );
        }

        if let Some(ref name) = self.name {
            validate_name(name)?;
        }

        Ok(())
    }

    pub fn get_normalized_name(&self) -> Option<String> {
        self.name.as_ref().map(|n| n.trim().to_string())
    }

    pub fn get_word_ids(&self) -> Option<Vec<Uuid>> {
        self.word_ids.as_ref().map(|ids| dedupe_word_ids(ids))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_session_request_validation() {
        let valid = CreateStudySessionRequest {
            name: "Week 12 verbs".to_string(),
            word_ids: vec![],
        };
        assert!(valid.validate().is_ok());

        let empty_name = CreateStudySessionRequest {
            name: "  ".to_string(),
            word_ids: vec![],
        };
        assert!(empty_name.validate().is_err());
    }

    #[test]
    fn test_update_session_request_requires_a_field() {
        let empty = UpdateStudySessionRequest {
            name: None,
            word_ids: None,
        };
        assert!(empty.validate().is_err());

        let words_only = UpdateStudySessionRequest {
            name: None,
            word_ids: Some(vec![]),
        };
        assert!(words_only.validate().is_ok());
    }

    #[test]
    fn test_dedupe_word_ids_preserves_order() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_eq!(dedupe_word_ids(&[a, b, a]), vec![a, b]);
    }

    #[test]
    fn test_session_detail_flattens_session_fields() {
        let session = StudySession {
            id: Uuid::parse_str("123e4567-e89b-12d3-a456-426614174000").unwrap(),
            user_id: Uuid::parse_str("223e4567-e89b-12d3-a456-426614174000").unwrap(),
            name: "Week 12 verbs".to_string(),
            created_at: chrono::DateTime::parse_from_rfc3339("2022-01-01T00:00:00Z")
                .unwrap()
                .with_timezone(&chrono::Utc),
            updated_at: chrono::DateTime::parse_from_rfc3339("2022-01-01T00:00:00Z")
                .unwrap()
                .with_timezone(&chrono::Utc),
        };

        let detail = StudySessionDetail {
            session,
            words: vec![],
        };

        let json = serde_json::to_value(&detail).unwrap();
        assert_eq!(json["name"], "Week 12 verbs");
        assert!(json["words"].as_array().unwrap().is_empty());
    }
}
