use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};

/// Append-only record of a single study event: one word, one pass/fail
/// outcome, optionally tied to the study session it happened in. Never
/// updated or deleted through the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewRecord {
    pub id: Uuid,
    pub word_id: Uuid,
    pub study_session_id: Option<Uuid>,
    pub user_id: Uuid,
    pub passed: bool,
    pub reviewed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_review_record_serialization() {
        let record = ReviewRecord {
            id: Uuid::parse_str("123e4567-e89b-12d3-a456-426614174000").unwrap(),
            word_id: Uuid::parse_str("223e4567-e89b-12d3-a456-426614174000").unwrap(),
            study_session_id: None,
            user_id: Uuid::parse_str("323e4567-e89b-12d3-a456-426614174000").unwrap(),
            passed: true,
            reviewed_at: DateTime::parse_from_rfc3339("2022-01-01T00:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
        };

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["passed"], true);
        assert!(json["study_session_id"].is_null());
    }
}
