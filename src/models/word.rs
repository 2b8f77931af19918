use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};

/// Vocabulary entry owned by a single user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Word {
    pub id: Uuid,
    pub user_id: Uuid,
    pub text: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// List/review view of a word: the row itself plus its tag names and the
/// outcome of its most recent review, if any.
#[derive(Debug, Clone, Serialize)]
pub struct WordWithTags {
    pub id: Uuid,
    pub user_id: Uuid,
    pub text: String,
    pub notes: Option<String>,
    pub tags: Vec<String>,
    pub last_passed: Option<bool>,
    pub last_reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request structure for creating a new word
#[derive(Debug, Deserialize)]
pub struct CreateWordRequest {
    pub text: String,
    pub notes: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Request structure for a full word update: text, notes and the complete
/// tag set are replaced together.
#[derive(Debug, Deserialize)]
pub struct UpdateWordRequest {
    pub text: String,
    pub notes: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Request structure for the partial notes-only update endpoint
#[derive(Debug, Deserialize)]
pub struct SaveNotesRequest {
    pub notes: Option<String>,
}

/// Request structure for recording a study event against a word
#[derive(Debug, Deserialize)]
pub struct RecordStudyRequest {
    pub passed: bool,
    pub study_session_id: Option<Uuid>,
}

fn validate_word_fields(text: &str, notes: &Option<String>, tags: &[String]) -> Result<(), String> {
    if text.trim().is_empty() {
        return Err("Word text cannot be empty".to_string());
    }

    if text.len() > 200 {
        return Err("Word text cannot exceed 200 characters".to_string());
    }

    if let Some(notes) = notes {
        if notes.len() > 2000 {
            return Err("Notes cannot exceed 2000 characters".to_string());
        }
    }

    for tag in tags {
        if tag.trim().is_empty() {
            return Err("Tag names cannot be empty".to_string());
        }

        if tag.len() > 100 {
            return Err("Tag names cannot exceed 100 characters".to_string());
        }
    }

    Ok(())
}

/// Trim tag names, drop empties and deduplicate while preserving order.
pub fn normalize_tags(tags: &[String]) -> Vec<String> {
    let mut seen = Vec::new();

    for tag in tags {
        let normalized = tag.trim().to_string();
        if !normalized.is_empty() && !seen.contains(&normalized) {
            seen.push(normalized);
        }
    }

    seen
}

fn normalize_notes(notes: &Option<String>) -> Option<String> {
    notes
        .as_ref()
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
}

impl CreateWordRequest {
    pub fn validate(&self) -> Result<(), String> {
        validate_word_fields(&self.text, &self.notes, &self.tags)
    }

    pub fn get_normalized_text(&self) -> String {
        self.text.trim().to_string()
    }

    pub fn get_normalized_notes(&self) -> Option<String> {
        normalize_notes(&self.notes)
    }

    pub fn get_normalized_tags(&self) -> Vec<String> {
        normalize_tags(&self.tags)
    }
}

impl UpdateWordRequest {
    pub fn validate(&self) -> Result<(), String> {
        validate_word_fields(&self.text, &self.notes, &self.tags)
    }

    pub fn get_normalized_text(&self) -> String {
        self.text.trim().to_string()
    }

    pub fn get_normalized_notes(&self) -> Option<String> {
        normalize_notes(&self.notes)
    }

    pub fn get_normalized_tags(&self) -> Vec<String> {
        normalize_tags(&self.tags)
    }
}

impl SaveNotesRequest {
    pub fn validate(&self) -> Result<(), String> {
        if let Some(ref notes) = self.notes {
            if notes.len() > 2000 {
                return Err("Notes cannot exceed 2000 characters".to_string());
            }
        }

        Ok(())
    }

    pub fn get_normalized_notes(&self) -> Option<String> {
        normalize_notes(&self.notes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_word_request_validation() {
        let valid = CreateWordRequest {
            text: "ephemeral".to_string(),
            notes: Some("lasting a very short time".to_string()),
            tags: vec!["adjective".to_string()],
        };
        assert!(valid.validate().is_ok());

        let empty_text = CreateWordRequest {
            text: "   ".to_string(),
            notes: None,
            tags: vec![],
        };
        assert!(empty_text.validate().is_err());

        let empty_tag = CreateWordRequest {
            text: "ephemeral".to_string(),
            notes: None,
            tags: vec!["".to_string()],
        };
        assert!(empty_tag.validate().is_err());

        let oversized_text = CreateWordRequest {
            text: "x".repeat(201),
            notes: None,
            tags: vec![],
        };
        assert!(oversized_text.validate().is_err());
    }

    #[test]
    fn test_normalize_tags_dedupes_and_trims() {
        let tags = vec![
            " verb ".to_string(),
            "verb".to_string(),
            "".to_string(),
            "noun".to_string(),
        ];
        assert_eq!(normalize_tags(&tags), vec!["verb", "noun"]);
    }

    #[test]
    fn test_save_notes_normalization() {
        let blank = SaveNotesRequest {
            notes: Some("   ".to_string()),
        };
        assert!(blank.validate().is_ok());
        assert_eq!(blank.get_normalized_notes(), None);

        let trimmed = SaveNotesRequest {
            notes: Some("  irregular past tense  ".to_string()),
        };
        assert_eq!(
            trimmed.get_normalized_notes(),
            Some("irregular past tense".to_string())
        );
    }

    #[test]
    fn test_record_study_request_deserialization() {
        let with_session = r#"{"passed":true,"study_session_id":"123e4567-e89b-12d3-a456-426614174000"}"#;
        let request: RecordStudyRequest = serde_json::from_str(with_session).unwrap();
        assert!(request.passed);
        assert!(request.study_session_id.is_some());

        let without_session = r#"{"passed":false}"#;
        let request: RecordStudyRequest = serde_json::from_str(without_session).unwrap();
        assert!(!request.passed);
        assert!(request.study_session_id.is_none());
    }

    #[test]
    fn test_create_word_request_defaults_tags() {
        let json = r#"{"text":"banana"}"#;
        let request: CreateWordRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.text, "banana");
        assert!(request.tags.is_empty());
        assert!(request.notes.is_none());
    }
}
