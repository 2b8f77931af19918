use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Shared classificatory label; no single owner, attached to words through
/// the `word_tag` join table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
    pub id: Uuid,
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_serialization() {
        let tag = Tag {
            id: Uuid::parse_str("123e4567-e89b-12d3-a456-426614174000").unwrap(),
            name: "adjective".to_string(),
        };

        let json = serde_json::to_string(&tag).unwrap();
        assert_eq!(
            json,
            r#"{"id":"123e4567-e89b-12d3-a456-426614174000","name":"adjective"}"#
        );
    }
}
