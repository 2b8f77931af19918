// CSV transfer service
// Parses uploaded word lists and serializes study sessions for download.
//
// Import schema: header `text,notes,tags` — only `text` is required, `tags`
// is `;`-separated. Unknown columns are ignored, so an exported file can be
// re-imported as-is.
// Export schema: `text,notes,tags,last_result,last_reviewed_at` where
// `last_result` is `pass`, `fail` or empty.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::ApiError;

/// One successfully parsed import row.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportedWordRow {
    pub line: u64,
    pub text: String,
    pub notes: Option<String>,
    pub tags: Vec<String>,
}

/// One rejected import row, reported back to the caller.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SkippedRow {
    pub line: u64,
    pub reason: String,
}

/// Batch result returned by the import endpoint.
#[derive(Debug, Serialize)]
pub struct ImportReport {
    pub created: usize,
    pub updated: usize,
    pub skipped: Vec<SkippedRow>,
}

/// One word as it appears in a session export.
#[derive(Debug, Clone)]
pub struct ExportWordRow {
    pub text: String,
    pub notes: Option<String>,
    pub tags: Vec<String>,
    pub last_passed: Option<bool>,
    pub last_reviewed_at: Option<DateTime<Utc>>,
}

/// Parse an uploaded CSV into word rows. Malformed rows are skipped and
/// reported, never fatal to the batch; a missing `text` header is the one
/// whole-batch error, since no row can be interpreted without it.
pub fn parse_import_csv(data: &[u8]) -> Result<(Vec<ImportedWordRow>, Vec<SkippedRow>), ApiError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(data);

    let headers = reader
        .headers()
        .map_err(|e| ApiError::Validation(format!("Invalid CSV header: {}", e)))?
        .clone();

    let text_idx = headers
        .iter()
        .position(|h| h.eq_ignore_ascii_case("text"))
        .ok_or_else(|| ApiError::Validation("CSV header must contain a 'text' column".to_string()))?;
    let notes_idx = headers.iter().position(|h| h.eq_ignore_ascii_case("notes"));
    let tags_idx = headers.iter().position(|h| h.eq_ignore_ascii_case("tags"));

    let mut rows = Vec::new();
    let mut skipped = Vec::new();

    for (index, result) in reader.records().enumerate() {
        // Header occupies line 1
        let line = index as u64 + 2;

        let record = match result {
            Ok(record) => record,
            Err(e) => {
                skipped.push(SkippedRow {
                    line,
                    reason: format!("Malformed CSV row: {}", e),
                });
                continue;
            }
        };

        let text = record.get(text_idx).unwrap_or("").trim().to_string();
        if text.is_empty() {
            skipped.push(SkippedRow {
                line,
                reason: "Word text is empty".to_string(),
            });
            continue;
        }

        if text.len() > 200 {
            skipped.push(SkippedRow {
                line,
                reason: "Word text exceeds 200 characters".to_string(),
            });
            continue;
        }

        let notes = notes_idx
            .and_then(|i| record.get(i))
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());

        let tags = tags_idx
            .and_then(|i| record.get(i))
            .map(|raw| {
                raw.split(';')
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty())
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        rows.push(ImportedWordRow {
            line,
            text,
            notes,
            tags,
        });
    }

    Ok((rows, skipped))
}

/// Serialize a session's words to CSV, one row per word in session order.
pub fn export_session_csv(rows: &[ExportWordRow]) -> Result<String, ApiError> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    writer
        .write_record(["text", "notes", "tags", "last_result", "last_reviewed_at"])
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("CSV serialization failed: {}", e)))?;

    for row in rows {
        let last_result = match row.last_passed {
            Some(true) => "pass",
            Some(false) => "fail",
            None => "",
        };
        let last_reviewed_at = row
            .last_reviewed_at
            .map(|at| at.to_rfc3339())
            .unwrap_or_default();

        writer
            .write_record([
                row.text.as_str(),
                row.notes.as_deref().unwrap_or(""),
                &row.tags.join(";"),
                last_result,
                &last_reviewed_at,
            ])
            .map_err(|e| ApiError::Internal(anyhow::anyhow!("CSV serialization failed: {}", e)))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("CSV serialization failed: {}", e)))?;

    String::from_utf8(bytes)
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("CSV output was not UTF-8: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_import_csv_happy_path() {
        let data = b"text,notes,tags\napple,a fruit,noun;food\nbanana,,\n";
        let (rows, skipped) = parse_import_csv(data).unwrap();

        assert!(skipped.is_empty());
        assert_eq!(rows.len(), 2);

        assert_eq!(rows[0].line, 2);
        assert_eq!(rows[0].text, "apple");
        assert_eq!(rows[0].notes, Some("a fruit".to_string()));
        assert_eq!(rows[0].tags, vec!["noun", "food"]);

        assert_eq!(rows[1].text, "banana");
        assert_eq!(rows[1].notes, None);
        assert!(rows[1].tags.is_empty());
    }

    #[test]
    fn test_parse_import_csv_skips_bad_rows() {
        let data = b"text,notes\napple,good\n,missing text\nbanana,ok\n";
        let (rows, skipped) = parse_import_csv(data).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].line, 3);
        assert!(skipped[0].reason.contains("empty"));
    }

    #[test]
    fn test_parse_import_csv_requires_text_header() {
        let data = b"word,meaning\napple,fruit\n";
        let err = parse_import_csv(data).unwrap_err();
        match err {
            ApiError::Validation(message) => assert!(message.contains("text")),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_import_csv_text_only_header() {
        let data = b"text\nephemeral\n";
        let (rows, skipped) = parse_import_csv(data).unwrap();

        assert!(skipped.is_empty());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].text, "ephemeral");
    }

    #[test]
    fn test_export_session_csv() {
        let rows = vec![
            ExportWordRow {
                text: "apple".to_string(),
                notes: Some("a fruit".to_string()),
                tags: vec!["noun".to_string(), "food".to_string()],
                last_passed: Some(true),
                last_reviewed_at: Some(
                    DateTime::parse_from_rfc3339("2022-01-01T00:00:00Z")
                        .unwrap()
                        .with_timezone(&Utc),
                ),
            },
            ExportWordRow {
                text: "banana".to_string(),
                notes: None,
                tags: vec![],
                last_passed: None,
                last_reviewed_at: None,
            },
        ];

        let csv = export_session_csv(&rows).unwrap();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "text,notes,tags,last_result,last_reviewed_at");
        assert!(lines[1].starts_with("apple,a fruit,noun;food,pass,"));
        assert_eq!(lines[2], "banana,,,,");
    }

    #[test]
    fn test_export_import_round_trip_on_word_text() {
        let exported = export_session_csv(&[
            ExportWordRow {
                text: "apple".to_string(),
                notes: Some("a fruit".to_string()),
                tags: vec!["noun".to_string()],
                last_passed: Some(false),
                last_reviewed_at: None,
            },
            ExportWordRow {
                text: "banana".to_string(),
                notes: None,
                tags: vec![],
                last_passed: None,
                last_reviewed_at: None,
            },
        ])
        .unwrap();

        let (rows, skipped) = parse_import_csv(exported.as_bytes()).unwrap();

        assert!(skipped.is_empty());
        let texts: Vec<&str> = rows.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["apple", "banana"]);
        assert_eq!(rows[0].tags, vec!["noun"]);
    }

    #[test]
    fn test_export_after_detach_drops_the_word() {
        // Session {apple, banana}: detaching apple leaves a single banana row
        let remaining = vec![ExportWordRow {
            text: "banana".to_string(),
            notes: None,
            tags: vec![],
            last_passed: None,
            last_reviewed_at: None,
        }];

        let csv = export_session_csv(&remaining).unwrap();
        assert!(!csv.contains("apple"));
        assert_eq!(csv.lines().count(), 2);
    }
}
