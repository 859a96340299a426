use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{info, warn};

use crate::grading::normalize;
use crate::model::{ExcludedRow, KeyRecord};
use crate::util::document_label;

pub const DEFAULT_QUESTION_COLUMN: &str = "word";
pub const DEFAULT_ANSWER_COLUMN: &str = "meaning";

/// Which row columns hold the question and the expected answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyColumns {
    pub question: String,
    pub answer: String,
}

impl Default for KeyColumns {
    fn default() -> Self {
        Self {
            question: DEFAULT_QUESTION_COLUMN.to_string(),
            answer: DEFAULT_ANSWER_COLUMN.to_string(),
        }
    }
}

/// Why a spreadsheet row never became a [`KeyRecord`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RowIssue {
    #[error("row is not an object")]
    NotAnObject,
    #[error("missing column '{0}'")]
    MissingField(String),
    #[error("column '{0}' is blank")]
    BlankField(String),
    #[error("column '{column}' holds an unsupported {kind} value")]
    UnsupportedValue { column: String, kind: &'static str },
    #[error("column '{0}' is empty after normalization")]
    EmptyAfterNormalization(String),
}

#[derive(Debug, Clone, Default)]
pub struct AnswerKey {
    pub sources: Vec<String>,
    pub records: Vec<KeyRecord>,
    pub excluded: Vec<ExcludedRow>,
}

/// Loads every source in order and concatenates the valid rows. Duplicates are kept.
pub fn load_answer_keys(paths: &[PathBuf], columns: &KeyColumns) -> Result<AnswerKey> {
    let mut key = AnswerKey::default();

    for path in paths {
        let raw = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        let label = document_label(path);
        let (records, excluded) = parse_key_source(&label, &raw, columns)
            .with_context(|| format!("failed to parse answer key {}", path.display()))?;

        info!(
            source = %label,
            records = records.len(),
            excluded = excluded.len(),
            "loaded answer key source"
        );

        for row in &excluded {
            warn!(source = %row.source, row = row.row, reason = %row.reason, "excluded answer key row");
        }

        key.sources.push(path.display().to_string());
        key.records.extend(records);
        key.excluded.extend(excluded);
    }

    Ok(key)
}

/// Parses one JSON export: a row array, `{"rows": [...]}`, or `{"<sheet>": [...], ...}`.
///
/// Sheets are read in the order they appear in the file.
pub fn parse_key_source(
    label: &str,
    raw: &[u8],
    columns: &KeyColumns,
) -> Result<(Vec<KeyRecord>, Vec<ExcludedRow>)> {
    let value: Value = serde_json::from_slice(raw).context("answer key is not valid JSON")?;

    let mut records = Vec::new();
    let mut excluded = Vec::new();
    for (sheet_label, rows) in sheets_from_value(label, value)? {
        for (index, row) in rows.iter().enumerate() {
            match validate_row(row, columns, &sheet_label) {
                Ok(record) => records.push(record),
                Err(issue) => excluded.push(ExcludedRow {
                    source: sheet_label.clone(),
                    row: index + 1,
                    reason: issue.to_string(),
                }),
            }
        }
    }

    Ok((records, excluded))
}

fn sheets_from_value(label: &str, value: Value) -> Result<Vec<(String, Vec<Value>)>> {
    match value {
        Value::Array(rows) => Ok(vec![(label.to_string(), rows)]),
        Value::Object(mut object) => {
            if object.len() == 1
                && let Some(Value::Array(rows)) = object.get_mut("rows")
            {
                return Ok(vec![(label.to_string(), std::mem::take(rows))]);
            }

            let mut sheets = Vec::with_capacity(object.len());
            for (sheet, rows) in object {
                let Value::Array(rows) = rows else {
                    bail!("sheet '{sheet}' is not an array of rows");
                };
                sheets.push((format!("{label}#{sheet}"), rows));
            }
            Ok(sheets)
        }
        _ => bail!("expected an array of rows or an object of sheets"),
    }
}

/// Maps one loosely typed row onto a validated record.
pub fn validate_row(
    row: &Value,
    columns: &KeyColumns,
    source_label: &str,
) -> std::result::Result<KeyRecord, RowIssue> {
    let Value::Object(cells) = row else {
        return Err(RowIssue::NotAnObject);
    };

    let question = cell_text(cells, &columns.question)?;
    let expected_answer = cell_text(cells, &columns.answer)?;

    if normalize(&question).is_empty() {
        return Err(RowIssue::EmptyAfterNormalization(columns.question.clone()));
    }
    if normalize(&expected_answer).is_empty() {
        return Err(RowIssue::EmptyAfterNormalization(columns.answer.clone()));
    }

    Ok(KeyRecord::new(
        question,
        expected_answer,
        Some(source_label.to_string()),
    ))
}

fn cell_text(cells: &Map<String, Value>, column: &str) -> std::result::Result<String, RowIssue> {
    let text = match cells.get(column) {
        None | Some(Value::Null) => return Err(RowIssue::MissingField(column.to_string())),
        Some(Value::String(text)) => text.trim().to_string(),
        Some(Value::Number(number)) => number.to_string(),
        Some(Value::Bool(flag)) => flag.to_string(),
        Some(Value::Array(_)) => {
            return Err(RowIssue::UnsupportedValue {
                column: column.to_string(),
                kind: "array",
            });
        }
        Some(Value::Object(_)) => {
            return Err(RowIssue::UnsupportedValue {
                column: column.to_string(),
                kind: "object",
            });
        }
    };

    if text.is_empty() {
        return Err(RowIssue::BlankField(column.to_string()));
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use serde_json::json;

    use super::*;

    #[test]
    fn validate_row_accepts_strings_and_numbers() {
        let columns = KeyColumns::default();

        let record = validate_row(&json!({"word": " Apple ", "meaning": "사과"}), &columns, "a.json")
            .expect("row is valid");
        assert_eq!(record.question, "Apple");
        assert_eq!(record.expected_answer, "사과");
        assert_eq!(record.source_label.as_deref(), Some("a.json"));

        let record = validate_row(&json!({"word": "ten", "meaning": 10}), &columns, "a.json")
            .expect("numbers convert to text");
        assert_eq!(record.expected_answer, "10");
    }

    #[test]
    fn validate_row_reports_each_issue() {
        let columns = KeyColumns::default();

        assert_eq!(
            validate_row(&json!("apple"), &columns, "a"),
            Err(RowIssue::NotAnObject)
        );
        assert_eq!(
            validate_row(&json!({"meaning": "사과"}), &columns, "a"),
            Err(RowIssue::MissingField("word".to_string()))
        );
        assert_eq!(
            validate_row(&json!({"word": "apple", "meaning": null}), &columns, "a"),
            Err(RowIssue::MissingField("meaning".to_string()))
        );
        assert_eq!(
            validate_row(&json!({"word": "  ", "meaning": "사과"}), &columns, "a"),
            Err(RowIssue::BlankField("word".to_string()))
        );
        assert_eq!(
            validate_row(&json!({"word": ["a"], "meaning": "사과"}), &columns, "a"),
            Err(RowIssue::UnsupportedValue {
                column: "word".to_string(),
                kind: "array"
            })
        );
        assert_eq!(
            validate_row(&json!({"word": "apple", "meaning": "..."}), &columns, "a"),
            Err(RowIssue::EmptyAfterNormalization("meaning".to_string()))
        );
    }

    #[test]
    fn custom_columns_are_honored() {
        let columns = KeyColumns {
            question: "english".to_string(),
            answer: "korean".to_string(),
        };
        let record = validate_row(&json!({"english": "dog", "korean": "개"}), &columns, "a")
            .expect("custom columns map");
        assert_eq!(record.question, "dog");
    }

    #[test]
    fn parse_key_source_keeps_duplicates_and_itemizes_exclusions() {
        let raw = r#"[
            {"word": "cat", "meaning": "고양이"},
            {"word": "cat", "meaning": "고양이"},
            {"word": "dog"},
            {"word": "run", "meaning": "달리다"}
        ]"#.as_bytes();

        let (records, excluded) =
            parse_key_source("day1.json", raw, &KeyColumns::default()).expect("valid json");

        assert_eq!(records.len(), 3);
        assert_eq!(records[0], records[1]);
        assert_eq!(records[2].question, "run");
        assert_eq!(excluded.len(), 1);
        assert_eq!(excluded[0].source, "day1.json");
        assert_eq!(excluded[0].row, 3);
        assert_eq!(excluded[0].reason, "missing column 'meaning'");
    }

    #[test]
    fn parse_key_source_reads_rows_and_sheet_objects() {
        let rows = r#"{"rows": [{"word": "apple", "meaning": "사과"}]}"#.as_bytes();
        let (records, _) =
            parse_key_source("k.json", rows, &KeyColumns::default()).expect("rows object");
        assert_eq!(records.len(), 1);

        let sheets = r#"{
            "Day1": [{"word": "apple", "meaning": "사과"}],
            "Day2": [{"word": "dog", "meaning": "개"}, {"word": "", "meaning": "x"}]
        }"#.as_bytes();
        let (records, excluded) =
            parse_key_source("k.json", sheets, &KeyColumns::default()).expect("sheet object");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].source_label.as_deref(), Some("k.json#Day1"));
        assert_eq!(records[1].source_label.as_deref(), Some("k.json#Day2"));
        assert_eq!(excluded.len(), 1);
        assert_eq!(excluded[0].source, "k.json#Day2");
        assert_eq!(excluded[0].row, 2);
    }

    #[test]
    fn sheets_keep_workbook_order() {
        let sheets = r#"{
            "Day2": [{"word": "dog", "meaning": "개"}],
            "Day10": [{"word": "cat", "meaning": "고양이"}],
            "A": [{"word": "apple", "meaning": "사과"}]
        }"#
        .as_bytes();

        let (records, _) =
            parse_key_source("k.json", sheets, &KeyColumns::default()).expect("sheet object");

        let questions: Vec<&str> = records.iter().map(|r| r.question.as_str()).collect();
        assert_eq!(questions, vec!["dog", "cat", "apple"]);
        assert_eq!(records[1].source_label.as_deref(), Some("k.json#Day10"));
    }

    #[test]
    fn parse_key_source_rejects_malformed_json() {
        assert!(parse_key_source("k.json", b"not json", &KeyColumns::default()).is_err());
        assert!(parse_key_source("k.json", b"42", &KeyColumns::default()).is_err());
        assert!(parse_key_source("k.json", r#"{"Day1": 3}"#.as_bytes(), &KeyColumns::default()).is_err());
    }

    #[test]
    fn load_answer_keys_concatenates_sources_in_order() {
        let dir = tempfile::tempdir().expect("temp dir");
        let first = dir.path().join("first.json");
        let second = dir.path().join("second.json");
        fs::File::create(&first)
            .and_then(|mut file| file.write_all(r#"[{"word": "apple", "meaning": "사과"}]"#.as_bytes()))
            .expect("write first");
        fs::File::create(&second)
            .and_then(|mut file| {
                file.write_all(r#"[{"word": "dog", "meaning": "개"}, {"meaning": "x"}]"#.as_bytes())
            })
            .expect("write second");

        let key = load_answer_keys(&[first, second], &KeyColumns::default()).expect("keys load");

        assert_eq!(key.sources.len(), 2);
        let questions: Vec<&str> = key.records.iter().map(|r| r.question.as_str()).collect();
        assert_eq!(questions, vec!["apple", "dog"]);
        assert_eq!(key.excluded.len(), 1);
        assert_eq!(key.excluded[0].source, "second.json");
    }

    #[test]
    fn load_answer_keys_fails_on_missing_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let missing = dir.path().join("missing.json");
        assert!(load_answer_keys(&[missing], &KeyColumns::default()).is_err());
    }
}
