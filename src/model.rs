use serde::{Deserialize, Serialize};

/// Placeholder written as the claimed answer when nothing usable was recognized.
pub const NOT_RECOGNIZED: &str = "(not recognized)";

/// One expected question/answer pair, validated at the answer-key boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRecord {
    pub question: String,
    pub expected_answer: String,
    pub source_label: Option<String>,
}

impl KeyRecord {
    pub fn new(
        question: impl Into<String>,
        expected_answer: impl Into<String>,
        source_label: Option<String>,
    ) -> Self {
        Self {
            question: question.into(),
            expected_answer: expected_answer.into(),
            source_label,
        }
    }
}

/// Raw recognizer output for one uploaded artifact.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecognizedDocument {
    pub raw_text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pages: Vec<String>,
}

impl RecognizedDocument {
    pub fn from_text(raw_text: impl Into<String>) -> Self {
        Self {
            raw_text: raw_text.into(),
            pages: Vec::new(),
        }
    }

    pub fn from_pages(pages: Vec<String>) -> Self {
        Self {
            raw_text: pages.join("\n"),
            pages,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizedLine {
    pub index: usize,
    pub page: usize,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Correct,
    Incorrect,
    NotFound,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Correct => "correct",
            Self::Incorrect => "incorrect",
            Self::NotFound => "not_found",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchResult {
    pub question: String,
    pub expected_answer: String,
    pub claimed_answer: String,
    pub outcome: Outcome,
    pub source_label: Option<String>,
    pub matched_line: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolVersions {
    pub tesseract: Option<String>,
    pub pdftotext: Option<String>,
    pub pdftoppm: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExcludedRow {
    pub source: String,
    pub row: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedDocument {
    pub path: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct GradePaths {
    pub cache_root: String,
    pub manifest_path: String,
    pub db_path: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GradeCounts {
    pub key_source_count: usize,
    pub key_record_count: usize,
    pub excluded_row_count: usize,
    pub document_count: usize,
    pub graded_document_count: usize,
    pub failed_document_count: usize,
    pub empty_document_count: usize,
    pub correct_total: usize,
    pub incorrect_total: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct GradedDocumentEntry {
    pub path: String,
    pub sha256: String,
    pub recognizer: String,
    pub report: crate::grading::GradeReport,
}

#[derive(Debug, Clone, Serialize)]
pub struct GradeRunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub status: String,
    pub started_at: String,
    pub updated_at: String,
    pub command: String,
    pub match_mode: String,
    pub tool_versions: Option<ToolVersions>,
    pub paths: GradePaths,
    pub counts: GradeCounts,
    pub key_sources: Vec<String>,
    pub excluded_rows: Vec<ExcludedRow>,
    pub documents: Vec<GradedDocumentEntry>,
    pub failed_documents: Vec<FailedDocument>,
    pub warnings: Vec<String>,
}

/// Subset of [`GradeRunManifest`] read back by `status`.
#[derive(Debug, Clone, Deserialize)]
pub struct GradeRunSummary {
    pub run_id: Option<String>,
    pub status: Option<String>,
    pub started_at: Option<String>,
    pub updated_at: Option<String>,
    pub match_mode: Option<String>,
    pub counts: Option<GradeRunSummaryCounts>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GradeRunSummaryCounts {
    pub key_record_count: Option<usize>,
    pub excluded_row_count: Option<usize>,
    pub graded_document_count: Option<usize>,
    pub failed_document_count: Option<usize>,
    pub correct_total: Option<usize>,
    pub incorrect_total: Option<usize>,
}
