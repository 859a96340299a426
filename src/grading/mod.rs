//! Answer matching core: normalization, line indexing, matching and report aggregation.
//!
//! Everything here is synchronous and pure. Recognition and key loading happen before these
//! functions are called, so grading one document shares no state with grading another.

mod engine;
mod line_index;
mod normalize;
mod report;

use thiserror::Error;

pub use engine::{MatchMode, grade};
pub use line_index::build_index;
pub use normalize::{non_whitespace_char_count, normalize};
pub use report::{BatchSummary, GradeReport, build_report};

use crate::model::{KeyRecord, RecognizedDocument};

/// Requests that cannot be graded at all.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GradeError {
    #[error("no valid answer-key records to grade against")]
    NoKeyRecords,
    #[error("no documents were supplied for grading")]
    NoDocuments,
}

/// Indexes, grades and aggregates one recognized document.
pub fn grade_document(
    document_label: &str,
    document: &RecognizedDocument,
    records: &[KeyRecord],
    mode: MatchMode,
) -> Result<GradeReport, GradeError> {
    if records.is_empty() {
        return Err(GradeError::NoKeyRecords);
    }

    let lines = build_index(document);
    let results = grade(records, &lines, mode);
    Ok(build_report(document_label, mode, results))
}
