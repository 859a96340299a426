use serde::Serialize;

use crate::model::{MatchResult, Outcome};

use super::engine::MatchMode;

/// Per-document grading result. Counts are derived from `results` and never stored apart from them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GradeReport {
    pub document_label: String,
    pub match_mode: MatchMode,
    pub results: Vec<MatchResult>,
    pub correct_count: usize,
    /// Includes `NotFound` results so that correct + incorrect always equals the result count.
    pub incorrect_count: usize,
}

impl GradeReport {
    pub fn not_found_count(&self) -> usize {
        self.results
            .iter()
            .filter(|result| result.outcome == Outcome::NotFound)
            .count()
    }

    pub fn total(&self) -> usize {
        self.results.len()
    }

    /// `question → expected answer` for every item that was not graded correct.
    pub fn corrections(&self) -> Vec<String> {
        self.results
            .iter()
            .filter(|result| result.outcome != Outcome::Correct)
            .map(|result| format!("{} → {}", result.question, result.expected_answer))
            .collect()
    }
}

pub fn build_report(
    document_label: impl Into<String>,
    match_mode: MatchMode,
    results: Vec<MatchResult>,
) -> GradeReport {
    let correct_count = results
        .iter()
        .filter(|result| result.outcome == Outcome::Correct)
        .count();
    let incorrect_count = results.len() - correct_count;

    GradeReport {
        document_label: document_label.into(),
        match_mode,
        results,
        correct_count,
        incorrect_count,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub documents_graded: usize,
    pub documents_failed: usize,
    pub correct_total: usize,
    pub incorrect_total: usize,
    pub not_found_total: usize,
}

impl BatchSummary {
    pub fn from_reports(reports: &[GradeReport], documents_failed: usize) -> Self {
        reports.iter().fold(
            Self {
                documents_failed,
                ..Self::default()
            },
            |mut summary, report| {
                summary.documents_graded += 1;
                summary.correct_total += report.correct_count;
                summary.incorrect_total += report.incorrect_count;
                summary.not_found_total += report.not_found_count();
                summary
            },
        )
    }
}
