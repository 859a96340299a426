use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::model::{KeyRecord, MatchResult, NOT_RECOGNIZED, NormalizedLine, Outcome};

use super::line_index::blob_text;
use super::normalize::normalize;

/// Matching policy applied to every record of a run.
///
/// `Line` expects `<question> <answer>` on one recognized line and grades the last token.
/// `Blob` only checks whether the question or the answer occurs anywhere in the document,
/// so an unrelated line carrying the answer token still counts as correct.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    #[default]
    Line,
    Blob,
}

impl MatchMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Line => "line",
            Self::Blob => "blob",
        }
    }
}

/// Grades each key record against the document lines.
///
/// Returns exactly one result per record, in record order. Duplicate records are graded
/// independently.
pub fn grade(records: &[KeyRecord], lines: &[NormalizedLine], mode: MatchMode) -> Vec<MatchResult> {
    if lines.is_empty() {
        return records.iter().map(not_found).collect();
    }

    match mode {
        MatchMode::Line => records
            .iter()
            .map(|record| grade_by_line(record, lines))
            .collect(),
        MatchMode::Blob => {
            let blob = blob_text(lines);
            records
                .iter()
                .map(|record| grade_by_blob(record, &blob))
                .collect()
        }
    }
}

fn grade_by_line(record: &KeyRecord, lines: &[NormalizedLine]) -> MatchResult {
    let question = normalize(&record.question);
    let expected = normalize(&record.expected_answer);

    let Some(line) = find_question_line(lines, &question) else {
        return not_found(record);
    };

    let (claimed_answer, outcome) = match extract_claimed_answer(&line.text, &question) {
        Some(claimed) => {
            let outcome = if normalize(&claimed) == expected {
                Outcome::Correct
            } else {
                Outcome::Incorrect
            };
            (claimed, outcome)
        }
        None => (NOT_RECOGNIZED.to_string(), Outcome::Incorrect),
    };

    MatchResult {
        question: record.question.clone(),
        expected_answer: record.expected_answer.clone(),
        claimed_answer,
        outcome,
        source_label: record.source_label.clone(),
        matched_line: Some(line.index),
    }
}

/// First line (lowest index) whose text contains the question.
pub fn find_question_line<'a>(
    lines: &'a [NormalizedLine],
    question: &str,
) -> Option<&'a NormalizedLine> {
    lines
        .iter()
        .filter(|line| line.text.contains(question))
        .min_by_key(|line| line.index)
}

/// Last whitespace token of the line, provided the line holds more than the question itself.
pub fn extract_claimed_answer(line: &str, question: &str) -> Option<String> {
    let remainder = line.replacen(question, " ", 1);
    remainder.split_whitespace().next()?;

    line.split_whitespace().last().map(ToOwned::to_owned)
}

fn grade_by_blob(record: &KeyRecord, blob: &str) -> MatchResult {
    let question = normalize(&record.question);
    let expected = normalize(&record.expected_answer);

    let answer_found = blob.contains(&expected);
    let question_found = blob.contains(&question);

    let claimed_answer = if answer_found {
        expected
    } else if question_found {
        question
    } else {
        NOT_RECOGNIZED.to_string()
    };
    let outcome = if answer_found || question_found {
        Outcome::Correct
    } else {
        Outcome::Incorrect
    };

    MatchResult {
        question: record.question.clone(),
        expected_answer: record.expected_answer.clone(),
        claimed_answer,
        outcome,
        source_label: record.source_label.clone(),
        matched_line: None,
    }
}

fn not_found(record: &KeyRecord) -> MatchResult {
    MatchResult {
        question: record.question.clone(),
        expected_answer: record.expected_answer.clone(),
        claimed_answer: NOT_RECOGNIZED.to_string(),
        outcome: Outcome::NotFound,
        source_label: record.source_label.clone(),
        matched_line: None,
    }
}
