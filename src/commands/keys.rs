use std::io::{self, Write};

use anyhow::{Context, Result, bail};
use serde::Serialize;
use tracing::info;

use crate::answer_key::{AnswerKey, load_answer_keys};
use crate::cli::KeysArgs;
use crate::grading::GradeError;
use crate::model::ExcludedRow;

#[derive(Debug, Serialize)]
struct KeysResponse<'a> {
    sources: &'a [String],
    question_column: &'a str,
    answer_column: &'a str,
    record_count: usize,
    excluded_row_count: usize,
    excluded_rows: &'a [ExcludedRow],
}

pub fn run(args: KeysArgs) -> Result<()> {
    let columns = args.key.columns();
    let answer_key = load_answer_keys(&args.key.keys, &columns)?;

    info!(
        sources = answer_key.sources.len(),
        records = answer_key.records.len(),
        excluded = answer_key.excluded.len(),
        "validated answer key"
    );

    let mut output = io::BufWriter::new(io::stdout().lock());
    if args.json {
        let response = KeysResponse {
            sources: &answer_key.sources,
            question_column: &columns.question,
            answer_column: &columns.answer,
            record_count: answer_key.records.len(),
            excluded_row_count: answer_key.excluded.len(),
            excluded_rows: &answer_key.excluded,
        };
        serde_json::to_writer_pretty(&mut output, &response)
            .context("failed to serialize keys json output")?;
        writeln!(output)?;
    } else {
        render_key_summary(&mut output, &answer_key)?;
    }
    output.flush()?;

    if answer_key.records.is_empty() {
        bail!(GradeError::NoKeyRecords);
    }
    Ok(())
}

fn render_key_summary<W: Write>(output: &mut W, answer_key: &AnswerKey) -> Result<()> {
    writeln!(output, "Key sources: {}", answer_key.sources.len())?;
    for source in &answer_key.sources {
        writeln!(output, "  {source}")?;
    }
    writeln!(output, "Accepted rows: {}", answer_key.records.len())?;
    writeln!(output, "Excluded rows: {}", answer_key.excluded.len())?;
    for row in &answer_key.excluded {
        writeln!(output, "  {} row {}: {}", row.source, row.row, row.reason)?;
    }
    Ok(())
}
