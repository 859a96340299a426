use std::io::{self, Write};

use anyhow::{Context, Result};

use crate::grading::BatchSummary;
use crate::model::GradeRunManifest;

pub fn write_json_response(manifest: &GradeRunManifest) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());
    serde_json::to_writer_pretty(&mut output, manifest)
        .context("failed to serialize grade json output")?;
    writeln!(output)?;
    output.flush()?;
    Ok(())
}

pub fn write_text_response(manifest: &GradeRunManifest, summary: &BatchSummary) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());
    render_text_summary(&mut output, manifest, summary)?;
    output.flush()?;
    Ok(())
}

fn render_text_summary<W: Write>(
    output: &mut W,
    manifest: &GradeRunManifest,
    summary: &BatchSummary,
) -> Result<()> {
    writeln!(
        output,
        "Grade run: {} mode={} status={}",
        manifest.run_id, manifest.match_mode, manifest.status
    )?;
    writeln!(
        output,
        "Answer key: sources={} records={} excluded_rows={}",
        manifest.counts.key_source_count,
        manifest.counts.key_record_count,
        manifest.counts.excluded_row_count
    )?;
    for row in &manifest.excluded_rows {
        writeln!(output, "  excluded {} row {}: {}", row.source, row.row, row.reason)?;
    }

    for entry in &manifest.documents {
        let report = &entry.report;
        writeln!(output)?;
        writeln!(output, "Document: {}", report.document_label)?;
        writeln!(
            output,
            "  correct: {}  /  incorrect: {}  (not found: {}, total: {})",
            report.correct_count,
            report.incorrect_count,
            report.not_found_count(),
            report.total()
        )?;

        let corrections = report.corrections();
        if !corrections.is_empty() {
            writeln!(output, "  corrections:")?;
            for correction in corrections {
                writeln!(output, "    {correction}")?;
            }
        }
    }

    if !manifest.failed_documents.is_empty() {
        writeln!(output)?;
        writeln!(output, "Failed documents: {}", manifest.failed_documents.len())?;
        for failed in &manifest.failed_documents {
            writeln!(output, "  {}: {}", failed.path, failed.reason)?;
        }
    }

    writeln!(output)?;
    writeln!(
        output,
        "Totals: documents={} failed={} correct={} incorrect={} not_found={}",
        summary.documents_graded,
        summary.documents_failed,
        summary.correct_total,
        summary.incorrect_total,
        summary.not_found_total
    )?;

    Ok(())
}
